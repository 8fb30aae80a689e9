//! Scheduled movement and the interventions that act on it.
//!
//! A [`MovementSchedule`] maps simulation minutes to the occupants each household and
//! facility should have from that time on, in the format
//! `{"<minute>": {"homes": {"<id>": [person ids]}, "places": {"<id>": [person ids]}}}`.
//! Households are filled before facilities. A person sent to a facility goes home instead
//! when the facility is at capacity, when a lockdown keeps them in, or when they are
//! symptomatic and self-isolate.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::config::Interventions;
use crate::context::Context;
use crate::error::EpiError;
use crate::log::{debug, trace, warn};
use crate::people::{PersonId, Vaccination};
use crate::population::{ContextPopulationExt, LocationId};
use crate::random::ContextRandomExt;

crate::define_rng!(pub InterventionRng);

// Person ids appear as strings or bare numbers in pattern files.
fn external_ids<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    let raw = BTreeMap::<String, Vec<RawId>>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(location, ids)| {
            let ids = ids
                .into_iter()
                .map(|id| match id {
                    RawId::Text(text) => text,
                    RawId::Number(number) => number.to_string(),
                })
                .collect();
            (location, ids)
        })
        .collect())
}

/// Where people go at one point in time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementStep {
    #[serde(default, deserialize_with = "external_ids")]
    pub homes: BTreeMap<String, Vec<String>>,
    #[serde(default, deserialize_with = "external_ids")]
    pub places: BTreeMap<String, Vec<String>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementSchedule {
    steps: BTreeMap<u64, MovementStep>,
}

impl MovementSchedule {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, EpiError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, EpiError> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    pub fn insert(&mut self, time: u64, step: MovementStep) {
        self.steps.insert(time, step);
    }

    /// Steps in time order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &MovementStep)> {
        self.steps.iter().map(|(&time, step)| (time, step))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

// Whether an intervention sends `person` home instead of into `facility`.
fn stays_home(
    context: &Context,
    person: PersonId,
    facility: LocationId,
    interventions: &Interventions,
) -> Result<bool, EpiError> {
    let location = context.location(facility)?;
    let current = context.person(person)?;

    let at_capacity = location.capacity.is_some_and(|capacity| {
        location.occupancy() as f64 >= capacity as f64 * interventions.capacity
    });
    let locked_down = current.location != facility
        && context.sample_bool::<InterventionRng>(interventions.lockdown);
    let isolating = current.is_symptomatic()
        && context.sample_bool::<InterventionRng>(interventions.selfiso);

    if at_capacity || locked_down || isolating {
        let reason = if at_capacity {
            "capacity limit"
        } else if locked_down {
            "lockdown"
        } else {
            "self-isolation"
        };
        trace!("{person} stays home from {facility}: {reason}");
        return Ok(true);
    }
    Ok(false)
}

/// Moves everyone named in `step`. An unknown location id is an error; unknown people are
/// skipped with a warning.
pub fn apply_movement_step(
    context: &mut Context,
    step: &MovementStep,
    interventions: &Interventions,
) -> Result<(), EpiError> {
    for (home, people) in &step.homes {
        let household = context
            .household_id(home)
            .ok_or_else(|| EpiError::UnknownLocation(format!("household {home}")))?;
        for label in people {
            let Some(person) = context.person_id(label) else {
                warn!("movement schedule names unknown person {label}");
                continue;
            };
            context.move_person(person, household)?;
        }
    }

    for (place, people) in &step.places {
        let facility = context
            .facility_id(place)
            .ok_or_else(|| EpiError::UnknownLocation(format!("facility {place}")))?;
        for label in people {
            let Some(person) = context.person_id(label) else {
                warn!("movement schedule names unknown person {label}");
                continue;
            };
            let destination = if stays_home(context, person, facility, interventions)? {
                context.person(person)?.household
            } else {
                facility
            };
            context.move_person(person, destination)?;
        }
    }
    Ok(())
}

/// Masks each person with probability `mask` and gives each, with probability `vaccine`,
/// one or two mRNA doses.
pub fn assign_interventions(
    context: &mut Context,
    interventions: &Interventions,
) -> Result<(), EpiError> {
    let people: Vec<_> = context.people().iter().map(|person| person.id).collect();
    let (mut masked, mut vaccinated) = (0, 0);
    for id in people {
        let mask = context.sample_bool::<InterventionRng>(interventions.mask);
        let vaccination = context
            .sample_bool::<InterventionRng>(interventions.vaccine)
            .then(|| Vaccination::mrna(context.sample_range::<InterventionRng, _, u8>(1..=2), 0.0));

        let person = context.person_mut(id)?;
        if mask {
            person.masked = true;
            masked += 1;
        }
        if vaccination.is_some() {
            person.vaccination = vaccination;
            vaccinated += 1;
        }
    }
    debug!("interventions: {masked} people masked, {vaccinated} vaccinated");
    Ok(())
}
