//! People and their per-disease status.
//!
//! A [`Person`] is created once when the population is built and lives for the whole run. Its
//! location changes as it moves; its per-disease [`InfectionState`] is recomputed from its
//! [`DiseaseTimeline`]s by [`Person::update_states`].

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::infection_state::{DiseaseTimeline, InfectionState};
use crate::population::LocationId;

/// Index of a person in the population, in insertion order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(pub(crate) usize);

impl PersonId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "person #{}", self.0)
    }
}

/// Encoded as `0` (male) and `1` (female) in population files.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Sex {
    #[default]
    Male,
    Female,
}

impl TryFrom<u8> for Sex {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Sex::Male),
            1 => Ok(Sex::Female),
            other => Err(format!("unknown sex code {other}")),
        }
    }
}

impl From<Sex> for u8 {
    fn from(sex: Sex) -> Self {
        match sex {
            Sex::Male => 0,
            Sex::Female => 1,
        }
    }
}

/// Which effect of a vaccine to look up.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Protection {
    /// Reduction of the chance that a vaccinated susceptible is infected.
    Infection,
    /// Reduction of the dose a vaccinated infectious person emits.
    Transmission,
    /// Reduction of the chance of severe disease.
    Severity,
}

/// Multiplier applied to vaccine effectiveness `days` after the last dose: full strength for
/// 30 days, linear decline to 0.7 at day 180, then a slower decline with a floor of 0.5.
#[must_use]
pub fn waning_factor(days: f64) -> f64 {
    if days <= 30.0 {
        1.0
    } else if days <= 180.0 {
        1.0 - 0.3 * (days - 30.0) / 150.0
    } else {
        (0.7 - 0.2 * (days - 180.0) / 180.0).max(0.5)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vaccination {
    pub doses: u8,
    pub days_since_dose: f64,
    pub infection: f64,
    pub transmission: f64,
    pub severity: f64,
    #[serde(default)]
    pub viral_load_reduction: f64,
}

impl Vaccination {
    /// mRNA vaccine effectiveness after `doses` doses. Zero doses give no protection.
    #[must_use]
    pub fn mrna(doses: u8, days_since_dose: f64) -> Self {
        let (infection, transmission, severity, viral_load_reduction) = match doses {
            0 => (0.0, 0.0, 0.0, 0.0),
            1 => (0.50, 0.30, 0.75, 0.3),
            _ => (0.75, 0.50, 0.90, 0.5),
        };
        Vaccination {
            doses,
            days_since_dose,
            infection,
            transmission,
            severity,
            viral_load_reduction,
        }
    }

    /// Viral-vector vaccine effectiveness after `doses` doses.
    #[must_use]
    pub fn viral_vector(doses: u8, days_since_dose: f64) -> Self {
        let (infection, transmission, severity, viral_load_reduction) = match doses {
            0 => (0.0, 0.0, 0.0, 0.0),
            1 => (0.40, 0.25, 0.65, 0.2),
            _ => (0.65, 0.40, 0.85, 0.4),
        };
        Vaccination {
            doses,
            days_since_dose,
            infection,
            transmission,
            severity,
            viral_load_reduction,
        }
    }

    /// The effectiveness for `kind` after waning, in `[0, 1]`.
    #[must_use]
    pub fn protection(&self, kind: Protection) -> f64 {
        let base = match kind {
            Protection::Infection => self.infection,
            Protection::Transmission => self.transmission,
            Protection::Severity => self.severity,
        };
        (base * waning_factor(self.days_since_dose)).clamp(0.0, 1.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Person {
    pub id: PersonId,
    /// The id used in population and movement files.
    pub label: String,
    pub age: u8,
    pub sex: Sex,
    pub household: LocationId,
    pub location: LocationId,
    pub masked: bool,
    pub vaccination: Option<Vaccination>,
    pub states: BTreeMap<String, InfectionState>,
    pub timelines: BTreeMap<String, DiseaseTimeline>,
    /// Set while any disease is `HOSPITALIZED`, `RECOVERED` or `REMOVED`. Invisible people
    /// neither spread nor catch infections.
    pub invisible: bool,
}

impl Person {
    /// The state for `disease`; `SUSCEPTIBLE` if the person has never had it.
    #[must_use]
    pub fn state(&self, disease: &str) -> InfectionState {
        self.states.get(disease).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn is_infectious(&self, disease: &str) -> bool {
        self.state(disease).has_flag(InfectionState::INFECTIOUS)
    }

    /// True when any disease has the `INFECTED` flag.
    #[must_use]
    pub fn is_infected(&self) -> bool {
        self.states
            .values()
            .any(|state| state.has_flag(InfectionState::INFECTED))
    }

    #[must_use]
    pub fn is_symptomatic(&self) -> bool {
        self.states
            .values()
            .any(|state| state.has_flag(InfectionState::SYMPTOMATIC))
    }

    /// The diseases this person can currently pass on.
    pub fn infectious_diseases(&self) -> impl Iterator<Item = &str> {
        self.states
            .iter()
            .filter(|(_, state)| state.has_flag(InfectionState::INFECTIOUS))
            .map(|(disease, _)| disease.as_str())
    }

    /// Whether this person can catch `disease`: not infected with it, and not hospitalized,
    /// recovered or removed from it.
    #[must_use]
    pub fn is_susceptible_to(&self, disease: &str) -> bool {
        !self.state(disease).intersects(
            InfectionState::INFECTED
                | InfectionState::HOSPITALIZED
                | InfectionState::RECOVERED
                | InfectionState::REMOVED,
        )
    }

    #[must_use]
    pub fn protection(&self, kind: Protection) -> f64 {
        self.vaccination
            .as_ref()
            .map_or(0.0, |vaccination| vaccination.protection(kind))
    }

    /// True when none of this person's timelines changes state after `now`.
    #[must_use]
    pub fn is_settled(&self, now: f64) -> bool {
        self.timelines.values().all(|timeline| timeline.is_settled_at(now))
    }

    /// Recomputes every disease state carried in a timeline from the intervals active at `now`.
    pub fn update_states(&mut self, now: f64) {
        for (disease, timeline) in &self.timelines {
            self.states.insert(disease.clone(), timeline.state_at(now));
        }
        let hidden =
            InfectionState::HOSPITALIZED | InfectionState::RECOVERED | InfectionState::REMOVED;
        self.invisible = self.states.values().any(|state| state.intersects(hidden));
    }
}
