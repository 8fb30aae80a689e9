//! Infection log export.
//!
//! [`InfectionRecord`] is an [`InfectionEvent`] with people and locations named by their
//! population file ids. [`write_infection_log`] writes one CSV row per record.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::EpiError;
use crate::infection_manager::{ContextInfectionExt, InfectionEvent};
use crate::population::{ContextPopulationExt, LocationId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InfectionRecord {
    pub time: f64,
    pub disease: String,
    /// Empty for seeded infections.
    pub infector: Option<String>,
    pub infectee: String,
    /// `"household"` or `"facility"`.
    pub location_type: String,
    pub location: String,
}

impl InfectionRecord {
    pub fn new(context: &Context, event: &InfectionEvent) -> Result<Self, EpiError> {
        let infector = event
            .infector
            .map(|id| context.person(id).map(|person| person.label.clone()))
            .transpose()?;
        let location_type = match event.location {
            LocationId::Household(_) => "household",
            LocationId::Facility(_) => "facility",
        };
        Ok(InfectionRecord {
            time: event.time,
            disease: event.disease.clone(),
            infector,
            infectee: context.person(event.infectee)?.label.clone(),
            location_type: location_type.to_string(),
            location: context.location(event.location)?.label.clone(),
        })
    }
}

/// Every logged infection, in the order it happened.
pub fn infection_records(context: &Context) -> Result<Vec<InfectionRecord>, EpiError> {
    context
        .infection_log()
        .iter()
        .map(|event| InfectionRecord::new(context, event))
        .collect()
}

pub fn write_infection_log(path: impl AsRef<Path>, context: &Context) -> Result<(), EpiError> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in infection_records(context)? {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}
