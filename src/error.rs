//! The crate-wide error type.
//!
//! Errors fall into three groups. Configuration errors (invalid matrices, unknown states or
//! distributions, bad config values) are reported before any simulation work begins. Runtime
//! safety faults (an exhausted rejection-sampling budget) surface from the sampling call that hit
//! them. Invariant violations (two people compared for transmission who are not actually
//! co-located) abort the current step.

use std::fmt::{self, Display};
use std::io;

use crate::people::PersonId;
use crate::population::LocationId;

#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum EpiError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
    /// A transition matrix set failed validation.
    InvalidMatrix(String),
    /// A distribution code or name that is not one of the supported distributions.
    UnknownDistribution(String),
    /// A distribution whose parameters `rand_distr` rejects.
    InvalidDistribution(String),
    /// A state name or index that is not part of the state list.
    UnknownState(String),
    InvalidConfig(String),
    /// The rejection sampler could not draw a value inside `[min_cutoff, max_cutoff]`.
    RejectionBudgetExhausted {
        attempts: usize,
        min_cutoff: f64,
        max_cutoff: f64,
    },
    /// Two people were compared for transmission but reside in different locations.
    LocationMismatch {
        infector: PersonId,
        susceptible: PersonId,
        infector_location: LocationId,
        susceptible_location: LocationId,
    },
    UnknownPerson(String),
    UnknownLocation(String),
}

impl From<io::Error> for EpiError {
    fn from(error: io::Error) -> Self {
        EpiError::IoError(error)
    }
}

impl From<serde_json::Error> for EpiError {
    fn from(error: serde_json::Error) -> Self {
        EpiError::JsonError(error)
    }
}

impl From<csv::Error> for EpiError {
    fn from(error: csv::Error) -> Self {
        EpiError::CsvError(error)
    }
}

impl std::error::Error for EpiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EpiError::IoError(error) => Some(error),
            EpiError::JsonError(error) => Some(error),
            EpiError::CsvError(error) => Some(error),
            _ => None,
        }
    }
}

impl Display for EpiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpiError::IoError(error) => write!(f, "I/O error: {error}"),
            EpiError::JsonError(error) => write!(f, "JSON error: {error}"),
            EpiError::CsvError(error) => write!(f, "CSV error: {error}"),
            EpiError::InvalidMatrix(msg) => write!(f, "invalid transition matrix: {msg}"),
            EpiError::UnknownDistribution(name) => write!(f, "unknown distribution type: {name}"),
            EpiError::InvalidDistribution(msg) => {
                write!(f, "invalid distribution parameters: {msg}")
            }
            EpiError::UnknownState(state) => write!(f, "unknown state: {state}"),
            EpiError::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            EpiError::RejectionBudgetExhausted {
                attempts,
                min_cutoff,
                max_cutoff,
            } => write!(
                f,
                "no sample inside [{min_cutoff}, {max_cutoff}] after {attempts} attempts"
            ),
            EpiError::LocationMismatch {
                infector,
                susceptible,
                infector_location,
                susceptible_location,
            } => write!(
                f,
                "{infector} at {infector_location} and {susceptible} at {susceptible_location} \
                 were evaluated as co-located"
            ),
            EpiError::UnknownPerson(id) => write!(f, "unknown person: {id}"),
            EpiError::UnknownLocation(id) => write!(f, "unknown location: {id}"),
        }
    }
}
