//! Simulation configuration.
//!
//! A [`SimulationConfig`] is read from JSON; every field has a default, so `{}` is a valid
//! configuration. Times are in simulation minutes unless a field says otherwise.
//!
//! ```json
//! {
//!     "seed": 42,
//!     "timestep": 60,
//!     "max_length": 10080,
//!     "interventions": {"mask": 0.4, "vaccine": 0.2, "selfiso": 0.5},
//!     "initial_infections": [{"person": "160", "disease": "Delta"}],
//!     "transmission_model": {"type": "wells_riley"}
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EpiError;
use crate::infection_manager::FixedTimeline;
use crate::log::{parse_level, LevelFilter};
use crate::state_machine::{StateMachineConfig, StateMachineDefinition};
use crate::transmission::TransmissionModelConfig;

/// Population-wide intervention settings. `capacity` multiplies every facility's capacity;
/// the others are probabilities.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Interventions {
    pub mask: f64,
    pub vaccine: f64,
    pub capacity: f64,
    /// Chance that a person told to change location stays home instead.
    pub lockdown: f64,
    /// Chance that a symptomatic person stays home instead of going to a facility.
    pub selfiso: f64,
}

impl Default for Interventions {
    fn default() -> Self {
        Interventions {
            mask: 0.0,
            vaccine: 0.0,
            capacity: 1.0,
            lockdown: 0.0,
            selfiso: 0.0,
        }
    }
}

/// A person infected at the start of the run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialInfection {
    /// The person's id in the population file.
    pub person: String,
    pub disease: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    pub timestep: u64,
    /// The last simulated time. Steps run while `t <= max_length`.
    pub max_length: u64,
    pub multidisease: bool,
    pub indoor: bool,
    /// Length of the infected and infectious periods of initial infections.
    pub initial_infection_duration: f64,
    /// Course of new infections with no matching state machine.
    pub fallback_timeline: FixedTimeline,
    /// Simulation minutes per state machine timeline hour.
    pub time_conversion_factor: f64,
    pub interventions: Interventions,
    pub initial_infections: Vec<InitialInfection>,
    /// A `log` level name; `"off"` disables logging.
    pub log_level: String,
    pub transmission_model: TransmissionModelConfig,
    pub state_machine: StateMachineConfig,
    /// Disease progression models. New infections use the fallback timeline when empty.
    pub state_machines: Vec<StateMachineDefinition>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            seed: 0,
            timestep: 60,
            max_length: 10_080,
            multidisease: true,
            indoor: true,
            initial_infection_duration: 10_800.0,
            fallback_timeline: FixedTimeline::default(),
            time_conversion_factor: 60.0,
            interventions: Interventions::default(),
            initial_infections: Vec::new(),
            log_level: "warn".to_string(),
            transmission_model: TransmissionModelConfig::default(),
            state_machine: StateMachineConfig::default(),
            state_machines: Vec::new(),
        }
    }
}

fn invalid(message: String) -> EpiError {
    EpiError::InvalidConfig(message)
}

fn check_probability(name: &str, value: f64) -> Result<(), EpiError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("interventions.{name} must be in [0, 1], got {value}")))
    }
}

fn check_duration(name: &str, value: f64) -> Result<(), EpiError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be a finite, non-negative duration, got {value}")))
    }
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> Result<Self, EpiError> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, EpiError> {
        let file = std::fs::File::open(path)?;
        let config: SimulationConfig = serde_json::from_reader(std::io::BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EpiError> {
        if self.timestep == 0 {
            return Err(invalid("timestep must be positive".to_string()));
        }
        check_duration("initial_infection_duration", self.initial_infection_duration)?;
        check_duration("fallback_timeline.duration", self.fallback_timeline.duration)?;
        check_duration(
            "fallback_timeline.infectious_delay",
            self.fallback_timeline.infectious_delay,
        )?;
        if !(self.time_conversion_factor.is_finite() && self.time_conversion_factor > 0.0) {
            return Err(invalid(format!(
                "time_conversion_factor must be positive, got {}",
                self.time_conversion_factor
            )));
        }

        let interventions = &self.interventions;
        check_probability("mask", interventions.mask)?;
        check_probability("vaccine", interventions.vaccine)?;
        check_probability("lockdown", interventions.lockdown)?;
        check_probability("selfiso", interventions.selfiso)?;
        if !(interventions.capacity.is_finite() && interventions.capacity >= 0.0) {
            return Err(invalid(format!(
                "interventions.capacity must be non-negative, got {}",
                interventions.capacity
            )));
        }

        self.level_filter()?;
        Ok(())
    }

    pub fn level_filter(&self) -> Result<LevelFilter, EpiError> {
        parse_level(&self.log_level)
            .ok_or_else(|| invalid(format!("unknown log level {}", self.log_level)))
    }

    /// Hours of exposure represented by one timestep.
    #[must_use]
    pub fn exposure_hours(&self) -> f64 {
        self.timestep as f64 / 60.0
    }
}
