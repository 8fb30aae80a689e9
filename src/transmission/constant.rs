use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::{Environment, TransmissionModel};
use crate::people::Person;

/// The same probability for every pair and every trial.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstantRate {
    pub probability: f64,
}

impl ConstantRate {
    #[must_use]
    pub fn new(probability: f64) -> Self {
        ConstantRate { probability }
    }
}

impl Default for ConstantRate {
    fn default() -> Self {
        ConstantRate { probability: 1e-5 }
    }
}

impl TransmissionModel for ConstantRate {
    fn name(&self) -> &'static str {
        "constant_rate"
    }

    fn transmission_probability(
        &self,
        _infector: &Person,
        _susceptible: &Person,
        _environment: &Environment<'_>,
        _num_timesteps: usize,
        _rng: &mut dyn RngCore,
    ) -> f64 {
        self.probability.clamp(0.0, 1.0)
    }
}
