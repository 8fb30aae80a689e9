//! The CAT dose-response model.
//!
//! The dose reaching a susceptible person is the product of three groups of factors:
//!
//! * host: droplets emitted (by age), viral load, the fraction passing the infector's mask and
//!   the aerosolized fraction;
//! * environment: droplet transport, which falls as the share of infectious occupants in the
//!   room rises, times exponential aerosol decay over the time of flight;
//! * susceptible: inhalation rate (by age, sex and setting), the fraction passing the
//!   receptor's mask and the exposure time.
//!
//! The probability is the dose divided by a per-disease calibration constant, capped at 1.

use std::collections::BTreeMap;

use rand::distr::Uniform;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use super::{Environment, TransmissionModel};
use crate::people::{Person, Sex};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoseResponseParams {
    /// Droplets emitted by an adult aged 10 to 60.
    pub adult_droplets: f64,
    pub viral_load: f64,
    pub aerosol_fraction: f64,
    pub aerosol_half_life: f64,
    /// Divisor turning dose into probability for diseases without their own entry.
    pub calibration: f64,
    pub disease_calibration: BTreeMap<String, f64>,
}

impl Default for DoseResponseParams {
    fn default() -> Self {
        DoseResponseParams {
            adult_droplets: 250.0,
            viral_load: 0.37,
            aerosol_fraction: 0.35,
            aerosol_half_life: 1.1,
            calibration: 3.23e5,
            disease_calibration: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DoseResponse {
    params: DoseResponseParams,
}

impl DoseResponse {
    #[must_use]
    pub fn new(params: DoseResponseParams) -> Self {
        DoseResponse { params }
    }

    fn droplets(&self, age: u8) -> f64 {
        if age < 3 {
            30.0
        } else if age < 10 || age > 60 {
            100.0
        } else {
            self.params.adult_droplets
        }
    }

    fn host_factor(&self, infector: &Person, rng: &mut dyn RngCore) -> f64 {
        let viral_load = self.params.viral_load
            * (1.0 - infector.vaccination.as_ref().map_or(0.0, |v| v.viral_load_reduction));
        let passed_mask = if infector.masked {
            1.0 - rng.random_range(0.3..0.6)
        } else {
            1.0
        };
        self.droplets(infector.age) * viral_load * passed_mask * self.params.aerosol_fraction
    }

    fn environment_factor(
        &self,
        environment: &Environment<'_>,
        num_timesteps: usize,
        rng: &mut dyn RngCore,
    ) -> f64 {
        let occupancy = environment.occupancy();
        let mut transport = 0.0;
        if occupancy > 0 && num_timesteps > 0 {
            let masked_weight = Uniform::new(0.1, 0.4).ok();
            let denominator = (occupancy * num_timesteps) as f64;
            for _ in 0..num_timesteps {
                let weighted: f64 = environment
                    .infectious_occupants()
                    .map(|person| match (&masked_weight, person.masked) {
                        (Some(weight), true) => rng.sample(weight),
                        _ => 1.0,
                    })
                    .sum();
                transport += (-weighted / denominator).exp();
            }
        }

        let time_of_flight = rng.random_range(3.0..9.0);
        transport * (-time_of_flight / self.params.aerosol_half_life).exp()
    }

    fn susceptible_factor(
        &self,
        susceptible: &Person,
        environment: &Environment<'_>,
        num_timesteps: usize,
        rng: &mut dyn RngCore,
    ) -> f64 {
        let mut inhalation = rng.random_range(0.05..0.7);
        if susceptible.sex == Sex::Female {
            inhalation *= 0.8;
        }
        if susceptible.age < 18 || susceptible.age > 60 {
            inhalation *= 0.8;
        }
        if !environment.indoor {
            inhalation *= 1.2;
        }
        let passed_mask = if susceptible.masked {
            1.0 - rng.random_range(0.1..0.3)
        } else {
            1.0
        };
        inhalation * passed_mask * environment.exposure_hours * num_timesteps as f64
    }

    fn calibration(&self, disease: &str) -> f64 {
        self.params
            .disease_calibration
            .get(disease)
            .copied()
            .unwrap_or(self.params.calibration)
    }
}

impl TransmissionModel for DoseResponse {
    fn name(&self) -> &'static str {
        "dose_response"
    }

    fn transmission_probability(
        &self,
        infector: &Person,
        susceptible: &Person,
        environment: &Environment<'_>,
        num_timesteps: usize,
        rng: &mut dyn RngCore,
    ) -> f64 {
        let calibration = self.calibration(environment.disease);
        if calibration <= 0.0 {
            return 0.0;
        }
        let dose = self.host_factor(infector, rng)
            * self.environment_factor(environment, num_timesteps, rng)
            * self.susceptible_factor(susceptible, environment, num_timesteps, rng);
        (dose / calibration).clamp(0.0, 1.0)
    }
}
