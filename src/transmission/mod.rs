/*!

Pluggable transmission probability models.

Every model answers one question: given an infectious person, a susceptible person and the
location they share, how likely is transmission during one evaluation? The contact loop only
sees the [`TransmissionModel`] trait, so models can be swapped without touching it.

Available models:

* [`ConstantRate`]: a fixed probability, independent of who is involved.
* [`DoseResponse`]: the CAT dose-response model built from host emission, environment
  transport and susceptible intake factors.
* [`WellsRiley`]: the Wells-Riley quanta model.
* [`VaccinatedWellsRiley`]: Wells-Riley with vaccine effects on both sides.

Models draw any noise they need from the generator they are handed, which is also used for the
final Bernoulli trial in [`TransmissionModel::should_transmit`].

*/

mod constant;
mod dose_response;
mod wells_riley;

pub use constant::ConstantRate;
pub use dose_response::{DoseResponse, DoseResponseParams};
pub use wells_riley::{VaccinatedWellsRiley, WellsRiley, WellsRileyParams};

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::people::Person;
use crate::population::Location;

/// The shared location of an infector and a susceptible person during one evaluation.
pub struct Environment<'a> {
    pub location: &'a Location,
    /// Every person in the population, indexed by `PersonId`.
    pub people: &'a [Person],
    pub disease: &'a str,
    pub indoor: bool,
    /// Hours of exposure represented by one timestep.
    pub exposure_hours: f64,
}

impl<'a> Environment<'a> {
    pub fn occupants(&self) -> impl Iterator<Item = &'a Person> + '_ {
        self.location
            .occupants()
            .iter()
            .filter_map(|id| self.people.get(id.index()))
    }

    /// Visible occupants who are infectious with this environment's disease.
    pub fn infectious_occupants(&self) -> impl Iterator<Item = &'a Person> + '_ {
        self.occupants()
            .filter(|person| !person.invisible && person.is_infectious(self.disease))
    }

    #[must_use]
    pub fn occupancy(&self) -> usize {
        self.location.occupancy()
    }
}

pub trait TransmissionModel {
    fn name(&self) -> &'static str;

    /// The probability, in `[0, 1]`, that `infector` infects `susceptible` in one trial.
    /// `num_timesteps` is the number of timesteps the evaluation window spans.
    fn transmission_probability(
        &self,
        infector: &Person,
        susceptible: &Person,
        environment: &Environment<'_>,
        num_timesteps: usize,
        rng: &mut dyn RngCore,
    ) -> f64;

    /// One Bernoulli trial on [`transmission_probability`](Self::transmission_probability).
    fn should_transmit(
        &self,
        infector: &Person,
        susceptible: &Person,
        environment: &Environment<'_>,
        num_timesteps: usize,
        rng: &mut dyn RngCore,
    ) -> bool {
        let probability =
            self.transmission_probability(infector, susceptible, environment, num_timesteps, rng);
        if !probability.is_finite() || probability <= 0.0 {
            return false;
        }
        rng.random_bool(probability.min(1.0))
    }
}

/// Selects and parameterizes a transmission model in configuration files, for example
/// `{"type": "wells_riley", "base_quanta_rate": 25.0}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransmissionModelConfig {
    ConstantRate(ConstantRate),
    DoseResponse(DoseResponseParams),
    WellsRiley(WellsRileyParams),
    VaccinatedWellsRiley(WellsRileyParams),
}

impl Default for TransmissionModelConfig {
    fn default() -> Self {
        TransmissionModelConfig::DoseResponse(DoseResponseParams::default())
    }
}

impl TransmissionModelConfig {
    #[must_use]
    pub fn build(&self) -> Box<dyn TransmissionModel> {
        match self {
            TransmissionModelConfig::ConstantRate(model) => Box::new(model.clone()),
            TransmissionModelConfig::DoseResponse(params) => {
                Box::new(DoseResponse::new(params.clone()))
            }
            TransmissionModelConfig::WellsRiley(params) => {
                Box::new(WellsRiley::new(params.clone()))
            }
            TransmissionModelConfig::VaccinatedWellsRiley(params) => {
                Box::new(VaccinatedWellsRiley::new(params.clone()))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeMap;

    use crate::infection_state::InfectionState;
    use crate::people::{Person, PersonId, Sex};
    use crate::population::LocationId;

    pub(crate) fn person(index: usize, age: u8) -> Person {
        Person {
            id: PersonId(index),
            label: index.to_string(),
            age,
            sex: Sex::Male,
            household: LocationId::Household(0),
            location: LocationId::Household(0),
            masked: false,
            vaccination: None,
            states: BTreeMap::new(),
            timelines: BTreeMap::new(),
            invisible: false,
        }
    }

    pub(crate) fn infectious(index: usize, age: u8, disease: &str) -> Person {
        let mut person = person(index, age);
        person
            .states
            .insert(disease.to_string(), InfectionState::INFECTED | InfectionState::INFECTIOUS);
        person
    }
}
