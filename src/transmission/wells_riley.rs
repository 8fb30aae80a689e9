//! The Wells-Riley quanta model, with and without vaccination.
//!
//! Each visible infectious occupant emits quanta at a rate scaled by age, viral load and source
//! masking. The room's total emission is diluted by ventilation, which scales with occupancy.
//! The susceptible person inhales at a rate scaled by age, sex, setting and receptor masking,
//! giving a mean inhaled dose `μ` over the exposure time and `P = 1 − exp(−μ)`, capped at
//! `max_probability`.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::{Environment, TransmissionModel};
use crate::people::{Person, Protection, Sex};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WellsRileyParams {
    /// Quanta per hour emitted by an unmasked adult.
    pub base_quanta_rate: f64,
    pub viral_load: f64,
    /// Cubic metres per hour inhaled by an adult at rest.
    pub breathing_rate: f64,
    pub outdoor_breathing_multiplier: f64,
    /// Air changes per hour.
    pub air_changes_per_hour: f64,
    pub volume_per_person: f64,
    pub min_volume: f64,
    pub source_mask_reduction: f64,
    pub receptor_mask_reduction: f64,
    pub max_probability: f64,
}

impl Default for WellsRileyParams {
    fn default() -> Self {
        WellsRileyParams {
            base_quanta_rate: 10.0,
            viral_load: 1.0,
            breathing_rate: 0.5,
            outdoor_breathing_multiplier: 1.65,
            air_changes_per_hour: 3.0,
            volume_per_person: 50.0,
            min_volume: 50.0,
            // With both masks worn the dose falls by 1 − 0.3 × 0.5 = 0.85.
            source_mask_reduction: 0.7,
            receptor_mask_reduction: 0.5,
            max_probability: 0.95,
        }
    }
}

fn respiratory_factor(age: u8) -> f64 {
    match age {
        0..3 => 0.4,
        3..10 => 0.7,
        61.. => 1.2,
        _ => 1.0,
    }
}

fn breathing_factor(age: u8, sex: Sex) -> f64 {
    let by_age = match age {
        0..3 => 0.35,
        3..10 => 0.6,
        10..18 => 0.9,
        61.. => 0.8,
        _ => 1.0,
    };
    match sex {
        Sex::Male => by_age * 1.1,
        Sex::Female => by_age * 0.9,
    }
}

impl WellsRileyParams {
    /// Quanta per hour emitted by `infector`, before vaccine effects.
    #[must_use]
    pub fn quanta_rate(&self, infector: &Person) -> f64 {
        let source_mask = if infector.masked {
            1.0 - self.source_mask_reduction
        } else {
            1.0
        };
        self.base_quanta_rate * respiratory_factor(infector.age) * self.viral_load * source_mask
    }

    /// Cubic metres per hour inhaled past the receptor's mask.
    #[must_use]
    pub fn inhalation_rate(&self, susceptible: &Person, indoor: bool) -> f64 {
        let mut rate = self.breathing_rate * breathing_factor(susceptible.age, susceptible.sex);
        if !indoor {
            rate *= self.outdoor_breathing_multiplier;
        }
        if susceptible.masked {
            rate *= 1.0 - self.receptor_mask_reduction;
        }
        rate
    }

    /// Clean air supplied to the room, in cubic metres per hour.
    #[must_use]
    pub fn ventilation(&self, occupancy: usize) -> f64 {
        let volume = (occupancy as f64 * self.volume_per_person).max(self.min_volume);
        self.air_changes_per_hour * volume
    }

    // `quanta` maps each infectious occupant to its emission rate.
    fn probability(
        &self,
        susceptible: &Person,
        environment: &Environment<'_>,
        num_timesteps: usize,
        quanta: impl Fn(&Person) -> f64,
    ) -> f64 {
        let total_quanta: f64 = environment
            .infectious_occupants()
            .filter(|person| person.id != susceptible.id)
            .map(quanta)
            .sum();
        let ventilation = self.ventilation(environment.occupancy());
        if total_quanta <= 0.0 || ventilation <= 0.0 {
            return 0.0;
        }

        let exposure = environment.exposure_hours * num_timesteps as f64;
        let inhalation = self.inhalation_rate(susceptible, environment.indoor);
        let mean_quanta = total_quanta * inhalation * exposure / ventilation;
        (1.0 - (-mean_quanta.max(0.0)).exp()).min(self.max_probability)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct WellsRiley {
    params: WellsRileyParams,
}

impl WellsRiley {
    #[must_use]
    pub fn new(params: WellsRileyParams) -> Self {
        WellsRiley { params }
    }
}

impl TransmissionModel for WellsRiley {
    fn name(&self) -> &'static str {
        "wells_riley"
    }

    fn transmission_probability(
        &self,
        _infector: &Person,
        susceptible: &Person,
        environment: &Environment<'_>,
        num_timesteps: usize,
        _rng: &mut dyn RngCore,
    ) -> f64 {
        self.params
            .probability(susceptible, environment, num_timesteps, |person| {
                self.params.quanta_rate(person)
            })
    }
}

/// Wells-Riley where each infector's quanta are reduced by their vaccine's transmission
/// protection and the result by the susceptible's infection protection, both after waning.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VaccinatedWellsRiley {
    params: WellsRileyParams,
}

impl VaccinatedWellsRiley {
    #[must_use]
    pub fn new(params: WellsRileyParams) -> Self {
        VaccinatedWellsRiley { params }
    }
}

impl TransmissionModel for VaccinatedWellsRiley {
    fn name(&self) -> &'static str {
        "vaccinated_wells_riley"
    }

    fn transmission_probability(
        &self,
        _infector: &Person,
        susceptible: &Person,
        environment: &Environment<'_>,
        num_timesteps: usize,
        _rng: &mut dyn RngCore,
    ) -> f64 {
        let emission = |person: &Person| {
            self.params.quanta_rate(person) * (1.0 - person.protection(Protection::Transmission))
        };
        let probability = self
            .params
            .probability(susceptible, environment, num_timesteps, emission);
        probability * (1.0 - susceptible.protection(Protection::Infection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::people::Vaccination;
    use crate::population::{ContextPopulationExt, PersonRecord};
    use crate::transmission::test_support::{infectious, person};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn room(size: usize) -> Context {
        let mut context = Context::new();
        context.add_household("room").unwrap();
        for i in 0..size {
            let record = PersonRecord { sex: Sex::Male, age: 30, home: "room".to_string() };
            context.add_person(&i.to_string(), &record).unwrap();
        }
        context
    }

    fn probability(model: &dyn TransmissionModel, people: &[Person]) -> f64 {
        let context = room(people.len());
        let environment = Environment {
            location: context.location(context.household_id("room").unwrap()).unwrap(),
            people,
            disease: "flu",
            indoor: true,
            exposure_hours: 1.0,
        };
        let mut rng = StdRng::seed_from_u64(0);
        model.transmission_probability(&people[0], &people[1], &environment, 1, &mut rng)
    }

    #[test]
    fn matches_closed_form() {
        let params = WellsRileyParams::default();
        let people = vec![infectious(0, 30, "flu"), person(1, 30)];
        // 10 quanta/h, 0.55 m³/h inhaled, 300 m³/h ventilation, one hour.
        let expected = 1.0 - (-10.0 * 0.55 / 300.0_f64).exp();
        let p = probability(&WellsRiley::new(params), &people);
        assert!((p - expected).abs() < 1e-12, "{p} vs {expected}");
    }

    #[test]
    fn more_infectors_raise_the_risk() {
        let model = WellsRiley::default();
        let two = vec![infectious(0, 30, "flu"), person(1, 30)];
        let three = vec![infectious(0, 30, "flu"), person(1, 30), infectious(2, 30, "flu")];
        assert!(probability(&model, &three) > probability(&model, &two));
    }

    #[test]
    fn mask_reductions() {
        let params = WellsRileyParams {
            base_quanta_rate: 1.0,
            ..WellsRileyParams::default()
        };
        let dose = |source: bool, receptor: bool| {
            let mut infector = infectious(0, 30, "flu");
            infector.masked = source;
            let mut susceptible = person(1, 30);
            susceptible.masked = receptor;
            params.quanta_rate(&infector) * params.inhalation_rate(&susceptible, true)
        };
        let bare = dose(false, false);
        assert!((dose(true, false) / bare - 0.3).abs() < 1e-12);
        assert!((dose(false, true) / bare - 0.5).abs() < 1e-12);
        assert!((dose(true, true) / bare - 0.15).abs() < 1e-12);
    }

    #[test]
    fn probability_is_capped() {
        let model = WellsRiley::new(WellsRileyParams {
            base_quanta_rate: 1e6,
            ..WellsRileyParams::default()
        });
        let people = vec![infectious(0, 30, "flu"), person(1, 30)];
        assert_eq!(probability(&model, &people), 0.95);
    }

    #[test]
    fn no_infectors_no_risk() {
        let people = vec![person(0, 30), person(1, 30)];
        assert_eq!(probability(&WellsRiley::default(), &people), 0.0);
    }

    #[test]
    fn vaccination_lowers_infection_rate() {
        let model = VaccinatedWellsRiley::new(WellsRileyParams {
            base_quanta_rate: 500.0,
            ..WellsRileyParams::default()
        });
        let unvaccinated = vec![infectious(0, 30, "flu"), person(1, 30)];
        let mut vaccinated = unvaccinated.clone();
        vaccinated[1].vaccination = Some(Vaccination::mrna(2, 0.0));

        let context = room(2);
        let location = context.location(context.household_id("room").unwrap()).unwrap();
        let rate = |people: &[Person]| {
            let environment = Environment {
                location,
                people,
                disease: "flu",
                indoor: true,
                exposure_hours: 1.0,
            };
            let mut rng = StdRng::seed_from_u64(2024);
            let trials = 5_000;
            let hits = (0..trials)
                .filter(|_| {
                    model.should_transmit(&people[0], &people[1], &environment, 1, &mut rng)
                })
                .count();
            hits as f64 / f64::from(trials)
        };

        let unvaccinated_rate = rate(&unvaccinated);
        let vaccinated_rate = rate(&vaccinated);
        assert!(vaccinated_rate < unvaccinated_rate);
        assert!(vaccinated_rate < 0.5 * unvaccinated_rate);
    }

    #[test]
    fn vaccinated_infectors_emit_less() {
        let model = VaccinatedWellsRiley::default();
        let plain = vec![infectious(0, 30, "flu"), person(1, 30)];
        let mut shielded = plain.clone();
        shielded[0].vaccination = Some(Vaccination::mrna(2, 0.0));
        assert!(probability(&model, &shielded) < probability(&model, &plain));
    }
}
