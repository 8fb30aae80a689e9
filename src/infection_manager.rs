/*!

The contact loop.

Each call to [`ContextInfectionExt::run_infection_step`] runs one timestep in three phases:

1. **Update.** Every active infected person's per-disease states are recomputed from their
   timelines at the current time. People whose timelines have settled for good and who are
   no longer infectious stop being active; a later infection makes them active again.
2. **Scan.** For every tracked person who is infectious, every other visible occupant of the
   same location is tested, once per disease they can still catch, with up to `num_timesteps`
   Bernoulli trials of the transmission model. The first success records a pending infection
   and stops further trials for that person and disease. Nothing is mutated during the scan,
   so every pair is judged on the states from phase 1.
3. **Apply.** Forward timelines are built for every pending infection before anything is
   written. A timeline whose transition delay cannot be drawn inside its cutoffs falls back
   to the policy's fixed timeline with a warning. The infections are then applied in the
   order they were found: the person is marked `INFECTED`, becomes active and an
   [`InfectionEvent`] is logged. With multidisease disabled, only a person's first pending
   infection of the step is applied.

Iteration follows insertion order throughout, so a fixed seed gives identical event logs.

*/

use serde::Serialize;

use crate::context::Context;
use crate::demographics::DiseaseModelRegistry;
use crate::error::EpiError;
use crate::hashing::HashSet;
use crate::infection_state::{DiseaseTimeline, InfectionState, StateInterval};
use crate::log::{debug, trace, warn};
use crate::people::PersonId;
use crate::population::{ContextPopulationExt, LocationId};
use crate::random::ContextRandomExt;
use crate::state_machine::StateMapping;
use crate::transmission::{Environment, TransmissionModel, TransmissionModelConfig};
use crate::New;

crate::define_rng!(pub TransmissionRng);
crate::define_rng!(pub ProgressionRng);

/// A disease course of fixed length, in simulation minutes: infected for `duration`,
/// infectious from `infectious_delay` until the end, recovered afterwards.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FixedTimeline {
    pub infectious_delay: f64,
    pub duration: f64,
}

impl Default for FixedTimeline {
    fn default() -> Self {
        FixedTimeline {
            infectious_delay: 0.0,
            duration: 10_800.0,
        }
    }
}

impl FixedTimeline {
    #[must_use]
    pub fn intervals(&self, now: f64) -> Vec<StateInterval> {
        let end = now + self.duration;
        let mut intervals = vec![StateInterval::new(InfectionState::INFECTED, now, end)];
        if self.infectious_delay < self.duration {
            intervals.push(StateInterval::new(
                InfectionState::INFECTIOUS,
                now + self.infectious_delay,
                end,
            ));
        }
        intervals.push(StateInterval::new(InfectionState::RECOVERED, end, f64::INFINITY));
        intervals
    }
}

/// How the forward timeline of a new infection is built.
#[derive(Clone, Debug)]
pub enum TimelinePolicy {
    Fixed(FixedTimeline),
    /// Run the demographically matching state machine from its first state. Timeline hours
    /// are multiplied by `time_scale` to get simulation minutes. People without a matching
    /// machine get `fallback`.
    StateMachine {
        registry: DiseaseModelRegistry,
        mapping: StateMapping,
        time_scale: f64,
        fallback: FixedTimeline,
    },
}

impl Default for TimelinePolicy {
    fn default() -> Self {
        TimelinePolicy::Fixed(FixedTimeline::default())
    }
}

/// One transmission, or a seeded infection when `infector` is `None`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InfectionEvent {
    /// Simulation minutes.
    pub time: f64,
    pub infector: Option<PersonId>,
    pub infectee: PersonId,
    pub location: LocationId,
    pub disease: String,
}

pub struct InfectionSettings {
    pub model: Box<dyn TransmissionModel>,
    pub timeline_policy: TimelinePolicy,
    /// Course of infections added with [`ContextInfectionExt::seed_infection`].
    pub initial_timeline: FixedTimeline,
    pub multidisease: bool,
    pub indoor: bool,
    /// Hours of exposure per timestep.
    pub exposure_hours: f64,
}

impl Default for InfectionSettings {
    fn default() -> Self {
        InfectionSettings {
            model: TransmissionModelConfig::default().build(),
            timeline_policy: TimelinePolicy::default(),
            initial_timeline: FixedTimeline::default(),
            multidisease: true,
            indoor: true,
            exposure_hours: 1.0,
        }
    }
}

struct InfectionManager {
    settings: InfectionSettings,
    infected: Vec<PersonId>,
    tracked: HashSet<PersonId>,
    // The people updated and scanned each step, in the order they became active.
    active: Vec<PersonId>,
    active_set: HashSet<PersonId>,
    log: Vec<InfectionEvent>,
}

impl New for InfectionManager {
    #[allow(non_upper_case_globals)]
    const new: &'static dyn Fn() -> Self = &|| InfectionManager {
        settings: InfectionSettings::default(),
        infected: Vec::new(),
        tracked: HashSet::default(),
        active: Vec::new(),
        active_set: HashSet::default(),
        log: Vec::new(),
    };
}

impl InfectionManager {
    fn track(&mut self, person: PersonId) {
        if self.tracked.insert(person) {
            self.infected.push(person);
        }
        if self.active_set.insert(person) {
            self.active.push(person);
        }
    }

    fn deactivate(&mut self, settled: &HashSet<PersonId>) {
        self.active.retain(|person| !settled.contains(person));
        self.active_set.retain(|person| !settled.contains(person));
    }
}

// A transmission found during the scan phase.
struct PendingInfection {
    infector: PersonId,
    infectee: PersonId,
    location: LocationId,
    disease: String,
}

pub trait ContextInfectionExt {
    /// Replaces the manager's settings. Tracked people and the event log are kept.
    fn init_infection_manager(&mut self, settings: InfectionSettings);

    /// Infects `person` with `disease` at time `now` using the initial timeline.
    fn seed_infection(
        &mut self,
        person: PersonId,
        disease: &str,
        now: f64,
    ) -> Result<(), EpiError>;

    /// Runs one timestep at time `now` and returns the infections it caused. On error nothing
    /// from the apply phase has been written.
    fn run_infection_step(
        &mut self,
        now: f64,
        num_timesteps: usize,
    ) -> Result<Vec<InfectionEvent>, EpiError>;

    fn infection_log(&self) -> &[InfectionEvent];

    /// Everyone who has been infected, in the order they were infected.
    fn infected_people(&self) -> &[PersonId];
}

trait ContextInfectionExtInternal {
    fn infection_manager(&self) -> Result<&InfectionManager, EpiError>;
    fn scan_contacts(&self, num_timesteps: usize) -> Result<Vec<PendingInfection>, EpiError>;
    fn forward_timeline(
        &self,
        person: PersonId,
        disease: &str,
        now: f64,
    ) -> Result<Vec<StateInterval>, EpiError>;
    fn infect(
        &mut self,
        person: PersonId,
        disease: &str,
        intervals: Vec<StateInterval>,
        event: InfectionEvent,
    ) -> Result<(), EpiError>;
}

impl ContextInfectionExtInternal for Context {
    fn infection_manager(&self) -> Result<&InfectionManager, EpiError> {
        self.get_data_container::<InfectionManager>().ok_or_else(|| {
            EpiError::InvalidConfig("the infection manager has not been initialized".to_string())
        })
    }

    fn scan_contacts(&self, num_timesteps: usize) -> Result<Vec<PendingInfection>, EpiError> {
        let manager = self.infection_manager()?;
        let settings = &manager.settings;
        let people = self.people();
        let mut pending = Vec::new();
        let mut claimed: HashSet<(PersonId, &str)> = HashSet::default();

        for &infector_id in &manager.active {
            let infector = self.person(infector_id)?;
            if infector.invisible {
                continue;
            }
            let diseases: Vec<&str> = infector.infectious_diseases().collect();
            if diseases.is_empty() {
                continue;
            }
            let location = self.location(infector.location)?;

            for &susceptible_id in location.occupants() {
                if susceptible_id == infector_id {
                    continue;
                }
                let susceptible = self.person(susceptible_id)?;
                if susceptible.location != infector.location {
                    return Err(EpiError::LocationMismatch {
                        infector: infector_id,
                        susceptible: susceptible_id,
                        infector_location: infector.location,
                        susceptible_location: susceptible.location,
                    });
                }
                if susceptible.invisible || (!settings.multidisease && susceptible.is_infected()) {
                    continue;
                }

                for &disease in &diseases {
                    if !susceptible.is_susceptible_to(disease)
                        || claimed.contains(&(susceptible_id, disease))
                    {
                        continue;
                    }
                    let environment = Environment {
                        location,
                        people,
                        disease,
                        indoor: settings.indoor,
                        exposure_hours: settings.exposure_hours,
                    };
                    // Repeated trials stop at the first success.
                    let transmitted = (0..num_timesteps).any(|_| {
                        self.sample::<TransmissionRng, _>(|rng| {
                            settings.model.should_transmit(
                                infector,
                                susceptible,
                                &environment,
                                num_timesteps,
                                rng,
                            )
                        })
                    });
                    if transmitted {
                        claimed.insert((susceptible_id, disease));
                        pending.push(PendingInfection {
                            infector: infector_id,
                            infectee: susceptible_id,
                            location: location.id,
                            disease: disease.to_string(),
                        });
                    }
                }
            }
        }
        Ok(pending)
    }

    fn forward_timeline(
        &self,
        person: PersonId,
        disease: &str,
        now: f64,
    ) -> Result<Vec<StateInterval>, EpiError> {
        match &self.infection_manager()?.settings.timeline_policy {
            TimelinePolicy::Fixed(fixed) => Ok(fixed.intervals(now)),
            TimelinePolicy::StateMachine {
                registry,
                mapping,
                time_scale,
                fallback,
            } => {
                let Some(machine) = registry.select(disease, self.person(person)?) else {
                    debug!("no {disease} state machine matches {person}; using the fallback");
                    return Ok(fallback.intervals(now));
                };
                match self.sample::<ProgressionRng, _>(|rng| machine.run(rng, 0)) {
                    Ok(timeline) => Ok(timeline.to_intervals(mapping, now, *time_scale)),
                    Err(error @ EpiError::RejectionBudgetExhausted { .. }) => {
                        warn!(
                            "{disease} timeline for {person} failed ({error}); using the fallback"
                        );
                        Ok(fallback.intervals(now))
                    }
                    Err(error) => Err(error),
                }
            }
        }
    }

    fn infect(
        &mut self,
        person: PersonId,
        disease: &str,
        intervals: Vec<StateInterval>,
        event: InfectionEvent,
    ) -> Result<(), EpiError> {
        let timeline = DiseaseTimeline::new(intervals);
        let mut state = timeline.state_at(event.time);
        state.add_flag(InfectionState::INFECTED);

        let target = self.person_mut(person)?;
        target.states.insert(disease.to_string(), state);
        target.timelines.insert(disease.to_string(), timeline);

        let manager = self.get_data_container_mut::<InfectionManager>();
        manager.track(person);
        manager.log.push(event);
        Ok(())
    }
}

impl ContextInfectionExt for Context {
    fn init_infection_manager(&mut self, settings: InfectionSettings) {
        debug!("transmission model: {}", settings.model.name());
        self.get_data_container_mut::<InfectionManager>().settings = settings;
    }

    fn seed_infection(
        &mut self,
        person: PersonId,
        disease: &str,
        now: f64,
    ) -> Result<(), EpiError> {
        let location = self.person(person)?.location;
        let intervals = self
            .get_data_container_mut::<InfectionManager>()
            .settings
            .initial_timeline
            .intervals(now);
        debug!("seeding {disease} in {person} at {now}");
        self.infect(
            person,
            disease,
            intervals,
            InfectionEvent {
                time: now,
                infector: None,
                infectee: person,
                location,
                disease: disease.to_string(),
            },
        )
    }

    fn run_infection_step(
        &mut self,
        now: f64,
        num_timesteps: usize,
    ) -> Result<Vec<InfectionEvent>, EpiError> {
        let active = self.infection_manager()?.active.clone();
        let mut settled: HashSet<PersonId> = HashSet::default();
        for &person in &active {
            let person = self.person_mut(person)?;
            person.update_states(now);
            if person.is_settled(now) && person.infectious_diseases().next().is_none() {
                trace!("{} settled at {now}", person.id);
                settled.insert(person.id);
            }
        }
        if !settled.is_empty() {
            self.get_data_container_mut::<InfectionManager>().deactivate(&settled);
        }

        let pending = self.scan_contacts(num_timesteps)?;

        let multidisease = self.infection_manager()?.settings.multidisease;
        let mut infected_this_step: HashSet<PersonId> = HashSet::default();
        let mut planned = Vec::new();
        for infection in pending {
            if !infected_this_step.insert(infection.infectee) && !multidisease {
                trace!(
                    "{} already infected this step; dropping {}",
                    infection.infectee,
                    infection.disease
                );
                continue;
            }
            let intervals = self.forward_timeline(infection.infectee, &infection.disease, now)?;
            planned.push((infection, intervals));
        }

        let mut events = Vec::with_capacity(planned.len());
        for (infection, intervals) in planned {
            let PendingInfection {
                infector,
                infectee,
                location,
                disease,
            } = infection;
            debug!("{infector} infected {infectee} at {location} with {disease}");
            let event = InfectionEvent {
                time: now,
                infector: Some(infector),
                infectee,
                location,
                disease,
            };
            self.infect(infectee, &event.disease, intervals, event.clone())?;
            events.push(event);
        }
        Ok(events)
    }

    fn infection_log(&self) -> &[InfectionEvent] {
        self.get_data_container::<InfectionManager>()
            .map(|manager| manager.log.as_slice())
            .unwrap_or_default()
    }

    fn infected_people(&self) -> &[PersonId] {
        self.get_data_container::<InfectionManager>()
            .map(|manager| manager.infected.as_slice())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demographics::{AgeRange, DemographicFilter};
    use crate::matrix::TransitionEdge;
    use crate::people::Sex;
    use crate::population::PersonRecord;
    use crate::sampler::DistributionType;
    use crate::state_machine::{DiseaseStateMachine, StateMachineConfig};
    use crate::transmission::ConstantRate;

    fn settings(probability: f64) -> InfectionSettings {
        InfectionSettings {
            model: Box::new(ConstantRate::new(probability)),
            ..InfectionSettings::default()
        }
    }

    // A household holding people labelled "0", "1", ...
    fn household(size: usize, seed: u64) -> (Context, Vec<PersonId>) {
        let mut context = Context::new();
        context.init_random(seed);
        context.add_household("home").unwrap();
        let record = PersonRecord {
            sex: Sex::Female,
            age: 40,
            home: "home".to_string(),
        };
        let ids = (0..size)
            .map(|i| context.add_person(&i.to_string(), &record).unwrap())
            .collect();
        (context, ids)
    }

    #[test]
    fn half_of_exposures_infect() {
        let trials = 10_000;
        let mut infected = 0;
        for seed in 0..trials {
            let (mut context, ids) = household(2, seed);
            context.init_infection_manager(settings(0.5));
            context.seed_infection(ids[0], "flu", 0.0).unwrap();
            let events = context.run_infection_step(0.0, 1).unwrap();
            if !events.is_empty() {
                assert_eq!(events[0].infectee, ids[1]);
                assert_eq!(events[0].infector, Some(ids[0]));
                infected += 1;
            }
        }
        let rate = f64::from(infected) / trials as f64;
        assert!((rate - 0.5).abs() < 0.02, "rate {rate}");
    }

    #[test]
    fn repeated_trials_stop_at_the_first_success() {
        let trials = 10_000;
        let mut infected = 0;
        for seed in 0..trials {
            let (mut context, ids) = household(2, seed);
            context.init_infection_manager(settings(0.3));
            context.seed_infection(ids[0], "flu", 0.0).unwrap();
            let events = context.run_infection_step(0.0, 3).unwrap();
            assert!(events.len() <= 1);
            infected += events.len();
        }
        // 1 - 0.7^3
        let rate = infected as f64 / trials as f64;
        assert!((rate - 0.657).abs() < 0.02, "rate {rate}");
    }

    #[test]
    fn seeded_infection_is_logged_and_tracked() {
        let (mut context, ids) = household(2, 1);
        context.seed_infection(ids[1], "flu", 30.0).unwrap();
        assert_eq!(context.infected_people(), &[ids[1]]);
        let event = &context.infection_log()[0];
        assert_eq!(event.infector, None);
        assert_eq!(event.time, 30.0);
        let person = context.person(ids[1]).unwrap();
        assert!(person.is_infectious("flu"));
    }

    #[test]
    fn infections_follow_the_timeline() {
        let (mut context, ids) = household(2, 3);
        context.init_infection_manager(InfectionSettings {
            timeline_policy: TimelinePolicy::Fixed(FixedTimeline {
                infectious_delay: 60.0,
                duration: 600.0,
            }),
            ..settings(1.0)
        });
        context.seed_infection(ids[0], "flu", 0.0).unwrap();
        let events = context.run_infection_step(0.0, 1).unwrap();
        assert_eq!(events.len(), 1);

        let newly = context.person(ids[1]).unwrap();
        assert_eq!(newly.state("flu"), InfectionState::INFECTED);
        context.run_infection_step(60.0, 1).unwrap();
        assert!(context.person(ids[1]).unwrap().is_infectious("flu"));
        context.run_infection_step(600.0, 1).unwrap();
        let recovered = context.person(ids[1]).unwrap();
        assert_eq!(recovered.state("flu"), InfectionState::RECOVERED);
        assert!(recovered.invisible);
    }

    #[test]
    fn nobody_is_infected_twice_in_a_step() {
        let (mut context, ids) = household(3, 5);
        context.init_infection_manager(settings(1.0));
        context.seed_infection(ids[0], "flu", 0.0).unwrap();
        context.seed_infection(ids[1], "flu", 0.0).unwrap();
        let events = context.run_infection_step(0.0, 3).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].infectee, ids[2]);
        assert_eq!(events[0].infector, Some(ids[0]));
    }

    #[test]
    fn multidisease_policy() {
        for multidisease in [true, false] {
            let (mut context, ids) = household(3, 7);
            context.init_infection_manager(InfectionSettings {
                multidisease,
                ..settings(1.0)
            });
            context.seed_infection(ids[0], "delta", 0.0).unwrap();
            context.seed_infection(ids[1], "omicron", 0.0).unwrap();
            let events = context.run_infection_step(0.0, 1).unwrap();

            let caught: Vec<&str> = events
                .iter()
                .filter(|event| event.infectee == ids[2])
                .map(|event| event.disease.as_str())
                .collect();
            if multidisease {
                assert_eq!(caught, vec!["delta", "omicron"]);
                // Each seed also catches the other's disease.
                assert_eq!(events.len(), 4);
            } else {
                assert_eq!(caught, vec!["delta"]);
                // Infected seeds are not eligible for a second disease.
                assert_eq!(events.len(), 1);
            }
        }
    }

    #[test]
    fn misplaced_occupant_is_an_error() {
        let (mut context, ids) = household(2, 9);
        let elsewhere = context.add_facility("shop", None).unwrap();
        context.seed_infection(ids[0], "flu", 0.0).unwrap();
        // Corrupt the bookkeeping: the person points at the shop but is still a home occupant.
        context.person_mut(ids[1]).unwrap().location = elsewhere;
        assert!(matches!(
            context.run_infection_step(0.0, 1),
            Err(EpiError::LocationMismatch { susceptible, .. }) if susceptible == ids[1]
        ));
    }

    #[test]
    fn separate_locations_do_not_mix() {
        let (mut context, ids) = household(2, 9);
        context.init_infection_manager(settings(1.0));
        let shop = context.add_facility("shop", None).unwrap();
        context.move_person(ids[1], shop).unwrap();
        context.seed_infection(ids[0], "flu", 0.0).unwrap();
        assert!(context.run_infection_step(0.0, 5).unwrap().is_empty());
    }

    #[test]
    fn state_machine_timelines() {
        let machine = DiseaseStateMachine::from_edges(
            vec!["Infectious_Symptomatic".to_string(), "Recovered".to_string()],
            &[TransitionEdge {
                source: "Infectious_Symptomatic".to_string(),
                target: "Recovered".to_string(),
                transition_prob: 1.0,
                mean_time: 2.0,
                std_dev: 0.0,
                distribution_type: DistributionType::Fixed,
                min_cutoff: 0.0,
                max_cutoff: 10.0,
            }],
            StateMachineConfig::default(),
        )
        .unwrap();
        let mut registry = DiseaseModelRegistry::new();
        registry.register("flu", DemographicFilter::default(), machine);

        let (mut context, ids) = household(2, 11);
        context.init_infection_manager(InfectionSettings {
            timeline_policy: TimelinePolicy::StateMachine {
                registry,
                mapping: StateMapping::default(),
                time_scale: 60.0,
                fallback: FixedTimeline::default(),
            },
            ..settings(1.0)
        });
        context.seed_infection(ids[0], "flu", 0.0).unwrap();
        context.run_infection_step(100.0, 1).unwrap();

        // Two days is 48 hours, or 2880 minutes after infection.
        let timeline = &context.person(ids[1]).unwrap().timelines["flu"];
        let symptomatic =
            InfectionState::INFECTED | InfectionState::INFECTIOUS | InfectionState::SYMPTOMATIC;
        assert_eq!(timeline.state_at(100.0), symptomatic);
        assert_eq!(timeline.state_at(2_979.0), symptomatic);
        assert_eq!(timeline.state_at(2_980.0), InfectionState::RECOVERED);

        // The fallback applies to diseases without a registered machine.
        let intervals = context.forward_timeline(ids[1], "measles", 0.0).unwrap();
        assert_eq!(intervals, FixedTimeline::default().intervals(0.0));
    }

    fn transition(mean_time: f64, min_cutoff: f64, max_cutoff: f64) -> TransitionEdge {
        TransitionEdge {
            source: "Infectious_Symptomatic".to_string(),
            target: "Recovered".to_string(),
            transition_prob: 1.0,
            mean_time,
            std_dev: 1.0,
            distribution_type: DistributionType::Normal,
            min_cutoff,
            max_cutoff,
        }
    }

    #[test]
    fn unreachable_cutoffs_fall_back_without_aborting_the_step() {
        let machine = |edge: TransitionEdge| {
            DiseaseStateMachine::from_edges(
                vec!["Infectious_Symptomatic".to_string(), "Recovered".to_string()],
                &[edge],
                StateMachineConfig::default(),
            )
            .unwrap()
        };
        let mut registry = DiseaseModelRegistry::new();
        let young = DemographicFilter {
            age: AgeRange::Between(0, 49),
            ..DemographicFilter::default()
        };
        let old = DemographicFilter {
            age: AgeRange::AtLeast(50),
            ..DemographicFilter::default()
        };
        registry.register("flu", young, machine(transition(5.0, 1.0, 9.0)));
        // Validates, but a normal draw never lands exactly on 5.
        registry.register("flu", old, machine(transition(5.0, 5.0, 5.0)));

        let mut context = Context::new();
        context.init_random(21);
        context.add_household("home").unwrap();
        let ids: Vec<PersonId> = [("0", 40), ("1", 30), ("2", 70)]
            .into_iter()
            .map(|(label, age)| {
                let record = PersonRecord {
                    sex: Sex::Male,
                    age,
                    home: "home".to_string(),
                };
                context.add_person(label, &record).unwrap()
            })
            .collect();
        let fallback = FixedTimeline {
            infectious_delay: 0.0,
            duration: 120.0,
        };
        context.init_infection_manager(InfectionSettings {
            timeline_policy: TimelinePolicy::StateMachine {
                registry,
                mapping: StateMapping::default(),
                time_scale: 60.0,
                fallback,
            },
            ..settings(1.0)
        });
        context.seed_infection(ids[0], "flu", 0.0).unwrap();

        let events = context.run_infection_step(0.0, 1).unwrap();
        let infectees: Vec<PersonId> = events.iter().map(|event| event.infectee).collect();
        assert_eq!(infectees, vec![ids[1], ids[2]]);
        assert_eq!(context.infection_log().len(), 3);

        let young = &context.person(ids[1]).unwrap().timelines["flu"];
        assert!(young.end().unwrap().is_infinite());
        assert!(young.intervals().iter().any(|interval| interval.start >= 60.0));
        let old = &context.person(ids[2]).unwrap().timelines["flu"];
        assert_eq!(old.intervals(), fallback.intervals(0.0).as_slice());
    }

    #[test]
    fn recovered_people_stop_being_updated() {
        let short = FixedTimeline {
            infectious_delay: 0.0,
            duration: 60.0,
        };
        let (mut context, ids) = household(2, 13);
        context.init_infection_manager(InfectionSettings {
            timeline_policy: TimelinePolicy::Fixed(short),
            initial_timeline: short,
            ..settings(0.0)
        });
        context.seed_infection(ids[0], "flu", 0.0).unwrap();
        context.run_infection_step(0.0, 1).unwrap();
        assert_eq!(context.infection_manager().unwrap().active, vec![ids[0]]);

        context.run_infection_step(60.0, 1).unwrap();
        assert!(context.infection_manager().unwrap().active.is_empty());
        assert_eq!(context.infected_people(), &[ids[0]]);
        let person = context.person(ids[0]).unwrap();
        assert_eq!(person.state("flu"), InfectionState::RECOVERED);

        // A new disease makes them active again.
        context.seed_infection(ids[0], "measles", 120.0).unwrap();
        assert_eq!(context.infection_manager().unwrap().active, vec![ids[0]]);
        assert_eq!(context.infected_people(), &[ids[0]]);
    }

    #[test]
    fn same_seed_same_log() {
        let run = || {
            let (mut context, ids) = household(12, 2024);
            context.init_infection_manager(settings(0.1));
            context.seed_infection(ids[0], "flu", 0.0).unwrap();
            for step in 0..20 {
                context.run_infection_step(f64::from(step) * 60.0, 1).unwrap();
            }
            context.infection_log().to_vec()
        };
        let first = run();
        assert!(first.len() > 1);
        assert_eq!(first, run());
    }
}
