/*!

The simulation driver.

[`Simulation::new`] builds a [`Context`] from a configuration, a population and a movement
schedule: it seeds the random streams, loads the population, configures the infection
manager, assigns interventions and seeds the initial infections at time 0.

[`Simulation::run`] then steps `t = 0, timestep, 2·timestep, …` while `t <= max_length`. At
each step it applies every movement step that has come due, runs one infection step and
records who is infected with what.

*/

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::SimulationConfig;
use crate::context::Context;
use crate::demographics::DiseaseModelRegistry;
use crate::error::EpiError;
use crate::infection_manager::{
    ContextInfectionExt, FixedTimeline, InfectionSettings, TimelinePolicy,
};
use crate::infection_state::InfectionState;
use crate::log::{debug, info, set_log_level};
use crate::movement::{apply_movement_step, assign_interventions, MovementSchedule};
use crate::population::{ContextPopulationExt, PopulationFile};
use crate::random::ContextRandomExt;
use crate::report::{infection_records, InfectionRecord};
use crate::state_machine::StateMapping;

/// Who is infected at one step. People are listed by population file id, in the order they
/// were infected.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StepSummary {
    pub time: u64,
    pub infected: BTreeMap<String, Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimulationOutput {
    pub steps: Vec<StepSummary>,
    pub infections: Vec<InfectionRecord>,
}

impl SimulationOutput {
    pub fn to_json(&self) -> Result<String, EpiError> {
        Ok(serde_json::to_string(self)?)
    }
}

pub struct Simulation {
    config: SimulationConfig,
    schedule: MovementSchedule,
    context: Context,
}

fn timeline_policy(config: &SimulationConfig) -> Result<TimelinePolicy, EpiError> {
    if config.state_machines.is_empty() {
        return Ok(TimelinePolicy::Fixed(config.fallback_timeline));
    }
    let mut registry = DiseaseModelRegistry::new();
    for definition in &config.state_machines {
        registry.register_definition(definition.clone(), config.state_machine.clone())?;
    }
    Ok(TimelinePolicy::StateMachine {
        registry,
        mapping: StateMapping::default(),
        time_scale: config.time_conversion_factor,
        fallback: config.fallback_timeline,
    })
}

impl Simulation {
    pub fn new(
        config: SimulationConfig,
        population: &PopulationFile,
        schedule: MovementSchedule,
    ) -> Result<Self, EpiError> {
        config.validate()?;
        set_log_level(config.level_filter()?);

        let mut context = Context::new();
        context.init_random(config.seed);
        context.load_population(population)?;
        context.init_infection_manager(InfectionSettings {
            model: config.transmission_model.build(),
            timeline_policy: timeline_policy(&config)?,
            initial_timeline: FixedTimeline {
                infectious_delay: 0.0,
                duration: config.initial_infection_duration,
            },
            multidisease: config.multidisease,
            indoor: config.indoor,
            exposure_hours: config.exposure_hours(),
        });
        assign_interventions(&mut context, &config.interventions)?;

        for initial in &config.initial_infections {
            let person = context
                .person_id(&initial.person)
                .ok_or_else(|| EpiError::UnknownPerson(initial.person.clone()))?;
            context.seed_infection(person, &initial.disease, 0.0)?;
        }

        Ok(Simulation {
            config,
            schedule,
            context,
        })
    }

    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn run(&mut self) -> Result<SimulationOutput, EpiError> {
        let mut due = self.schedule.iter().peekable();
        let mut steps = Vec::new();
        let mut now = 0;

        while now <= self.config.max_length {
            while let Some((time, step)) = due.next_if(|(time, _)| *time <= now) {
                debug!("applying movement scheduled for {time} at {now}");
                apply_movement_step(&mut self.context, step, &self.config.interventions)?;
            }

            let events = self.context.run_infection_step(now as f64, 1)?;
            debug!("step {now}: {} new infections", events.len());
            steps.push(self.summarize(now));
            now += self.config.timestep;
        }

        let infections = infection_records(&self.context)?;
        info!(
            "simulation finished after {} steps with {} infections",
            steps.len(),
            infections.len()
        );
        Ok(SimulationOutput { steps, infections })
    }

    fn summarize(&self, time: u64) -> StepSummary {
        let mut infected: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for person in self
            .context
            .infected_people()
            .iter()
            .filter_map(|&id| self.context.person(id).ok())
        {
            for (disease, state) in &person.states {
                if state.has_flag(InfectionState::INFECTED) {
                    infected.entry(disease.clone()).or_default().push(person.label.clone());
                }
            }
        }
        StepSummary { time, infected }
    }
}
