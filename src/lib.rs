/*!

A stochastic epidemic simulation engine.

The engine has two halves:

 - a per-individual disease progression state machine ([`DiseaseStateMachine`]) that walks a
   weighted transition graph and produces a [`Timeline`] of disease states, and
 - a population-level contact simulator ([`ContextInfectionExt`]) that, at each timestep,
   evaluates a pluggable [`TransmissionModel`] between co-located people and builds forward
   timelines for the newly infected.

All engine state lives in data plugins stored in a [`Context`]. Randomness is drawn from named,
independently seeded streams (see [`random`]), so a fixed seed reproduces a run bit for bit.

*/

pub mod config;
mod context;
pub mod demographics;
pub mod error;
pub mod hashing;
pub mod infection_manager;
pub mod infection_state;
pub mod log;
pub mod matrix;
pub mod movement;
mod new_trait;
pub mod people;
pub mod population;
pub mod random;
pub mod report;
pub mod sampler;
pub mod simulation;
pub mod state_machine;
pub mod transmission;

// All modules import `crate::TypeId` in case we want to change the underlying type of `TypeId`.
pub(crate) use std::any::TypeId;

// Re-exported so that `define_rng!` can name `StdRng` from downstream crates.
pub use rand;

pub use config::{InitialInfection, Interventions, SimulationConfig};
pub use context::Context;
pub use demographics::{DemographicFilter, DiseaseModelRegistry};
pub use error::EpiError;
pub use infection_manager::{
    ContextInfectionExt, FixedTimeline, InfectionEvent, InfectionSettings, TimelinePolicy,
};
pub use infection_state::{DiseaseTimeline, InfectionState, StateInterval};
pub use matrix::{TransitionEdge, TransitionMatrixSet};
pub use movement::{MovementSchedule, MovementStep};
pub use new_trait::New;
pub use people::{Person, PersonId, Sex, Vaccination};
pub use population::{ContextPopulationExt, Location, LocationId, PersonRecord, PopulationFile};
pub use random::ContextRandomExt;
pub use report::{write_infection_log, InfectionRecord};
pub use sampler::{DistributionType, TransitionTimeSampler};
pub use simulation::{Simulation, SimulationOutput, StepSummary};
pub use state_machine::{
    DiseaseStateMachine, StateMachineConfig, StateMachineDefinition, StateMapping, Timeline,
};
pub use transmission::{Environment, TransmissionModel, TransmissionModelConfig};

#[inline(always)]
pub fn type_of<T: 'static>() -> TypeId {
    TypeId::of::<T>()
}
