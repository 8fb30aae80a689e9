/*!

Per-individual disease progression.

A [`DiseaseStateMachine`] walks one person through an ordered list of states. At each step the
next state is drawn from the current row of the transition probability matrix, and the time
spent before moving is drawn with the [`TransitionTimeSampler`]. The walk produces a
[`Timeline`] of `(state, elapsed hours)` entries that starts at `(initial state, 0)`.

The walk stops when

* the current row has no outgoing probability mass,
* the walk moves into one of the configured terminal states, or
* `max_iterations` draws have been made, in which case a warning is logged and the
  [`IterationCapPolicy`] decides what is returned.

A draw that lands on the current state consumes an iteration without advancing time or
extending the timeline. Terminal names are only checked after a move, so a walk that starts
in a terminal-named state with outgoing mass still leaves it.

*/

use rand::distr::weighted::WeightedIndex;
use rand::prelude::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::EpiError;
use crate::hashing::HashMap;
use crate::infection_state::{InfectionState, StateInterval};
use crate::log::{trace, warn};
use crate::matrix::{TransitionEdge, TransitionMatrixSet};
use crate::sampler::TransitionTimeSampler;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub state: String,
    /// Hours since the start of the timeline.
    pub time: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    fn start(state: &str) -> Self {
        Timeline {
            entries: vec![TimelineEntry {
                state: state.to_string(),
                time: 0.0,
            }],
        }
    }

    fn push(&mut self, state: &str, time: f64) {
        self.entries.push(TimelineEntry {
            state: state.to_string(),
            time,
        });
    }

    #[must_use]
    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&TimelineEntry> {
        self.entries.last()
    }

    /// Converts the timeline into flag intervals. Entry `i` covers
    /// `[anchor + tᵢ·scale, anchor + tᵢ₊₁·scale)`, the last entry is open-ended, and touching
    /// intervals of the same flag are merged. Zero-length entries produce no interval.
    #[must_use]
    pub fn to_intervals(
        &self,
        mapping: &StateMapping,
        anchor: f64,
        scale: f64,
    ) -> Vec<StateInterval> {
        let mut intervals: Vec<StateInterval> = Vec::new();
        for (i, entry) in self.entries.iter().enumerate() {
            let start = anchor + entry.time * scale;
            let end = self
                .entries
                .get(i + 1)
                .map_or(f64::INFINITY, |next| anchor + next.time * scale);
            if end <= start {
                continue;
            }

            for flag in mapping.flags_for(&entry.state).flags() {
                match intervals.iter_mut().rev().find(|interval| interval.flag == flag) {
                    Some(previous) if previous.end == start => previous.end = end,
                    _ => intervals.push(StateInterval::new(flag, start, end)),
                }
            }
        }
        intervals
    }
}

/// What to return when a walk hits `max_iterations` before stopping on its own.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationCapPolicy {
    /// Return the timeline built so far.
    #[default]
    ReturnAsIs,
    /// Append the named state at the time of the last entry, unless the timeline already
    /// ends in it.
    AppendTerminal(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateMachineConfig {
    pub max_iterations: usize,
    pub terminal_states: Vec<String>,
    /// Timeline hours per unit of the matrix times (days).
    pub hours_per_unit: f64,
    pub cap_policy: IterationCapPolicy,
    pub sampler: TransitionTimeSampler,
}

impl Default for StateMachineConfig {
    fn default() -> Self {
        StateMachineConfig {
            max_iterations: 1000,
            terminal_states: vec!["Recovered".to_string(), "Deceased".to_string()],
            hours_per_unit: 24.0,
            cap_policy: IterationCapPolicy::default(),
            sampler: TransitionTimeSampler::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DiseaseStateMachine {
    states: Vec<String>,
    matrices: TransitionMatrixSet,
    config: StateMachineConfig,
    // One categorical sampler per row; `None` for rows without outgoing mass.
    choosers: Vec<Option<WeightedIndex<f64>>>,
}

impl DiseaseStateMachine {
    /// Validates the matrix set against the state list and prepares the per-row samplers.
    pub fn new(
        states: Vec<String>,
        matrices: TransitionMatrixSet,
        config: StateMachineConfig,
    ) -> Result<Self, EpiError> {
        if states.is_empty() {
            return Err(EpiError::InvalidMatrix("the state list is empty".to_string()));
        }
        if states.len() != matrices.len() {
            return Err(EpiError::InvalidMatrix(format!(
                "{} states but {}x{} matrices",
                states.len(),
                matrices.len(),
                matrices.len()
            )));
        }
        if config.max_iterations == 0 {
            return Err(EpiError::InvalidConfig("max_iterations must be positive".to_string()));
        }
        matrices.validate()?;

        let choosers = (0..states.len())
            .map(|row| WeightedIndex::new(matrices.row(row)).ok())
            .collect();

        Ok(DiseaseStateMachine {
            states,
            matrices,
            config,
            choosers,
        })
    }

    /// Builds a machine from edge records, as produced by the authoring tools.
    pub fn from_edges(
        states: Vec<String>,
        edges: &[TransitionEdge],
        config: StateMachineConfig,
    ) -> Result<Self, EpiError> {
        let matrices = TransitionMatrixSet::from_edges(&states, edges)?;
        Self::new(states, matrices, config)
    }

    #[must_use]
    pub fn states(&self) -> &[String] {
        &self.states
    }

    #[must_use]
    pub fn config(&self) -> &StateMachineConfig {
        &self.config
    }

    pub fn state_index(&self, name: &str) -> Result<usize, EpiError> {
        self.states
            .iter()
            .position(|state| state == name)
            .ok_or_else(|| EpiError::UnknownState(name.to_string()))
    }

    fn is_terminal(&self, state: &str) -> bool {
        self.config.terminal_states.iter().any(|terminal| terminal == state)
    }

    /// Walks from the state named `initial`.
    pub fn run_from_state<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        initial: &str,
    ) -> Result<Timeline, EpiError> {
        let index = self.state_index(initial)?;
        self.run(rng, index)
    }

    /// Walks from state index `initial` and returns the resulting timeline. Fails only when
    /// `initial` is out of range or a transition delay cannot be drawn.
    pub fn run<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        initial: usize,
    ) -> Result<Timeline, EpiError> {
        let Some(initial_state) = self.states.get(initial) else {
            return Err(EpiError::UnknownState(format!("state index {initial}")));
        };

        let mut current = initial;
        let mut total_time = 0.0;
        let mut timeline = Timeline::start(initial_state);

        for _ in 0..self.config.max_iterations {
            let Some(chooser) = &self.choosers[current] else {
                return Ok(timeline);
            };

            let next = chooser.sample(rng);
            if next == current {
                continue;
            }

            let delay = self
                .config
                .sampler
                .sample(rng, &self.matrices.transition_time(current, next))?;
            total_time += delay * self.config.hours_per_unit;
            trace!(
                "{} -> {} after {delay} units",
                self.states[current], self.states[next]
            );
            timeline.push(&self.states[next], total_time);
            current = next;
            if self.is_terminal(&self.states[current]) {
                return Ok(timeline);
            }
        }

        if self.is_terminal(&self.states[current]) || self.choosers[current].is_none() {
            return Ok(timeline);
        }

        warn!(
            "state machine reached {} iterations in state {} without terminating",
            self.config.max_iterations, self.states[current]
        );
        if let IterationCapPolicy::AppendTerminal(terminal) = &self.config.cap_policy {
            if self.states[current] != *terminal {
                timeline.push(terminal, total_time);
            }
        }
        Ok(timeline)
    }
}

/// A state machine as stored by the authoring tools.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateMachineDefinition {
    pub name: String,
    pub disease_name: String,
    pub states: Vec<String>,
    pub edges: Vec<TransitionEdge>,
    #[serde(default)]
    pub demographics: std::collections::BTreeMap<String, String>,
}

impl StateMachineDefinition {
    pub fn into_state_machine(
        self,
        config: StateMachineConfig,
    ) -> Result<DiseaseStateMachine, EpiError> {
        DiseaseStateMachine::from_edges(self.states, &self.edges, config)
    }
}

/// Maps state names to the flags they set. Names without an entry map to `INFECTED`.
#[derive(Clone, Debug, PartialEq)]
pub struct StateMapping {
    flags: HashMap<String, InfectionState>,
}

impl StateMapping {
    #[must_use]
    pub fn empty() -> Self {
        StateMapping {
            flags: HashMap::default(),
        }
    }

    #[must_use]
    pub fn with(mut self, state: &str, flags: InfectionState) -> Self {
        self.flags.insert(state.to_string(), flags);
        self
    }

    #[must_use]
    pub fn flags_for(&self, state: &str) -> InfectionState {
        self.flags
            .get(state)
            .copied()
            .unwrap_or(InfectionState::INFECTED)
    }
}

impl Default for StateMapping {
    fn default() -> Self {
        use InfectionState as S;
        StateMapping::empty()
            .with("Infected", S::INFECTED)
            .with("Infectious_Asymptomatic", S::INFECTED | S::INFECTIOUS)
            .with("Infectious_Symptomatic", S::INFECTED | S::INFECTIOUS | S::SYMPTOMATIC)
            .with("Hospitalized", S::INFECTED | S::HOSPITALIZED)
            .with("ICU", S::INFECTED | S::HOSPITALIZED)
            .with("Recovered", S::RECOVERED)
            .with("Deceased", S::REMOVED)
            .with("Removed", S::REMOVED)
    }
}
