//! Composite disease status as bit flags, and the interval timelines it is computed from.

use std::fmt::{self, Display};
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// A set of simultaneously active status flags for one disease. The empty set is
/// [`InfectionState::SUSCEPTIBLE`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InfectionState(u8);

impl InfectionState {
    pub const SUSCEPTIBLE: InfectionState = InfectionState(0);
    pub const INFECTED: InfectionState = InfectionState(1);
    pub const INFECTIOUS: InfectionState = InfectionState(1 << 1);
    pub const SYMPTOMATIC: InfectionState = InfectionState(1 << 2);
    pub const HOSPITALIZED: InfectionState = InfectionState(1 << 3);
    pub const RECOVERED: InfectionState = InfectionState(1 << 4);
    pub const REMOVED: InfectionState = InfectionState(1 << 5);

    const NAMED: [(InfectionState, &'static str); 6] = [
        (InfectionState::INFECTED, "INFECTED"),
        (InfectionState::INFECTIOUS, "INFECTIOUS"),
        (InfectionState::SYMPTOMATIC, "SYMPTOMATIC"),
        (InfectionState::HOSPITALIZED, "HOSPITALIZED"),
        (InfectionState::RECOVERED, "RECOVERED"),
        (InfectionState::REMOVED, "REMOVED"),
    ];

    #[must_use]
    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn add_flag(&mut self, flag: InfectionState) {
        self.0 |= flag.0;
    }

    pub fn remove_flag(&mut self, flag: InfectionState) {
        self.0 &= !flag.0;
    }

    /// True when every flag in `flag` is set. `has_flag(SUSCEPTIBLE)` is always true; use
    /// [`is_susceptible`](Self::is_susceptible) to test for the empty set.
    #[must_use]
    pub fn has_flag(self, flag: InfectionState) -> bool {
        self.0 & flag.0 == flag.0
    }

    /// True when any flag in `flags` is set.
    #[must_use]
    pub fn intersects(self, flags: InfectionState) -> bool {
        self.0 & flags.0 != 0
    }

    #[must_use]
    pub fn is_susceptible(self) -> bool {
        self.0 == 0
    }

    /// The individual flags that are set, lowest bit first.
    pub fn flags(self) -> impl Iterator<Item = InfectionState> {
        Self::NAMED
            .into_iter()
            .map(|(flag, _)| flag)
            .filter(move |&flag| self.has_flag(flag))
    }
}

impl BitOr for InfectionState {
    type Output = InfectionState;

    fn bitor(self, rhs: InfectionState) -> InfectionState {
        InfectionState(self.0 | rhs.0)
    }
}

impl Display for InfectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_susceptible() {
            return f.write_str("SUSCEPTIBLE");
        }
        let names: Vec<&str> = Self::NAMED
            .iter()
            .filter(|(flag, _)| self.has_flag(*flag))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&names.join("|"))
    }
}

/// A flag that is active on `[start, end)`. Times are simulation minutes.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateInterval {
    pub flag: InfectionState,
    pub start: f64,
    pub end: f64,
}

impl StateInterval {
    #[must_use]
    pub fn new(flag: InfectionState, start: f64, end: f64) -> Self {
        debug_assert!(end >= start, "interval ends before it starts");
        StateInterval { flag, start, end }
    }

    #[must_use]
    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time < self.end
    }
}

/// The intervals one person carries for one disease.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiseaseTimeline {
    intervals: Vec<StateInterval>,
}

impl DiseaseTimeline {
    #[must_use]
    pub fn new(intervals: Vec<StateInterval>) -> Self {
        DiseaseTimeline { intervals }
    }

    pub fn push(&mut self, interval: StateInterval) {
        self.intervals.push(interval);
    }

    #[must_use]
    pub fn intervals(&self) -> &[StateInterval] {
        &self.intervals
    }

    /// The composite state at `time`: the union of the flags whose interval contains it.
    /// Recomputed from scratch so that a flag ending and another starting on the same tick
    /// resolve the same way regardless of interval order.
    #[must_use]
    pub fn state_at(&self, time: f64) -> InfectionState {
        self.intervals
            .iter()
            .filter(|interval| interval.contains(time))
            .fold(InfectionState::SUSCEPTIBLE, |state, interval| state | interval.flag)
    }

    /// The time the last interval ends, or `None` for an empty timeline.
    #[must_use]
    pub fn end(&self) -> Option<f64> {
        self.intervals.iter().map(|interval| interval.end).reduce(f64::max)
    }

    /// True when no interval starts or ends after `time`, so the state at `time` holds from
    /// then on.
    #[must_use]
    pub fn is_settled_at(&self, time: f64) -> bool {
        self.intervals.iter().all(|interval| {
            interval.start <= time && (interval.end <= time || interval.end.is_infinite())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settled_timelines() {
        let timeline = DiseaseTimeline::new(vec![
            StateInterval::new(InfectionState::INFECTED, 0.0, 60.0),
            StateInterval::new(InfectionState::RECOVERED, 60.0, f64::INFINITY),
        ]);
        assert!(!timeline.is_settled_at(59.0));
        assert!(timeline.is_settled_at(60.0));
        assert!(DiseaseTimeline::default().is_settled_at(0.0));
    }

    #[test]
    fn flag_operations() {
        let mut state = InfectionState::SUSCEPTIBLE;
        assert!(state.is_susceptible());
        state.add_flag(InfectionState::INFECTED);
        state.add_flag(InfectionState::INFECTIOUS);
        assert!(state.has_flag(InfectionState::INFECTED | InfectionState::INFECTIOUS));
        assert!(!state.has_flag(InfectionState::SYMPTOMATIC));
        state.remove_flag(InfectionState::INFECTED);
        assert_eq!(state, InfectionState::INFECTIOUS);
        assert!(state.intersects(InfectionState::INFECTED | InfectionState::INFECTIOUS));
        state.remove_flag(InfectionState::INFECTIOUS);
        assert!(state.is_susceptible());
    }

    #[test]
    fn display_lists_flags() {
        let state = InfectionState::INFECTED | InfectionState::SYMPTOMATIC;
        assert_eq!(state.to_string(), "INFECTED|SYMPTOMATIC");
        assert_eq!(InfectionState::SUSCEPTIBLE.to_string(), "SUSCEPTIBLE");
        assert_eq!(state.flags().count(), 2);
    }

    #[test]
    fn overlapping_intervals_combine() {
        let timeline = DiseaseTimeline::new(vec![
            StateInterval::new(InfectionState::INFECTED, 0.0, 100.0),
            StateInterval::new(InfectionState::INFECTIOUS, 20.0, 60.0),
            StateInterval::new(InfectionState::RECOVERED, 100.0, f64::INFINITY),
        ]);
        assert_eq!(timeline.state_at(-1.0), InfectionState::SUSCEPTIBLE);
        assert_eq!(timeline.state_at(0.0), InfectionState::INFECTED);
        assert_eq!(
            timeline.state_at(20.0),
            InfectionState::INFECTED | InfectionState::INFECTIOUS
        );
        assert_eq!(timeline.state_at(60.0), InfectionState::INFECTED);
        // End is exclusive; the next flag starts on the same tick.
        assert_eq!(timeline.state_at(100.0), InfectionState::RECOVERED);
        assert_eq!(timeline.end(), Some(f64::INFINITY));
    }

    #[test]
    fn serializes_as_bits() {
        let state = InfectionState::INFECTED | InfectionState::INFECTIOUS;
        assert_eq!(serde_json::to_string(&state).unwrap(), "3");
    }
}
