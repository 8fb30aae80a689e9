//! Transition graphs over an ordered list of states.
//!
//! A [`TransitionMatrixSet`] holds six `n × n` matrices indexed by `(from, to)`: transition
//! probability, distribution type, mean, standard deviation and the two cutoffs. It can be built
//! from the matrices directly or from a list of [`TransitionEdge`] records.

use serde::{Deserialize, Serialize};

use crate::error::EpiError;
use crate::sampler::{DistributionType, TransitionTime};

const ROW_SUM_TOLERANCE: f64 = 1e-6;

fn default_probability() -> f64 {
    1.0
}

fn default_max_cutoff() -> f64 {
    f64::INFINITY
}

/// One directed edge of a transition graph. Times are in days.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionEdge {
    pub source: String,
    pub target: String,
    #[serde(default = "default_probability")]
    pub transition_prob: f64,
    #[serde(default)]
    pub mean_time: f64,
    #[serde(default)]
    pub std_dev: f64,
    #[serde(default)]
    pub distribution_type: DistributionType,
    #[serde(default)]
    pub min_cutoff: f64,
    #[serde(default = "default_max_cutoff")]
    pub max_cutoff: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransitionMatrixSet {
    n: usize,
    probabilities: Vec<Vec<f64>>,
    distributions: Vec<Vec<DistributionType>>,
    means: Vec<Vec<f64>>,
    std_devs: Vec<Vec<f64>>,
    min_cutoffs: Vec<Vec<f64>>,
    max_cutoffs: Vec<Vec<f64>>,
}

fn check_shape<T>(name: &str, matrix: &[Vec<T>], n: usize) -> Result<(), EpiError> {
    if matrix.len() != n || matrix.iter().any(|row| row.len() != n) {
        return Err(EpiError::InvalidMatrix(format!("{name} matrix is not {n}x{n}")));
    }
    Ok(())
}

impl TransitionMatrixSet {
    /// Creates an `n × n` set with no edges: every state is absorbing.
    #[must_use]
    pub fn empty(n: usize) -> Self {
        TransitionMatrixSet {
            n,
            probabilities: vec![vec![0.0; n]; n],
            distributions: vec![vec![DistributionType::Fixed; n]; n],
            means: vec![vec![0.0; n]; n],
            std_devs: vec![vec![0.0; n]; n],
            min_cutoffs: vec![vec![0.0; n]; n],
            max_cutoffs: vec![vec![f64::INFINITY; n]; n],
        }
    }

    /// Assembles a set from six matrices, given in the order probability, distribution code,
    /// mean, standard deviation, minimum cutoff, maximum cutoff. Only the shape and the
    /// distribution codes are checked here; call [`validate`](Self::validate) for the rest.
    pub fn from_matrices(
        probabilities: Vec<Vec<f64>>,
        distribution_codes: &[Vec<u8>],
        means: Vec<Vec<f64>>,
        std_devs: Vec<Vec<f64>>,
        min_cutoffs: Vec<Vec<f64>>,
        max_cutoffs: Vec<Vec<f64>>,
    ) -> Result<Self, EpiError> {
        let n = probabilities.len();
        check_shape("probability", &probabilities, n)?;
        check_shape("distribution type", distribution_codes, n)?;
        check_shape("mean", &means, n)?;
        check_shape("standard deviation", &std_devs, n)?;
        check_shape("minimum cutoff", &min_cutoffs, n)?;
        check_shape("maximum cutoff", &max_cutoffs, n)?;

        let distributions = distribution_codes
            .iter()
            .map(|row| row.iter().map(|&code| DistributionType::from_code(code)).collect())
            .collect::<Result<Vec<Vec<_>>, _>>()?;

        Ok(TransitionMatrixSet {
            n,
            probabilities,
            distributions,
            means,
            std_devs,
            min_cutoffs,
            max_cutoffs,
        })
    }

    /// Builds the matrices from edge records. Pairs without an edge have probability zero.
    pub fn from_edges<S: AsRef<str>>(
        states: &[S],
        edges: &[TransitionEdge],
    ) -> Result<Self, EpiError> {
        let index_of = |name: &str| {
            states
                .iter()
                .position(|state| state.as_ref() == name)
                .ok_or_else(|| EpiError::UnknownState(name.to_string()))
        };

        let mut set = TransitionMatrixSet::empty(states.len());
        for edge in edges {
            let from = index_of(&edge.source)?;
            let to = index_of(&edge.target)?;
            set.probabilities[from][to] = edge.transition_prob;
            set.distributions[from][to] = edge.distribution_type;
            set.means[from][to] = edge.mean_time;
            set.std_devs[from][to] = edge.std_dev;
            set.min_cutoffs[from][to] = edge.min_cutoff;
            set.max_cutoffs[from][to] = edge.max_cutoff;
        }
        Ok(set)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.n
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    #[must_use]
    pub fn probability(&self, from: usize, to: usize) -> f64 {
        self.probabilities[from][to]
    }

    #[must_use]
    pub fn row(&self, from: usize) -> &[f64] {
        &self.probabilities[from]
    }

    /// The delay parameters of the edge `from → to`.
    #[must_use]
    pub fn transition_time(&self, from: usize, to: usize) -> TransitionTime {
        TransitionTime {
            mean: self.means[from][to],
            std_dev: self.std_devs[from][to],
            min_cutoff: self.min_cutoffs[from][to],
            max_cutoff: self.max_cutoffs[from][to],
            distribution: self.distributions[from][to],
        }
    }

    /// Rejects any matrix set that could make a simulation misbehave: probabilities outside
    /// `[0, 1]`, rows summing to neither 0 nor 1, negative or non-finite parameters, inverted
    /// cutoffs, and active edges whose mean lies outside their cutoff range.
    pub fn validate(&self) -> Result<(), EpiError> {
        for from in 0..self.n {
            let mut row_sum = 0.0;
            for to in 0..self.n {
                let p = self.probabilities[from][to];
                if !(0.0..=1.0).contains(&p) {
                    return Err(EpiError::InvalidMatrix(format!(
                        "probability {p} at ({from}, {to}) is outside [0, 1]"
                    )));
                }
                row_sum += p;

                let TransitionTime {
                    mean,
                    std_dev,
                    min_cutoff,
                    max_cutoff,
                    distribution,
                } = self.transition_time(from, to);

                if !mean.is_finite()
                    || !std_dev.is_finite()
                    || !min_cutoff.is_finite()
                    || max_cutoff.is_nan()
                {
                    return Err(EpiError::InvalidMatrix(format!(
                        "non-finite parameter at ({from}, {to})"
                    )));
                }
                if mean < 0.0 || std_dev < 0.0 {
                    return Err(EpiError::InvalidMatrix(format!(
                        "negative mean or standard deviation at ({from}, {to})"
                    )));
                }
                if min_cutoff < 0.0 || min_cutoff > max_cutoff {
                    return Err(EpiError::InvalidMatrix(format!(
                        "cutoffs [{min_cutoff}, {max_cutoff}] at ({from}, {to}) are invalid"
                    )));
                }

                if p > 0.0 && from != to {
                    if distribution != DistributionType::Fixed
                        && !(min_cutoff..=max_cutoff).contains(&mean)
                    {
                        return Err(EpiError::InvalidMatrix(format!(
                            "mean {mean} at ({from}, {to}) is outside cutoffs [{min_cutoff}, {max_cutoff}]"
                        )));
                    }
                    if matches!(distribution, DistributionType::LogNormal | DistributionType::Gamma)
                        && std_dev > 0.0
                        && mean <= 0.0
                    {
                        return Err(EpiError::InvalidMatrix(format!(
                            "{distribution} edge at ({from}, {to}) needs a positive mean"
                        )));
                    }
                }
            }

            if row_sum.abs() > ROW_SUM_TOLERANCE && (row_sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(EpiError::InvalidMatrix(format!(
                    "row {from} sums to {row_sum}, expected 0 or 1"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(source: &str, target: &str, p: f64, mean: f64, min: f64, max: f64) -> TransitionEdge {
        TransitionEdge {
            source: source.to_string(),
            target: target.to_string(),
            transition_prob: p,
            mean_time: mean,
            std_dev: 1.0,
            distribution_type: DistributionType::Normal,
            min_cutoff: min,
            max_cutoff: max,
        }
    }

    fn scenario_edges() -> Vec<TransitionEdge> {
        vec![
            edge("Infected", "Recovered", 0.8, 5.0, 3.0, 8.0),
            edge("Infected", "Deceased", 0.2, 6.0, 4.0, 8.0),
        ]
    }

    const STATES: [&str; 3] = ["Infected", "Recovered", "Deceased"];

    #[test]
    fn edges_build_a_valid_set() {
        let set = TransitionMatrixSet::from_edges(&STATES, &scenario_edges()).unwrap();
        set.validate().unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.probability(0, 1), 0.8);
        assert_eq!(set.row(1), &[0.0, 0.0, 0.0]);
        let time = set.transition_time(0, 2);
        assert_eq!(time.mean, 6.0);
        assert_eq!(time.min_cutoff, 4.0);
    }

    #[test]
    fn edge_defaults() {
        let edge: TransitionEdge =
            serde_json::from_str(r#"{"source": "Infected", "target": "Recovered"}"#).unwrap();
        assert_eq!(edge.transition_prob, 1.0);
        assert_eq!(edge.distribution_type, DistributionType::Normal);
        assert_eq!(edge.min_cutoff, 0.0);
        assert!(edge.max_cutoff.is_infinite());
    }

    #[test]
    fn unknown_state_in_edge() {
        let edges = vec![edge("Infected", "Zombie", 1.0, 5.0, 0.0, 10.0)];
        assert!(matches!(
            TransitionMatrixSet::from_edges(&STATES, &edges),
            Err(EpiError::UnknownState(name)) if name == "Zombie"
        ));
    }

    #[test]
    fn row_sum_must_be_zero_or_one() {
        let mut edges = scenario_edges();
        edges[1].transition_prob = 0.1;
        let set = TransitionMatrixSet::from_edges(&STATES, &edges).unwrap();
        assert!(matches!(set.validate(), Err(EpiError::InvalidMatrix(_))));
    }

    #[test]
    fn probability_out_of_range() {
        let mut edges = scenario_edges();
        edges[0].transition_prob = 1.2;
        edges[1].transition_prob = -0.2;
        let set = TransitionMatrixSet::from_edges(&STATES, &edges).unwrap();
        assert!(set.validate().is_err());
    }

    #[test]
    fn mean_outside_cutoffs() {
        let mut edges = scenario_edges();
        edges[0].mean_time = 9.0;
        let set = TransitionMatrixSet::from_edges(&STATES, &edges).unwrap();
        assert!(set.validate().is_err());
    }

    #[test]
    fn inverted_cutoffs() {
        let mut edges = scenario_edges();
        edges[0].min_cutoff = 9.0;
        edges[0].max_cutoff = 2.0;
        let set = TransitionMatrixSet::from_edges(&STATES, &edges).unwrap();
        assert!(set.validate().is_err());
    }

    #[test]
    fn from_matrices_checks_shape_and_codes() {
        let square = |v: f64| vec![vec![v; 2]; 2];
        assert!(TransitionMatrixSet::from_matrices(
            square(0.0),
            &[vec![0, 0], vec![0, 0]],
            square(0.0),
            square(0.0),
            square(0.0),
            vec![vec![1.0; 2]],
        )
        .is_err());

        assert!(matches!(
            TransitionMatrixSet::from_matrices(
                square(0.0),
                &[vec![0, 9], vec![0, 0]],
                square(0.0),
                square(0.0),
                square(0.0),
                square(1.0),
            ),
            Err(EpiError::UnknownDistribution(_))
        ));

        let set = TransitionMatrixSet::from_matrices(
            vec![vec![0.0, 1.0], vec![0.0, 0.0]],
            &[vec![0, 3], vec![0, 0]],
            vec![vec![0.0, 2.0], vec![0.0, 0.0]],
            vec![vec![0.0, 0.5], vec![0.0, 0.0]],
            square(0.0),
            square(10.0),
        )
        .unwrap();
        set.validate().unwrap();
        assert_eq!(set.transition_time(0, 1).distribution, DistributionType::LogNormal);
    }
}
