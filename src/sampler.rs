//! Draws transition delays from a configured distribution, bounded to `[min_cutoff, max_cutoff]`.
//!
//! Values outside the cutoff range are rejected and redrawn. The number of redraws is bounded by
//! [`TransitionTimeSampler::max_attempts`]; what happens when the budget runs out is decided by
//! the [`CutoffFallback`].

use std::fmt::{self, Display};
use std::str::FromStr;

use rand::distr::Uniform;
use rand::Rng;
use rand_distr::{Distribution, Gamma, LogNormal, Normal};
use serde::{Deserialize, Serialize};

use crate::error::EpiError;
use crate::log::warn;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DistributionType {
    Fixed,
    Normal,
    Uniform,
    LogNormal,
    Gamma,
}

impl DistributionType {
    /// Decodes the numeric codes used in distribution-type matrices.
    pub fn from_code(code: u8) -> Result<Self, EpiError> {
        match code {
            0 => Ok(DistributionType::Fixed),
            1 => Ok(DistributionType::Normal),
            2 => Ok(DistributionType::Uniform),
            3 => Ok(DistributionType::LogNormal),
            4 => Ok(DistributionType::Gamma),
            other => Err(EpiError::UnknownDistribution(other.to_string())),
        }
    }

    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            DistributionType::Fixed => 0,
            DistributionType::Normal => 1,
            DistributionType::Uniform => 2,
            DistributionType::LogNormal => 3,
            DistributionType::Gamma => 4,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            DistributionType::Fixed => "fixed",
            DistributionType::Normal => "normal",
            DistributionType::Uniform => "uniform",
            DistributionType::LogNormal => "log-normal",
            DistributionType::Gamma => "gamma",
        }
    }
}

impl Default for DistributionType {
    // Edge records without a distribution are "triangular", which is sampled as a normal.
    fn default() -> Self {
        DistributionType::Normal
    }
}

impl FromStr for DistributionType {
    type Err = EpiError;

    /// Parses edge-record names. `"triangular"` is sampled with the normal distribution.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(DistributionType::Fixed),
            "normal" | "triangular" => Ok(DistributionType::Normal),
            "uniform" => Ok(DistributionType::Uniform),
            "log-normal" | "lognormal" => Ok(DistributionType::LogNormal),
            "gamma" => Ok(DistributionType::Gamma),
            _ => Err(EpiError::UnknownDistribution(name.to_string())),
        }
    }
}

impl TryFrom<String> for DistributionType {
    type Error = EpiError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

impl From<DistributionType> for String {
    fn from(distribution: DistributionType) -> Self {
        distribution.name().to_string()
    }
}

impl Display for DistributionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The parameters of one transition's delay, in days.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TransitionTime {
    pub mean: f64,
    pub std_dev: f64,
    pub min_cutoff: f64,
    pub max_cutoff: f64,
    pub distribution: DistributionType,
}

/// What to do when no draw lands inside the cutoff range within the attempt budget.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutoffFallback {
    /// Fail with [`EpiError::RejectionBudgetExhausted`].
    #[default]
    Error,
    /// Clamp the last draw to the nearest cutoff.
    Clamp,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionTimeSampler {
    pub max_attempts: usize,
    pub fallback: CutoffFallback,
}

impl Default for TransitionTimeSampler {
    fn default() -> Self {
        TransitionTimeSampler {
            max_attempts: 10_000,
            fallback: CutoffFallback::Error,
        }
    }
}

// One configured distribution, built once per `sample` call and drawn from repeatedly.
enum Sampler {
    Constant(f64),
    Normal(Normal<f64>),
    Uniform(Uniform<f64>),
    LogNormal(LogNormal<f64>),
    Gamma(Gamma<f64>),
}

impl Sampler {
    fn new(params: &TransitionTime) -> Result<Self, EpiError> {
        let TransitionTime {
            mean,
            std_dev,
            distribution,
            ..
        } = *params;
        let invalid = |e: &dyn Display| {
            EpiError::InvalidDistribution(format!(
                "{distribution} with mean {mean} and std_dev {std_dev}: {e}"
            ))
        };

        // A distribution with no spread collapses to its mean.
        if distribution == DistributionType::Fixed || std_dev == 0.0 {
            return Ok(Sampler::Constant(mean));
        }

        let sampler = match distribution {
            DistributionType::Fixed => Sampler::Constant(mean),
            DistributionType::Normal => {
                Sampler::Normal(Normal::new(mean, std_dev).map_err(|e| invalid(&e))?)
            }
            DistributionType::Uniform => Sampler::Uniform(
                Uniform::new_inclusive(mean - std_dev, mean + std_dev).map_err(|e| invalid(&e))?,
            ),
            DistributionType::LogNormal => {
                let mu = (mean.powi(2) / (std_dev.powi(2) + mean.powi(2)).sqrt()).ln();
                let sigma = (1.0 + std_dev.powi(2) / mean.powi(2)).ln().sqrt();
                Sampler::LogNormal(LogNormal::new(mu, sigma).map_err(|e| invalid(&e))?)
            }
            DistributionType::Gamma => {
                let shape = (mean / std_dev).powi(2);
                let scale = std_dev.powi(2) / mean;
                Sampler::Gamma(Gamma::new(shape, scale).map_err(|e| invalid(&e))?)
            }
        };
        Ok(sampler)
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Sampler::Constant(value) => *value,
            Sampler::Normal(d) => d.sample(rng),
            Sampler::Uniform(d) => d.sample(rng),
            Sampler::LogNormal(d) => d.sample(rng),
            Sampler::Gamma(d) => d.sample(rng),
        }
    }
}

impl TransitionTimeSampler {
    /// Draws one transition delay. `Fixed` returns the mean without looking at the cutoffs;
    /// every other distribution is redrawn until the value lies in `[min_cutoff, max_cutoff]`.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        params: &TransitionTime,
    ) -> Result<f64, EpiError> {
        if params.distribution == DistributionType::Fixed {
            return Ok(params.mean);
        }

        let sampler = Sampler::new(params)?;
        let in_range = |value: f64| params.min_cutoff <= value && value <= params.max_cutoff;

        let mut last = f64::NAN;
        for _ in 0..self.max_attempts {
            last = sampler.draw(rng);
            if in_range(last) {
                return Ok(last);
            }
        }

        match self.fallback {
            CutoffFallback::Clamp if !last.is_nan() => {
                let clamped = last.clamp(params.min_cutoff, params.max_cutoff);
                warn!(
                    "no {} draw inside [{}, {}] after {} attempts; clamped {last} to {clamped}",
                    params.distribution, params.min_cutoff, params.max_cutoff, self.max_attempts
                );
                Ok(clamped)
            }
            _ => Err(EpiError::RejectionBudgetExhausted {
                attempts: self.max_attempts,
                min_cutoff: params.min_cutoff,
                max_cutoff: params.max_cutoff,
            }),
        }
    }
}
