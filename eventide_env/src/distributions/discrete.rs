//! Discrete distributions: Poisson counts and weighted empirical choice.

use crate::error::{DistResult, DistributionError};
use crate::distributions::check_probability;
use rand::Rng;
use rand_distr::Distribution;
use statrs::distribution::{self as stats, DiscreteCDF};

/// Poisson distribution with rate `lambda`.
#[derive(Debug, Clone)]
pub struct Poisson {
    lambda: f64,
    sampler: rand_distr::Poisson<f64>,
    law: stats::Poisson,
}

impl Poisson {
    /// Fits a Poisson with `lambda > 0`.
    pub fn new(lambda: f64) -> DistResult<Self> {
        if !(lambda > 0.0) || !lambda.is_finite() {
            return Err(DistributionError::invalid("lambda", lambda, "must be positive"));
        }
        Ok(Self {
            lambda,
            sampler: rand_distr::Poisson::new(lambda).map_err(DistributionError::backend)?,
            law: stats::Poisson::new(lambda).map_err(DistributionError::backend)?,
        })
    }

    pub fn mean(&self) -> f64 {
        self.lambda
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let count: f64 = self.sampler.sample(rng);
        count as u64
    }

    /// `P(X <= x)`; a negative `x` is rejected.
    pub fn cdf(&self, x: f64) -> DistResult<f64> {
        if !(x >= 0.0) {
            return Err(DistributionError::invalid("x", x, "must be non-negative"));
        }
        Ok(self.law.cdf(x.floor() as u64))
    }

    /// Smallest count whose CDF reaches `p`.
    pub fn inv_cdf(&self, p: f64) -> DistResult<u64> {
        let p = check_probability(p)?;
        Ok(self.law.inverse_cdf(p))
    }
}

/// Weighted choice among a fixed set of items.
///
/// Weights need not be normalised; zero weights are allowed as long as at
/// least one weight is positive.
#[derive(Debug, Clone, PartialEq)]
pub struct Empirical<T> {
    items: Vec<T>,
    weights: Vec<f64>,
    total: f64,
}

impl<T> Empirical<T> {
    /// Builds from `(item, weight)` pairs, preserving their order.
    pub fn new(pairs: impl IntoIterator<Item = (T, f64)>) -> DistResult<Self> {
        let (items, weights): (Vec<T>, Vec<f64>) = pairs.into_iter().unzip();
        if items.is_empty() {
            return Err(DistributionError::EmptyCandidates("ratio set"));
        }
        if let Some(bad) = weights.iter().copied().find(|w| !(w.is_finite() && *w >= 0.0)) {
            return Err(DistributionError::invalid("ratio", bad, "must be finite and non-negative"));
        }
        let total: f64 = weights.iter().sum();
        if !(total > 0.0) {
            return Err(DistributionError::invalid("ratio", total, "ratios must not all be zero"));
        }
        Ok(Self { items, weights, total })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Probability mass of the item at `index`.
    pub fn probability(&self, index: usize) -> Option<f64> {
        self.weights.get(index).map(|w| w / self.total)
    }

    /// Draws the index of one item.
    pub fn sample_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let mut threshold = rng.gen::<f64>() * self.total;
        for (i, w) in self.weights.iter().enumerate() {
            if threshold < *w {
                return i;
            }
            threshold -= w;
        }
        // Rounding can leave a sliver past the last bucket
        self.weights.iter().rposition(|w| *w > 0.0).unwrap_or(0)
    }

    /// Draws one item.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> &T {
        &self.items[self.sample_index(rng)]
    }
}

impl Empirical<usize> {
    /// Index-valued empirical distribution over `ratios`.
    pub fn from_ratios(ratios: &[f64]) -> DistResult<Self> {
        Self::new(ratios.iter().copied().enumerate())
    }
}
