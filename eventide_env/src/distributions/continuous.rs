//! Continuous distributions parameterised the way simulation models quote
//! them: by mean and coefficient of variation where that makes sense.
//!
//! Sampling goes through `rand_distr`; CDF and inverse CDF go through
//! `statrs`. Both are fitted once at construction so evaluation never fails
//! on parameters.

use crate::error::{DistResult, DistributionError};
use crate::distributions::{check_probability, step_cdf};
use rand::Rng;
use rand_distr::Distribution;
use statrs::distribution::{self as stats, ContinuousCDF};

/// Smallest mean accepted by [`Exponential`].
pub const MIN_EXPONENTIAL_MEAN: f64 = 1e-10;

fn non_negative(name: &'static str, value: f64) -> DistResult<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(DistributionError::invalid(name, value, "must be finite and non-negative"))
    }
}

fn finite(name: &'static str, value: f64) -> DistResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DistributionError::invalid(name, value, "must be finite"))
    }
}

// =============================================================================
// EXPONENTIAL
// =============================================================================

/// Exponential distribution with the given mean.
#[derive(Debug, Clone)]
pub struct Exponential {
    mean: f64,
    sampler: rand_distr::Exp<f64>,
    law: stats::Exp,
}

impl Exponential {
    /// Fits an exponential with `mean > 1e-10`.
    pub fn new(mean: f64) -> DistResult<Self> {
        if !(mean > MIN_EXPONENTIAL_MEAN) || !mean.is_finite() {
            return Err(DistributionError::invalid("mean", mean, "must be greater than zero"));
        }
        let rate = 1.0 / mean;
        Ok(Self {
            mean,
            sampler: rand_distr::Exp::new(rate).map_err(DistributionError::backend)?,
            law: stats::Exp::new(rate).map_err(DistributionError::backend)?,
        })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.sampler.sample(rng)
    }

    pub fn cdf(&self, x: f64) -> f64 {
        self.law.cdf(x)
    }

    pub fn inv_cdf(&self, p: f64) -> DistResult<f64> {
        let p = check_probability(p)?;
        Ok(-self.mean * (1.0 - p).ln())
    }
}

// =============================================================================
// GAMMA
// =============================================================================

/// Gamma distribution fitted from mean and coefficient of variation
/// (shape `k = 1/cv²`, rate `k/mean`).
#[derive(Debug, Clone)]
pub struct Gamma {
    mean: f64,
    cv: f64,
    /// `None` when the distribution collapses onto its mean
    fitted: Option<(rand_distr::Gamma<f64>, stats::Gamma)>,
}

impl Gamma {
    pub fn new(mean: f64, cv: f64) -> DistResult<Self> {
        let mean = non_negative("mean", mean)?;
        let cv = non_negative("cv", cv)?;
        let fitted = if mean == 0.0 || cv == 0.0 {
            None
        } else {
            let k = 1.0 / (cv * cv);
            let rate = k / mean;
            Some((
                rand_distr::Gamma::new(k, 1.0 / rate).map_err(DistributionError::backend)?,
                stats::Gamma::new(k, rate).map_err(DistributionError::backend)?,
            ))
        };
        Ok(Self { mean, cv, fitted })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn cv(&self) -> f64 {
        self.cv
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match &self.fitted {
            Some((sampler, _)) => sampler.sample(rng),
            None => self.mean,
        }
    }

    pub fn cdf(&self, x: f64) -> f64 {
        match &self.fitted {
            Some((_, law)) => law.cdf(x),
            None => step_cdf(self.mean, x),
        }
    }

    pub fn inv_cdf(&self, p: f64) -> DistResult<f64> {
        let p = check_probability(p)?;
        Ok(match &self.fitted {
            Some((_, law)) => law.inverse_cdf(p),
            None => self.mean,
        })
    }
}

// =============================================================================
// NORMAL
// =============================================================================

/// Normal distribution with standard deviation `cv * mean`.
#[derive(Debug, Clone)]
pub struct Normal {
    mean: f64,
    cv: f64,
    fitted: Option<(rand_distr::Normal<f64>, stats::Normal)>,
}

impl Normal {
    pub fn new(mean: f64, cv: f64) -> DistResult<Self> {
        let mean = non_negative("mean", mean)?;
        let cv = non_negative("cv", cv)?;
        let std_dev = cv * mean;
        let fitted = if std_dev == 0.0 {
            None
        } else {
            Some((
                rand_distr::Normal::new(mean, std_dev).map_err(DistributionError::backend)?,
                stats::Normal::new(mean, std_dev).map_err(DistributionError::backend)?,
            ))
        };
        Ok(Self { mean, cv, fitted })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn std_dev(&self) -> f64 {
        self.cv * self.mean
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match &self.fitted {
            Some((sampler, _)) => sampler.sample(rng),
            None => self.mean,
        }
    }

    pub fn cdf(&self, x: f64) -> f64 {
        match &self.fitted {
            Some((_, law)) => law.cdf(x),
            None => step_cdf(self.mean, x),
        }
    }

    pub fn inv_cdf(&self, p: f64) -> DistResult<f64> {
        let p = check_probability(p)?;
        Ok(match &self.fitted {
            Some((_, law)) => law.inverse_cdf(p),
            None => self.mean,
        })
    }
}

// =============================================================================
// LOG-NORMAL
// =============================================================================

/// Log-normal distribution whose *own* mean and CV are given.
#[derive(Debug, Clone)]
pub struct LogNormal {
    mean: f64,
    cv: f64,
    fitted: Option<(rand_distr::LogNormal<f64>, stats::LogNormal)>,
}

impl LogNormal {
    pub fn new(mean: f64, cv: f64) -> DistResult<Self> {
        let mean = non_negative("mean", mean)?;
        let cv = non_negative("cv", cv)?;
        let fitted = if mean == 0.0 || cv == 0.0 {
            None
        } else {
            let variance = (cv * mean).powi(2);
            let mu = (mean * mean / (variance + mean * mean).sqrt()).ln();
            let sigma = (variance / (mean * mean) + 1.0).ln().sqrt();
            Some((
                rand_distr::LogNormal::new(mu, sigma).map_err(DistributionError::backend)?,
                stats::LogNormal::new(mu, sigma).map_err(DistributionError::backend)?,
            ))
        };
        Ok(Self { mean, cv, fitted })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match &self.fitted {
            Some((sampler, _)) => sampler.sample(rng),
            None => self.mean,
        }
    }

    pub fn cdf(&self, x: f64) -> f64 {
        match &self.fitted {
            Some((_, law)) => law.cdf(x),
            None => step_cdf(self.mean, x),
        }
    }

    pub fn inv_cdf(&self, p: f64) -> DistResult<f64> {
        let p = check_probability(p)?;
        Ok(match &self.fitted {
            Some((_, law)) => law.inverse_cdf(p),
            None => self.mean,
        })
    }
}

// =============================================================================
// BETA
// =============================================================================

/// Beta distribution on [0, 1] fitted from mean and CV.
#[derive(Debug, Clone)]
pub struct Beta {
    mean: f64,
    cv: f64,
    fitted: Option<(rand_distr::Beta<f64>, stats::Beta)>,
}

impl Beta {
    pub fn new(mean: f64, cv: f64) -> DistResult<Self> {
        if !(0.0..=1.0).contains(&mean) {
            return Err(DistributionError::invalid("mean", mean, "must be within [0, 1]"));
        }
        let cv = non_negative("cv", cv)?;
        let fitted = if mean == 0.0 || mean == 1.0 || cv == 0.0 {
            None
        } else {
            let (alpha, beta) = Self::shape(mean, cv);
            if !(alpha > 0.0 && beta > 0.0) {
                return Err(DistributionError::invalid(
                    "cv",
                    cv,
                    "too large for a beta distribution with this mean",
                ));
            }
            Some((
                rand_distr::Beta::new(alpha, beta).map_err(DistributionError::backend)?,
                stats::Beta::new(alpha, beta).map_err(DistributionError::backend)?,
            ))
        };
        Ok(Self { mean, cv, fitted })
    }

    /// Method-of-moments shape parameters (α, β).
    pub fn shape(mean: f64, cv: f64) -> (f64, f64) {
        let variance = (cv * mean).powi(2);
        let alpha = mean * mean * (1.0 - mean) / variance - mean;
        let beta = (1.0 - mean) * (1.0 - mean) * mean / variance + mean - 1.0;
        (alpha, beta)
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match &self.fitted {
            Some((sampler, _)) => sampler.sample(rng),
            None => self.mean,
        }
    }

    pub fn cdf(&self, x: f64) -> f64 {
        match &self.fitted {
            Some((_, law)) => law.cdf(x.clamp(0.0, 1.0)),
            None => step_cdf(self.mean, x),
        }
    }

    pub fn inv_cdf(&self, p: f64) -> DistResult<f64> {
        let p = check_probability(p)?;
        Ok(match &self.fitted {
            Some((_, law)) => law.inverse_cdf(p),
            None => self.mean,
        })
    }
}

// =============================================================================
// TRIANGULAR
// =============================================================================

/// Triangular distribution on `[lower, upper]` peaking at `mode`.
#[derive(Debug, Clone)]
pub struct Triangular {
    lower: f64,
    upper: f64,
    mode: f64,
    fitted: Option<(rand_distr::Triangular<f64>, stats::Triangular)>,
}

impl Triangular {
    pub fn new(lower: f64, upper: f64, mode: f64) -> DistResult<Self> {
        let lower = finite("lower", lower)?;
        let upper = finite("upper", upper)?;
        let mode = finite("mode", mode)?;
        if lower > upper {
            return Err(DistributionError::invalid("lower", lower, "must not exceed upper"));
        }
        if mode < lower || mode > upper {
            return Err(DistributionError::invalid("mode", mode, "must lie within [lower, upper]"));
        }
        let fitted = if lower == upper {
            None
        } else {
            Some((
                rand_distr::Triangular::new(lower, upper, mode).map_err(DistributionError::backend)?,
                stats::Triangular::new(lower, upper, mode).map_err(DistributionError::backend)?,
            ))
        };
        Ok(Self { lower, upper, mode, fitted })
    }

    pub fn mean(&self) -> f64 {
        (self.lower + self.upper + self.mode) / 3.0
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match &self.fitted {
            Some((sampler, _)) => sampler.sample(rng),
            None => self.lower,
        }
    }

    pub fn cdf(&self, x: f64) -> f64 {
        match &self.fitted {
            Some((_, law)) => law.cdf(x),
            None => step_cdf(self.lower, x),
        }
    }

    pub fn inv_cdf(&self, p: f64) -> DistResult<f64> {
        let p = check_probability(p)?;
        Ok(match &self.fitted {
            Some((_, law)) => law.inverse_cdf(p),
            None => self.lower,
        })
    }
}

// =============================================================================
// UNIFORM
// =============================================================================

/// Continuous uniform distribution on `[lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Uniform {
    lower: f64,
    upper: f64,
}

impl Uniform {
    pub fn new(lower: f64, upper: f64) -> DistResult<Self> {
        let lower = finite("lower", lower)?;
        let upper = finite("upper", upper)?;
        if lower > upper {
            return Err(DistributionError::invalid("lower", lower, "must not exceed upper"));
        }
        Ok(Self { lower, upper })
    }

    pub fn mean(&self) -> f64 {
        (self.lower + self.upper) / 2.0
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.lower + (self.upper - self.lower) * rng.gen::<f64>()
    }

    pub fn cdf(&self, x: f64) -> f64 {
        if self.lower == self.upper {
            return step_cdf(self.lower, x);
        }
        ((x - self.lower) / (self.upper - self.lower)).clamp(0.0, 1.0)
    }

    pub fn inv_cdf(&self, p: f64) -> DistResult<f64> {
        let p = check_probability(p)?;
        Ok(self.lower + (self.upper - self.lower) * p)
    }

    /// Picks one candidate uniformly at random.
    pub fn pick<'a, T, R: Rng + ?Sized>(rng: &mut R, candidates: &'a [T]) -> DistResult<&'a T> {
        if candidates.is_empty() {
            return Err(DistributionError::EmptyCandidates("candidate list"));
        }
        Ok(&candidates[rng.gen_range(0..candidates.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::seeded;
    use approx::assert_relative_eq;

    fn sample_mean(mut draw: impl FnMut() -> f64, n: usize) -> f64 {
        (0..n).map(|_| draw()).sum::<f64>() / n as f64
    }

    #[test]
    fn test_exponential_rejects_non_positive_mean() {
        assert!(Exponential::new(0.0).is_err());
        assert!(Exponential::new(-1.0).is_err());
        assert!(Exponential::new(f64::NAN).is_err());
    }

    #[test]
    fn test_exponential_sample_mean() {
        let dist = Exponential::new(4.0).unwrap();
        let mut rng = seeded(1);
        let mean = sample_mean(|| dist.sample(&mut rng), 50_000);
        assert_relative_eq!(mean, 4.0, epsilon = 0.1);
    }

    #[test]
    fn test_exponential_cdf_closed_form() {
        let dist = Exponential::new(2.0).unwrap();
        assert_relative_eq!(dist.cdf(2.0), 1.0 - (-1.0f64).exp(), epsilon = 1e-12);
        assert_relative_eq!(dist.inv_cdf(0.5).unwrap(), 2.0 * 2.0f64.ln(), epsilon = 1e-9);
        assert!(dist.inv_cdf(1.5).is_err());
    }

    #[test]
    fn test_gamma_degenerate_returns_mean() {
        let dist = Gamma::new(3.0, 0.0).unwrap();
        let mut rng = seeded(2);
        assert_eq!(dist.sample(&mut rng), 3.0);
        assert_eq!(dist.cdf(2.9), 0.0);
        assert_eq!(dist.cdf(3.0), 1.0);
        assert_eq!(dist.inv_cdf(0.3).unwrap(), 3.0);

        let zero = Gamma::new(0.0, 0.5).unwrap();
        assert_eq!(zero.sample(&mut rng), 0.0);
    }

    #[test]
    fn test_gamma_rejects_negative_parameters() {
        assert!(Gamma::new(-1.0, 0.5).is_err());
        assert!(Gamma::new(1.0, -0.5).is_err());
    }

    #[test]
    fn test_gamma_sample_mean_and_inverse() {
        let dist = Gamma::new(5.0, 0.5).unwrap();
        let mut rng = seeded(3);
        let mean = sample_mean(|| dist.sample(&mut rng), 50_000);
        assert_relative_eq!(mean, 5.0, epsilon = 0.1);

        let x = dist.inv_cdf(0.3).unwrap();
        assert_relative_eq!(dist.cdf(x), 0.3, epsilon = 1e-3);
    }

    #[test]
    fn test_normal_inverse_of_median_is_mean() {
        let dist = Normal::new(10.0, 0.2).unwrap();
        assert_relative_eq!(dist.std_dev(), 2.0);
        assert_relative_eq!(dist.inv_cdf(0.5).unwrap(), 10.0, epsilon = 1e-6);
        assert_relative_eq!(dist.cdf(10.0), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_lognormal_matches_requested_mean() {
        let dist = LogNormal::new(2.0, 0.3).unwrap();
        let mut rng = seeded(4);
        let mean = sample_mean(|| dist.sample(&mut rng), 50_000);
        assert_relative_eq!(mean, 2.0, epsilon = 0.05);
        assert_eq!(dist.cdf(0.0), 0.0);
    }

    #[test]
    fn test_beta_validation() {
        assert!(Beta::new(1.5, 0.1).is_err());
        assert!(Beta::new(-0.1, 0.1).is_err());
        assert!(Beta::new(0.5, 5.0).is_err());
        let degenerate = Beta::new(0.3, 0.0).unwrap();
        let mut rng = seeded(5);
        assert_eq!(degenerate.sample(&mut rng), 0.3);
    }

    #[test]
    fn test_beta_sample_mean() {
        let dist = Beta::new(0.3, 0.5).unwrap();
        let mut rng = seeded(6);
        let mean = sample_mean(|| dist.sample(&mut rng), 50_000);
        assert_relative_eq!(mean, 0.3, epsilon = 0.01);
    }

    #[test]
    fn test_triangular_bounds() {
        assert!(Triangular::new(2.0, 1.0, 1.5).is_err());
        assert!(Triangular::new(0.0, 1.0, 2.0).is_err());

        let dist = Triangular::new(0.0, 10.0, 5.0).unwrap();
        let mut rng = seeded(7);
        for _ in 0..1_000 {
            let x = dist.sample(&mut rng);
            assert!((0.0..=10.0).contains(&x));
        }
        assert_relative_eq!(dist.cdf(5.0), 0.5, epsilon = 1e-9);
        assert_relative_eq!(dist.mean(), 5.0);
    }

    #[test]
    fn test_uniform_cdf_and_inverse() {
        let dist = Uniform::new(2.0, 6.0).unwrap();
        assert_relative_eq!(dist.cdf(3.0), 0.25);
        assert_eq!(dist.cdf(-1.0), 0.0);
        assert_eq!(dist.cdf(7.0), 1.0);
        assert_relative_eq!(dist.inv_cdf(0.75).unwrap(), 5.0);
        assert!(Uniform::new(3.0, 2.0).is_err());
    }

    #[test]
    fn test_uniform_pick_rejects_empty() {
        let mut rng = seeded(8);
        let empty: [u32; 0] = [];
        assert_eq!(
            Uniform::pick(&mut rng, &empty),
            Err(DistributionError::EmptyCandidates("candidate list"))
        );
        let items = [1, 2, 3];
        assert!(items.contains(Uniform::pick(&mut rng, &items).unwrap()));
    }
}
