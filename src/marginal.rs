//! Marginal distributions, seen only through their quantile functions.
//!
//! The bound engines never touch densities or CDFs: a [`Marginal`] is the
//! capability "evaluate the quantile at `p ∈ [0, 1)`". Built-in families
//! cover the fading models used by the channel scenarios; arbitrary quantile
//! closures are accepted through [`QuantileFn`].

use crate::bounds::BoundError;
use crate::probability::{
    regularized_lower_gamma, regularized_upper_gamma, saturate_probability,
    standard_normal_quantile, unit_exponential_quantile,
};
use crate::roots::{RootOptions, brent};
use serde::{Deserialize, Serialize};

/// Quantile (inverse-CDF) access to one random variable.
///
/// Implementations must be non-decreasing in `p` and must apply
/// [`saturate_probability`] before evaluating, so that `quantile(1.0)` is
/// finite even for unbounded support.
pub trait Marginal {
    fn quantile(&self, p: f64) -> f64;

    /// Whether the quantile stays bounded as `p → 1`.
    ///
    /// Unbounded marginals get the finite-tail proxy in the last row of the
    /// upper corner matrix.
    fn is_bounded_above(&self) -> bool {
        false
    }
}

impl<M: Marginal + ?Sized> Marginal for &M {
    fn quantile(&self, p: f64) -> f64 {
        (**self).quantile(p)
    }

    fn is_bounded_above(&self) -> bool {
        (**self).is_bounded_above()
    }
}

impl<M: Marginal + ?Sized> Marginal for Box<M> {
    fn quantile(&self, p: f64) -> f64 {
        (**self).quantile(p)
    }

    fn is_bounded_above(&self) -> bool {
        (**self).is_bounded_above()
    }
}

/// Owned, thread-shareable marginal handle.
pub type DynMarginal = Box<dyn Marginal + Send + Sync>;

fn require_positive(name: &str, value: f64) -> Result<(), BoundError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(BoundError::InvalidParameter(format!(
            "{name} must be finite and positive, got {value}"
        )))
    }
}

/// Exponential distribution with the given rate (`mean = 1 / rate`).
///
/// The received power of a Rayleigh-faded link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exponential {
    rate: f64,
}

impl Exponential {
    pub fn new(rate: f64) -> Result<Self, BoundError> {
        require_positive("exponential rate", rate)?;
        Ok(Self { rate })
    }

    pub fn unit() -> Self {
        Self { rate: 1.0 }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl Marginal for Exponential {
    fn quantile(&self, p: f64) -> f64 {
        unit_exponential_quantile(p) / self.rate
    }
}

/// Log-normal distribution: `exp(mu + sigma·Z)` with `Z` standard normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogNormal {
    mu: f64,
    sigma: f64,
}

impl LogNormal {
    pub fn new(mu: f64, sigma: f64) -> Result<Self, BoundError> {
        if !mu.is_finite() {
            return Err(BoundError::InvalidParameter(format!(
                "log-normal mu must be finite, got {mu}"
            )));
        }
        require_positive("log-normal sigma", sigma)?;
        Ok(Self { mu, sigma })
    }
}

impl Marginal for LogNormal {
    fn quantile(&self, p: f64) -> f64 {
        let p = saturate_probability(p);
        if p == 0.0 {
            return 0.0;
        }
        match standard_normal_quantile(p) {
            Ok(z) => (self.mu + self.sigma * z).exp(),
            Err(_) => f64::NAN,
        }
    }
}

/// Chi-squared distribution with `dof` degrees of freedom.
///
/// The quantile is obtained by inverting the regularized incomplete gamma
/// function with the bracketed solver; the upper tail is inverted through
/// `Q(k/2, x/2)` to keep precision close to one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChiSquared {
    dof: f64,
}

impl ChiSquared {
    pub fn new(dof: f64) -> Result<Self, BoundError> {
        require_positive("chi-squared degrees of freedom", dof)?;
        Ok(Self { dof })
    }
}

impl Marginal for ChiSquared {
    fn quantile(&self, p: f64) -> f64 {
        let p = saturate_probability(p);
        if p.is_nan() {
            return p;
        }
        if p == 0.0 {
            return 0.0;
        }
        let shape = 0.5 * self.dof;
        let lower_tail = p <= 0.5;
        let objective = |x: f64| {
            if lower_tail {
                regularized_lower_gamma(shape, 0.5 * x) - p
            } else {
                (1.0 - p) - regularized_upper_gamma(shape, 0.5 * x)
            }
        };

        let mut hi = self.dof.max(1.0);
        while objective(hi) < 0.0 {
            hi *= 2.0;
            if !hi.is_finite() {
                return f64::NAN;
            }
        }
        match brent(&objective, 0.0, hi, None, &RootOptions::default()) {
            Ok(root) => root.root,
            Err(err) => {
                log::warn!(
                    "chi-squared quantile inversion failed (dof={}, p={p}): {err}",
                    self.dof
                );
                f64::NAN
            }
        }
    }
}

/// Continuous uniform distribution on `[min, max]`; bounded above.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Uniform {
    min: f64,
    max: f64,
}

impl Uniform {
    pub fn new(min: f64, max: f64) -> Result<Self, BoundError> {
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(BoundError::InvalidParameter(format!(
                "uniform requires finite min < max, got min={min}, max={max}"
            )));
        }
        Ok(Self { min, max })
    }
}

impl Marginal for Uniform {
    fn quantile(&self, p: f64) -> f64 {
        self.min + saturate_probability(p) * (self.max - self.min)
    }

    fn is_bounded_above(&self) -> bool {
        true
    }
}

/// Adapter turning any non-decreasing closure into a [`Marginal`].
///
/// The saturation rule is applied before the closure is called.
///
/// [`QuantileFn::new`] treats the closure as unbounded above, so the last
/// upper-corner row is evaluated at the tail proxy `1 − 1/(2N)` instead of
/// at 1. Quantiles with a finite upper end must use [`QuantileFn::bounded`].
pub struct QuantileFn<F> {
    func: F,
    bounded_above: bool,
}

impl<F: Fn(f64) -> f64> QuantileFn<F> {
    /// Unbounded quantile; the top row uses the tail proxy.
    pub fn new(func: F) -> Self {
        Self {
            func,
            bounded_above: false,
        }
    }

    /// Bounded quantile; the top row is evaluated at the saturated level 1.
    pub fn bounded(func: F) -> Self {
        Self {
            func,
            bounded_above: true,
        }
    }
}

impl<F: Fn(f64) -> f64> Marginal for QuantileFn<F> {
    fn quantile(&self, p: f64) -> f64 {
        (self.func)(saturate_probability(p))
    }

    fn is_bounded_above(&self) -> bool {
        self.bounded_above
    }
}

/// Serializable description of a built-in marginal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum MarginalSpec {
    Exponential { rate: f64 },
    LogNormal { mu: f64, sigma: f64 },
    ChiSquared { dof: f64 },
    Uniform { min: f64, max: f64 },
}

impl MarginalSpec {
    pub fn build(&self) -> Result<DynMarginal, BoundError> {
        Ok(match *self {
            MarginalSpec::Exponential { rate } => Box::new(Exponential::new(rate)?),
            MarginalSpec::LogNormal { mu, sigma } => Box::new(LogNormal::new(mu, sigma)?),
            MarginalSpec::ChiSquared { dof } => Box::new(ChiSquared::new(dof)?),
            MarginalSpec::Uniform { min, max } => Box::new(Uniform::new(min, max)?),
        })
    }
}

/// Builds every spec in order, failing on the first invalid one.
pub fn build_marginals(specs: &[MarginalSpec]) -> Result<Vec<DynMarginal>, BoundError> {
    specs.iter().map(MarginalSpec::build).collect()
}
