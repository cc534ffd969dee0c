//! Exact best-case bound for `n` identical unit-rate exponential marginals.
//!
//! For this family the variance-minimizing joint arrangement is known in
//! closed form up to one scalar, the threshold `c_min`. With `Q` the unit
//! exponential quantile and `a` a tail-truncation level (0 in every validated
//! use), the arrangement value at level `x` is
//!
//! ```text
//! H(x, n, a) = (n − 1)·Q(a + (n − 1)x) + Q(1 − x)
//! ```
//!
//! and `T(x, n, a) = n·x − x ln x + (1 − a + x − n·x) ln(1 − a + x − n·x)` is its
//! antiderivative. `c_min` is the root of the balance equation
//!
//! ```text
//! diff(c) = [(1 − a) − T(c)] − [((1 − a)/n − c)·H(c)]
//! ```
//!
//! on `(ε, (1 − a)/(n(n − 1))]`. The bound then splits into a numerically
//! integrated head on `[0, c_min]`, replicated over the `n` symmetric blocks,
//! and a constant tail carrying the remaining mass `1 − n·c_min`:
//!
//! ```text
//! E[φ] = n·∫₀^{c_min} φ(H(x)) dx + (1 − n·c_min)·φ(H(c_min))
//! ```
//!
//! `c_min` shrinks by roughly a factor `e` per extra marginal (about `1e-13` at
//! `n = 30`), so the root is searched in `t = ln c` where an absolute step
//! tolerance is a relative one in `c`.
//!
//! If the solver fails, the threshold falls back to the sentinel `1` and the
//! solution is flagged; bounds built on a fallback must be treated as suspect.
//! A root whose balance residual exceeds the solver's residual tolerance is
//! flagged as inaccurate. Only `a = 0` has been validated; other values are
//! accepted but logged.

use crate::bounds::BoundError;
use crate::probability::{unit_exponential_quantile, unit_exponential_upper_quantile};
use crate::quadrature::{Integral, QuadratureOptions, integrate};
use crate::roots::{RootOptions, brent};
use serde::{Deserialize, Serialize};

/// Threshold reported when root finding fails.
pub const FALLBACK_THRESHOLD: f64 = 1.0;

#[inline]
fn xlogx(x: f64) -> f64 {
    if x == 0.0 { 0.0 } else { x * x.ln() }
}

/// `H(x, n, a)`: row sum of the extremal arrangement at level `x`.
pub fn arrangement_value(x: f64, n: usize, a: f64) -> f64 {
    let m = n as f64 - 1.0;
    m * unit_exponential_quantile(a + m * x) + unit_exponential_upper_quantile(x)
}

/// `T(x, n, a)`: antiderivative of [`arrangement_value`] in `x`.
pub fn arrangement_integral(x: f64, n: usize, a: f64) -> f64 {
    let n = n as f64;
    n * x - xlogx(x) + xlogx(1.0 - a + x - n * x)
}

pub fn balance_lhs(c: f64, n: usize, a: f64) -> f64 {
    if c == 0.0 {
        return (-1.0 + a) * (-1.0 + (1.0 - a).ln());
    }
    (1.0 - a) - arrangement_integral(c, n, a)
}

pub fn balance_rhs(c: f64, n: usize, a: f64) -> f64 {
    ((1.0 - a) / n as f64 - c) * arrangement_value(c, n, a)
}

/// Balance equation whose root is `c_min`.
pub fn balance_diff(c: f64, n: usize, a: f64) -> f64 {
    balance_lhs(c, n, a) - balance_rhs(c, n, a)
}

/// How the threshold was obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum RootStatus {
    Converged { iterations: usize, residual: f64 },
    /// A root was returned but `|diff(c_min)|` exceeds the residual tolerance.
    Inaccurate { iterations: usize, residual: f64 },
    /// The solver failed; the threshold is [`FALLBACK_THRESHOLD`].
    Fallback { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdSolution {
    pub n: usize,
    pub a: f64,
    pub c_min: f64,
    pub status: RootStatus,
}

impl ThresholdSolution {
    pub fn is_fallback(&self) -> bool {
        matches!(self.status, RootStatus::Fallback { .. })
    }

    pub fn is_converged(&self) -> bool {
        matches!(self.status, RootStatus::Converged { .. })
    }
}

/// Exact best-case value with the threshold and head integral it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct ExactBound {
    pub value: f64,
    pub threshold: ThresholdSolution,
    pub head: Integral,
}

impl ExactBound {
    pub fn is_suspect(&self) -> bool {
        !self.threshold.is_converged() || !self.head.converged
    }
}

/// Solver with explicit numerical options; carries no state between calls.
///
/// `root_options` apply to the search in `ln c`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSolver {
    pub root_options: RootOptions,
    pub quadrature_options: QuadratureOptions,
    /// Largest accepted `|diff(c_min)|` for a converged root.
    pub residual_tolerance: f64,
}

impl Default for ThresholdSolver {
    fn default() -> Self {
        Self {
            root_options: RootOptions::default(),
            quadrature_options: QuadratureOptions::default(),
            residual_tolerance: 1e-8,
        }
    }
}

impl ThresholdSolver {
    pub fn new(root_options: RootOptions, quadrature_options: QuadratureOptions) -> Self {
        Self {
            root_options,
            quadrature_options,
            ..Self::default()
        }
    }

    fn validate(n: usize, a: f64) -> Result<(), BoundError> {
        if n < 2 {
            return Err(BoundError::InvalidParameter(format!(
                "threshold solver needs at least two marginals, got n={n}"
            )));
        }
        if !(a.is_finite() && (0.0..1.0).contains(&a)) {
            return Err(BoundError::InvalidParameter(format!(
                "tail truncation a must lie in [0, 1), got {a}"
            )));
        }
        if a != 0.0 {
            log::warn!("tail truncation a={a} is outside the validated a=0 path");
        }
        Ok(())
    }

    /// Root of [`balance_diff`] for `(n, a)`, or the flagged fallback.
    pub fn determine_cmin(&self, n: usize, a: f64) -> Result<ThresholdSolution, BoundError> {
        Self::validate(n, a)?;
        let nf = n as f64;
        let eps = f64::EPSILON;
        let lo = eps;
        let hi = (1.0 - a) / (nf * (nf - 1.0));
        let x0 = ((1.0 - a) / nf + eps) / 2.0;

        // Map back so that the bracket ends evaluate at exactly `lo` and `hi`.
        let (t_lo, t_hi) = (lo.ln(), hi.ln());
        let to_level = |t: f64| {
            if t >= t_hi {
                hi
            } else if t <= t_lo {
                lo
            } else {
                t.exp()
            }
        };
        let hint = (x0 > lo && x0 < hi).then(|| x0.ln());

        let solution = match brent(
            |t| balance_diff(to_level(t), n, a),
            t_lo,
            t_hi,
            hint,
            &self.root_options,
        ) {
            Ok(root) => {
                let c_min = to_level(root.root);
                let residual = balance_diff(c_min, n, a);
                log::debug!(
                    "c_min(n={n}, a={a}) = {c_min:.15e} after {} iterations, {} evaluations (residual {residual:.3e})",
                    root.iterations,
                    root.function_calls
                );
                let status = if residual.abs() <= self.residual_tolerance {
                    RootStatus::Converged {
                        iterations: root.iterations,
                        residual,
                    }
                } else {
                    log::warn!(
                        "c_min(n={n}, a={a}) = {c_min:.6e} leaves residual {residual:.3e} > {:.1e}",
                        self.residual_tolerance
                    );
                    RootStatus::Inaccurate {
                        iterations: root.iterations,
                        residual,
                    }
                };
                ThresholdSolution {
                    n,
                    a,
                    c_min,
                    status,
                }
            }
            Err(err) => {
                log::warn!(
                    "root finding for c_min failed (n={n}, a={a:.2}, bracket=[{lo:.3e}, {hi:.3e}]): {err}; falling back to {FALLBACK_THRESHOLD}"
                );
                ThresholdSolution {
                    n,
                    a,
                    c_min: FALLBACK_THRESHOLD,
                    status: RootStatus::Fallback {
                        reason: err.to_string(),
                    },
                }
            }
        };
        Ok(solution)
    }

    /// `n·∫₀^{c_min} φ(H) dx + (1 − n·c_min)·φ(H(c_min))`.
    pub fn best_case_exact<F>(&self, n: usize, a: f64, payoff: F) -> Result<ExactBound, BoundError>
    where
        F: Fn(f64) -> f64,
    {
        let threshold = self.determine_cmin(n, a)?;
        let c = threshold.c_min;
        let integrand = |x: f64| payoff(arrangement_value(x, n, a));
        let head = integrate(&integrand, 0.0, c, &self.quadrature_options)?;
        let tail = (1.0 - n as f64 * c) * integrand(c);
        let value = n as f64 * head.value + tail;
        if !threshold.is_converged() {
            log::warn!(
                "exact best case for n={n} built on an unreliable threshold ({:?}): {value:.6}",
                threshold.status
            );
        }
        Ok(ExactBound {
            value,
            threshold,
            head,
        })
    }
}

/// [`ThresholdSolver::determine_cmin`] with default options.
pub fn determine_cmin(n: usize, a: f64) -> Result<ThresholdSolution, BoundError> {
    ThresholdSolver::default().determine_cmin(n, a)
}

/// [`ThresholdSolver::best_case_exact`] with default options.
pub fn best_case_exact<F>(n: usize, a: f64, payoff: F) -> Result<ExactBound, BoundError>
where
    F: Fn(f64) -> f64,
{
    ThresholdSolver::default().best_case_exact(n, a, payoff)
}
