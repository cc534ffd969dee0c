//! Bound aggregation and the numerical (rearrangement-based) bound entry point.
//!
//! `compute_bound_ra` chains the three numerical stages:
//!
//! 1. [`discretize`](crate::grid::discretize) the marginals into lower/upper
//!    corner matrices;
//! 2. rearrange both corners for the requested [`BoundMode`];
//! 3. map every row sum through the payoff and average over the `N` levels.
//!
//! The payoff is injected; the crate itself is agnostic to what is being
//! bounded.

use crate::grid::{CornerMatrices, discretize};
use crate::marginal::Marginal;
use crate::quadrature::QuadratureError;
use crate::rearrangement::{RearrangedCorners, RearrangementEngine, RearrangementOptions};
use crate::types::{BoundMode, BoundPair, ConvergenceStatus};
use ndarray::{ArrayView2, Axis};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BoundError {
    #[error("marginal count mismatch: declared {expected}, got {found}")]
    InvalidMarginalCount { expected: usize, found: usize },

    #[error("number of discretization levels must be positive, got {0}")]
    InvalidLevelCount(usize),

    #[error("at least one marginal is required")]
    EmptyMarginals,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("quantile of marginal {column} is not finite at p={probability}")]
    NonFiniteQuantile { column: usize, probability: f64 },

    #[error("corner matrices differ in shape: lower {lower:?}, upper {upper:?}")]
    ShapeMismatch {
        lower: (usize, usize),
        upper: (usize, usize),
    },

    #[error("numerical integration failed: {0}")]
    Quadrature(#[from] QuadratureError),
}

/// Outcome of a numerical bound computation.
///
/// The rearranged corners are handed over to the caller for diagnostics
/// (export, scatter plots of the joint arrangement, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct BoundResult {
    pub mode: BoundMode,
    pub bounds: BoundPair,
    pub status: ConvergenceStatus,
    pub rearranged: RearrangedCorners,
}

/// `mean_i payoff(Σ_j matrix[i, j])`.
pub fn mean_payoff<F>(matrix: ArrayView2<'_, f64>, payoff: F) -> f64
where
    F: Fn(f64) -> f64,
{
    let rows = matrix.nrows();
    if rows == 0 {
        return f64::NAN;
    }
    let total: f64 = matrix.sum_axis(Axis(1)).iter().map(|&s| payoff(s)).sum();
    total / rows as f64
}

/// Reduces a `(low, up)` corner pair to a scalar [`BoundPair`].
pub fn aggregate<F>(
    lower: ArrayView2<'_, f64>,
    upper: ArrayView2<'_, f64>,
    payoff: F,
) -> Result<BoundPair, BoundError>
where
    F: Fn(f64) -> f64,
{
    if lower.dim() != upper.dim() {
        return Err(BoundError::ShapeMismatch {
            lower: lower.dim(),
            upper: upper.dim(),
        });
    }
    if lower.nrows() == 0 {
        return Err(BoundError::InvalidLevelCount(0));
    }
    let low = mean_payoff(lower, &payoff);
    let up = mean_payoff(upper, &payoff);
    Ok(BoundPair::new(low, up))
}

/// Rearranges an already discretized corner pair and aggregates it.
pub fn bound_from_corners<F>(
    engine: &RearrangementEngine,
    corners: &CornerMatrices,
    mode: BoundMode,
    payoff: F,
) -> Result<BoundResult, BoundError>
where
    F: Fn(f64) -> f64,
{
    let rearranged = engine.rearrange_corners(corners, mode);
    let bounds = aggregate(
        rearranged.lower.matrix.view(),
        rearranged.upper.matrix.view(),
        &payoff,
    )?;
    let status = rearranged.status();
    if !status.is_converged() {
        log::warn!(
            "{mode}-case rearrangement did not converge after {} iterations; bounds use the best arrangement found",
            status.iterations()
        );
    }
    Ok(BoundResult {
        mode,
        bounds,
        status,
        rearranged,
    })
}

/// Numerical bound with the default rearrangement options.
pub fn compute_bound_ra<M, F>(
    marginals: &[M],
    num_levels: usize,
    mode: BoundMode,
    payoff: F,
) -> Result<BoundResult, BoundError>
where
    M: Marginal,
    F: Fn(f64) -> f64,
{
    compute_bound_ra_with(
        &RearrangementEngine::default(),
        marginals,
        num_levels,
        mode,
        payoff,
    )
}

pub fn compute_bound_ra_with<M, F>(
    engine: &RearrangementEngine,
    marginals: &[M],
    num_levels: usize,
    mode: BoundMode,
    payoff: F,
) -> Result<BoundResult, BoundError>
where
    M: Marginal,
    F: Fn(f64) -> f64,
{
    let corners = discretize(marginals, num_levels)?;
    let result = bound_from_corners(engine, &corners, mode, payoff)?;
    log::debug!(
        "{} bound on {} marginals, N={}: [{:.8}, {:.8}]",
        mode,
        marginals.len(),
        num_levels,
        result.bounds.lower,
        result.bounds.upper
    );
    Ok(result)
}

/// Strategy view of the two bound modes.
pub trait BoundComputation {
    fn mode(&self) -> BoundMode;

    fn compute<M, F>(
        &self,
        marginals: &[M],
        num_levels: usize,
        payoff: F,
    ) -> Result<BoundResult, BoundError>
    where
        M: Marginal,
        F: Fn(f64) -> f64;
}

/// Comonotonic alignment; no iteration involved.
#[derive(Debug, Clone, Copy, Default)]
pub struct BestCase;

impl BoundComputation for BestCase {
    fn mode(&self) -> BoundMode {
        BoundMode::Best
    }

    fn compute<M, F>(
        &self,
        marginals: &[M],
        num_levels: usize,
        payoff: F,
    ) -> Result<BoundResult, BoundError>
    where
        M: Marginal,
        F: Fn(f64) -> f64,
    {
        compute_bound_ra(marginals, num_levels, BoundMode::Best, payoff)
    }
}

/// Iterative opposite-ordering rearrangement with configurable halting.
#[derive(Debug, Clone, Default)]
pub struct WorstCase {
    engine: RearrangementEngine,
}

impl WorstCase {
    pub fn new(options: RearrangementOptions) -> Self {
        Self {
            engine: RearrangementEngine::new(options),
        }
    }
}

impl BoundComputation for WorstCase {
    fn mode(&self) -> BoundMode {
        BoundMode::Worst
    }

    fn compute<M, F>(
        &self,
        marginals: &[M],
        num_levels: usize,
        payoff: F,
    ) -> Result<BoundResult, BoundError>
    where
        M: Marginal,
        F: Fn(f64) -> f64,
    {
        compute_bound_ra_with(&self.engine, marginals, num_levels, BoundMode::Worst, payoff)
    }
}
