#![deny(dead_code)]
#![deny(unused_imports)]

pub mod baseline;
pub mod bounds;
pub mod channel;
pub mod grid;
pub mod marginal;
pub mod probability;
pub mod quadrature;
pub mod rearrangement;
pub mod roots;
pub mod sweep;
pub mod threshold;
pub mod types;

pub use baseline::{
    comonotonic_exponential, comonotonic_integral, iid_exponential, independent_monte_carlo,
};
pub use bounds::{
    BestCase, BoundComputation, BoundError, BoundResult, WorstCase, aggregate,
    bound_from_corners, compute_bound_ra, compute_bound_ra_with,
};
pub use channel::{capacity_payoff, db_to_linear, mixed_marginals, rayleigh_marginals};
pub use grid::{CornerMatrices, discretize, discretize_declared};
pub use marginal::{
    ChiSquared, DynMarginal, Exponential, LogNormal, Marginal, MarginalSpec, QuantileFn, Uniform,
    build_marginals,
};
pub use rearrangement::{
    Rearranged, RearrangedCorners, RearrangementEngine, RearrangementOptions,
};
pub use sweep::{
    QuantGapConfig, QuantGapRow, RayleighRow, RayleighSweepConfig, SnrRow, SnrSweepConfig,
    quantization_gap_sweep, rayleigh_sweep, snr_sweep,
};
pub use threshold::{
    ExactBound, RootStatus, ThresholdSolution, ThresholdSolver, best_case_exact, determine_cmin,
};
pub use types::{BoundMode, BoundPair, ConvergenceStatus};
