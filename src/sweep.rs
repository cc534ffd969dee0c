//! Parameter sweeps over independent bound computations.
//!
//! Every point of a sweep owns its marginals and matrices, so the points are
//! evaluated in parallel with rayon; the rearrangement and root finding inside
//! one point stay sequential. Rows are returned in sweep order and serialize
//! with the column names of the exported tables.

use crate::baseline::{
    comonotonic_exponential, comonotonic_integral, iid_exponential, independent_monte_carlo,
};
use crate::bounds::{BestCase, BoundComputation, BoundError, WorstCase, compute_bound_ra_with};
use crate::channel::{capacity_payoff, db_to_linear, rayleigh_marginals};
use crate::marginal::Marginal;
use crate::quadrature::QuadratureOptions;
use crate::rearrangement::{RearrangementEngine, RearrangementOptions};
use crate::threshold::ThresholdSolver;
use crate::types::BoundMode;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::iter::{
    IndexedParallelIterator, IntoParallelIterator, IntoParallelRefIterator, ParallelIterator,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RayleighSweepConfig {
    pub snr_db: f64,
    pub n_min: usize,
    pub n_max: usize,
    pub num_levels: usize,
    /// Per-link rates; when set, every swept `n` must equal its length.
    pub rates: Option<Vec<f64>>,
    pub rearrangement: RearrangementOptions,
}

impl Default for RayleighSweepConfig {
    fn default() -> Self {
        Self {
            snr_db: 10.0,
            n_min: 2,
            n_max: 30,
            num_levels: 1000,
            rates: None,
            rearrangement: RearrangementOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RayleighRow {
    /// Only defined for unit-rate links.
    pub best_exact: Option<f64>,
    pub best_low: f64,
    pub best_up: f64,
    pub worst_low: f64,
    pub worst_up: f64,
    pub comon: f64,
    /// Only defined for unit-rate links.
    pub iid: Option<f64>,
    pub n: usize,
    /// False when a rearrangement hit its cap or the threshold fell back.
    #[serde(skip)]
    pub reliable: bool,
}

/// Capacity bounds for `n = n_min..=n_max` Rayleigh links at one SNR.
pub fn rayleigh_sweep(config: &RayleighSweepConfig) -> Result<Vec<RayleighRow>, BoundError> {
    if config.n_min == 0 || config.n_min > config.n_max {
        return Err(BoundError::InvalidParameter(format!(
            "invalid link-count range {}..={}",
            config.n_min, config.n_max
        )));
    }
    let snr = db_to_linear(config.snr_db);
    log::info!(
        "rayleigh sweep: n={}..={}, snr={} dB, N={}",
        config.n_min,
        config.n_max,
        config.snr_db,
        config.num_levels
    );
    let worst_case = WorstCase::new(config.rearrangement);
    let solver = ThresholdSolver::default();

    (config.n_min..=config.n_max)
        .into_par_iter()
        .map(|n| -> Result<RayleighRow, BoundError> {
            let marginals = rayleigh_marginals(n, config.rates.as_deref())?;
            let payoff = capacity_payoff(snr);
            let best = BestCase.compute(&marginals, config.num_levels, payoff)?;
            let worst = worst_case.compute(&marginals, config.num_levels, payoff)?;
            let mut reliable = best.status.is_converged() && worst.status.is_converged();

            let unit_rates = config.rates.is_none();
            let (best_exact, comon, iid) = if unit_rates {
                let exact = if n >= 2 {
                    let exact = solver.best_case_exact(n, 0.0, payoff)?;
                    reliable &= !exact.is_suspect();
                    exact.value
                } else {
                    // A single link has no dependence to optimize.
                    comonotonic_exponential(snr, 1)
                };
                (
                    Some(exact),
                    comonotonic_exponential(snr, n),
                    Some(iid_exponential(snr, n)),
                )
            } else {
                let comon =
                    comonotonic_integral(&marginals, payoff, &QuadratureOptions::default())?;
                (None, comon, None)
            };

            log::info!(
                "n={n}: best [{:.6}, {:.6}], worst [{:.6}, {:.6}]",
                best.bounds.lower,
                best.bounds.upper,
                worst.bounds.lower,
                worst.bounds.upper
            );
            Ok(RayleighRow {
                best_exact,
                best_low: best.bounds.lower,
                best_up: best.bounds.upper,
                worst_low: worst.bounds.lower,
                worst_up: worst.bounds.upper,
                comon,
                iid,
                n,
                reliable,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantGapConfig {
    pub snr_db: f64,
    pub n: usize,
    pub levels: Vec<usize>,
    pub mode: BoundMode,
    pub rearrangement: RearrangementOptions,
}

impl Default for QuantGapConfig {
    fn default() -> Self {
        Self {
            snr_db: 10.0,
            n: 3,
            levels: vec![5, 10, 100, 1000, 10000],
            mode: BoundMode::Worst,
            rearrangement: RearrangementOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantGapRow {
    pub num_levels: usize,
    pub upper: f64,
    pub lower: f64,
    pub gap: f64,
}

/// Width of the `(lower, upper)` bracket as the discretization is refined.
pub fn quantization_gap_sweep(config: &QuantGapConfig) -> Result<Vec<QuantGapRow>, BoundError> {
    let marginals = rayleigh_marginals(config.n, None)?;
    let payoff = capacity_payoff(db_to_linear(config.snr_db));
    let engine = RearrangementEngine::new(config.rearrangement);
    log::info!(
        "quantization gap sweep: n={}, mode={}, levels={:?}",
        config.n,
        config.mode,
        config.levels
    );

    config
        .levels
        .par_iter()
        .map(|&num_levels| -> Result<QuantGapRow, BoundError> {
            let result = compute_bound_ra_with(&engine, &marginals, num_levels, config.mode, payoff)?;
            Ok(QuantGapRow {
                num_levels,
                upper: result.bounds.upper,
                lower: result.bounds.lower,
                gap: result.bounds.gap(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnrSweepConfig {
    pub snr_db: Vec<f64>,
    pub num_levels: usize,
    /// Also compute the comonotonic and independent reference curves.
    pub baselines: bool,
    pub monte_carlo_samples: usize,
    pub seed: u64,
    pub rearrangement: RearrangementOptions,
}

impl Default for SnrSweepConfig {
    fn default() -> Self {
        Self {
            snr_db: (0..=20).map(f64::from).collect(),
            num_levels: 1000,
            baselines: true,
            monte_carlo_samples: 10_000,
            seed: 42,
            rearrangement: RearrangementOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnrRow {
    pub best_low: f64,
    pub best_up: f64,
    pub worst_low: f64,
    pub worst_up: f64,
    pub comon: Option<f64>,
    pub indep: Option<f64>,
    pub snr: f64,
    #[serde(skip)]
    pub reliable: bool,
}

/// Capacity bounds of an arbitrary marginal set over a list of SNRs in dB.
///
/// The Monte-Carlo stream of point `k` is seeded with `seed + k`, so results
/// do not depend on the thread schedule.
pub fn snr_sweep<M>(marginals: &[M], config: &SnrSweepConfig) -> Result<Vec<SnrRow>, BoundError>
where
    M: Marginal + Sync,
{
    if marginals.is_empty() {
        return Err(BoundError::EmptyMarginals);
    }
    log::info!(
        "snr sweep: {} marginals, {} points, N={}",
        marginals.len(),
        config.snr_db.len(),
        config.num_levels
    );
    let worst_case = WorstCase::new(config.rearrangement);

    config
        .snr_db
        .par_iter()
        .enumerate()
        .map(|(k, &snr_db)| -> Result<SnrRow, BoundError> {
            let payoff = capacity_payoff(db_to_linear(snr_db));
            let best = BestCase.compute(marginals, config.num_levels, payoff)?;
            let worst = worst_case.compute(marginals, config.num_levels, payoff)?;
            let (comon, indep) = if config.baselines {
                let comon =
                    comonotonic_integral(marginals, payoff, &QuadratureOptions::default())?;
                let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(k as u64));
                let indep = independent_monte_carlo(
                    marginals,
                    payoff,
                    config.monte_carlo_samples,
                    &mut rng,
                )?;
                (Some(comon), Some(indep))
            } else {
                (None, None)
            };
            log::info!("snr={snr_db} dB done");
            Ok(SnrRow {
                best_low: best.bounds.lower,
                best_up: best.bounds.upper,
                worst_low: worst.bounds.lower,
                worst_up: worst.bounds.upper,
                comon,
                indep,
                snr: snr_db,
                reliable: best.status.is_converged() && worst.status.is_converged(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::mixed_marginals;

    #[test]
    fn rayleigh_rows_come_back_in_order() {
        let config = RayleighSweepConfig {
            n_min: 2,
            n_max: 4,
            num_levels: 100,
            ..RayleighSweepConfig::default()
        };
        let rows = rayleigh_sweep(&config).unwrap();
        assert_eq!(rows.iter().map(|r| r.n).collect::<Vec<_>>(), vec![2, 3, 4]);
        for row in &rows {
            assert!(row.reliable);
            assert!(row.best_low <= row.best_up);
            assert!(row.worst_low <= row.worst_up);
            // comonotonic closed form sits inside the comonotonic bracket
            assert!(row.best_low <= row.comon && row.comon <= row.best_up);
            let exact = row.best_exact.unwrap();
            assert!(row.worst_low <= exact && exact <= row.worst_up);
        }
    }

    #[test]
    fn rayleigh_rate_list_must_match_every_n() {
        let config = RayleighSweepConfig {
            n_min: 2,
            n_max: 2,
            num_levels: 20,
            rates: Some(vec![1.0, 0.5, 2.0]),
            ..RayleighSweepConfig::default()
        };
        assert!(matches!(
            rayleigh_sweep(&config),
            Err(BoundError::InvalidMarginalCount { expected: 2, found: 3 })
        ));
    }

    #[test]
    fn heterogeneous_rates_skip_unit_rate_baselines() {
        let config = RayleighSweepConfig {
            n_min: 2,
            n_max: 2,
            num_levels: 50,
            rates: Some(vec![1.0, 0.5]),
            ..RayleighSweepConfig::default()
        };
        let rows = rayleigh_sweep(&config).unwrap();
        assert_eq!(rows[0].best_exact, None);
        assert_eq!(rows[0].iid, None);
        assert!(rows[0].best_low <= rows[0].comon && rows[0].comon <= rows[0].best_up);
    }

    #[test]
    fn quantization_gap_reports_bracket_width() {
        let config = QuantGapConfig {
            levels: vec![5, 50],
            ..QuantGapConfig::default()
        };
        let rows = quantization_gap_sweep(&config).unwrap();
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert!((row.gap - (row.upper - row.lower)).abs() < 1e-15);
        }
        assert!(rows[1].gap < rows[0].gap);
    }

    #[test]
    fn snr_sweep_is_reproducible() {
        let links = mixed_marginals().unwrap();
        let config = SnrSweepConfig {
            snr_db: vec![0.0, 10.0],
            num_levels: 50,
            monte_carlo_samples: 500,
            ..SnrSweepConfig::default()
        };
        let first = snr_sweep(&links, &config).unwrap();
        let second = snr_sweep(&links, &config).unwrap();
        assert_eq!(first, second);
        assert!(first[1].best_low > first[0].best_low);
        assert!(first.iter().all(|row| row.indep.is_some()));
    }
}
