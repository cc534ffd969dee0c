//! Fading-channel application layer.
//!
//! Supplies the payoff (instantaneous capacity) and the marginal sets the
//! sweeps run on. Nothing in the bound engines depends on this module.

use crate::bounds::BoundError;
use crate::marginal::{ChiSquared, DynMarginal, Exponential, LogNormal};

/// `x ↦ log2(1 + snr·x)` in bits per channel use.
pub fn capacity_payoff(snr: f64) -> impl Fn(f64) -> f64 + Copy + Send + Sync {
    move |x| (1.0 + snr * x).log2()
}

pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 10.0)
}

/// Received-power marginals of `n` Rayleigh-faded links.
///
/// Without a rate list every link has unit mean power. A rate list must have
/// exactly `n` entries.
pub fn rayleigh_marginals(n: usize, rates: Option<&[f64]>) -> Result<Vec<Exponential>, BoundError> {
    if n == 0 {
        return Err(BoundError::EmptyMarginals);
    }
    match rates {
        None => Ok(vec![Exponential::unit(); n]),
        Some(rates) if rates.len() != n => Err(BoundError::InvalidMarginalCount {
            expected: n,
            found: rates.len(),
        }),
        Some(rates) => rates.iter().map(|&rate| Exponential::new(rate)).collect(),
    }
}

/// Three heterogeneous links with mean power 4 each: Rayleigh, log-normal
/// shadowing and a chi-squared (two-branch diversity) link.
pub fn mixed_marginals() -> Result<Vec<DynMarginal>, BoundError> {
    let sigma = (2.0 * 4f64.ln()).sqrt();
    Ok(vec![
        Box::new(Exponential::new(0.25)?),
        Box::new(LogNormal::new(0.0, sigma)?),
        Box::new(ChiSquared::new(4.0)?),
    ])
}
