//! Reference curves the numerical bounds are compared against.
//!
//! None of these take part in the bound computation itself; they share no
//! state with it and exist to validate and plot alongside it.

use crate::bounds::BoundError;
use crate::marginal::Marginal;
use crate::probability::{expint_e1, expint_en};
use crate::quadrature::{QuadratureOptions, integrate};
use rand::{Rng, RngExt};

/// Comonotonic ergodic capacity of `n` unit-rate exponential (Rayleigh power)
/// channels, `E[log2(1 + snr·n·X)]`:
///
/// ```text
/// −exp(1/(n·snr))·Ei(−1/(n·snr)) / ln 2 = exp(1/(n·snr))·E1(1/(n·snr)) / ln 2
/// ```
pub fn comonotonic_exponential(snr: f64, n: usize) -> f64 {
    let x = 1.0 / (n as f64 * snr);
    x.exp() * expint_e1(x) / std::f64::consts::LN_2
}

/// Ergodic capacity of `n` i.i.d. unit-rate exponential channels.
///
/// The sum is Gamma(n, 1) distributed, which gives
/// `log2(e)·exp(1/snr)·Σ_{k=1..n} E_k(1/snr)`.
pub fn iid_exponential(snr: f64, n: usize) -> f64 {
    let x = 1.0 / snr;
    let series: f64 = (1..=n as u32).map(|k| expint_en(k, x)).sum();
    std::f64::consts::LOG2_E * x.exp() * series
}

/// `∫₀¹ payoff(Σ_j Q_j(u)) du`: the exact comonotonic value for arbitrary
/// marginals.
pub fn comonotonic_integral<M, F>(
    marginals: &[M],
    payoff: F,
    options: &QuadratureOptions,
) -> Result<f64, BoundError>
where
    M: Marginal,
    F: Fn(f64) -> f64,
{
    if marginals.is_empty() {
        return Err(BoundError::EmptyMarginals);
    }
    let integrand = |u: f64| payoff(marginals.iter().map(|m| m.quantile(u)).sum());
    let integral = integrate(integrand, 0.0, 1.0, options)?;
    Ok(integral.value)
}

/// Monte-Carlo estimate of `E[payoff(Σ_j X_j)]` for independent `X_j`,
/// sampled by inverse transform from each marginal's quantile.
pub fn independent_monte_carlo<M, F, R>(
    marginals: &[M],
    payoff: F,
    num_samples: usize,
    rng: &mut R,
) -> Result<f64, BoundError>
where
    M: Marginal,
    F: Fn(f64) -> f64,
    R: Rng + ?Sized,
{
    if marginals.is_empty() {
        return Err(BoundError::EmptyMarginals);
    }
    if num_samples == 0 {
        return Err(BoundError::InvalidParameter(
            "Monte-Carlo estimate needs at least one sample".to_string(),
        ));
    }
    let mut total = 0.0;
    for _ in 0..num_samples {
        let sum: f64 = marginals
            .iter()
            .map(|m| m.quantile(rng.random::<f64>()))
            .sum();
        total += payoff(sum);
    }
    Ok(total / num_samples as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marginal::Exponential;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn capacity(snr: f64) -> impl Fn(f64) -> f64 {
        move |s| (1.0 + snr * s).log2()
    }

    #[test]
    fn comonotonic_closed_form_matches_integral() {
        for n in [1usize, 2, 4] {
            let marginals = vec![Exponential::unit(); n];
            let integral =
                comonotonic_integral(&marginals, capacity(10.0), &QuadratureOptions::default())
                    .unwrap();
            assert_abs_diff_eq!(integral, comonotonic_exponential(10.0, n), epsilon = 1e-6);
        }
    }

    #[test]
    fn single_channel_cases_coincide() {
        // One channel: comonotonic and independent are the same distribution.
        assert_abs_diff_eq!(
            comonotonic_exponential(5.0, 1),
            iid_exponential(5.0, 1),
            epsilon = 1e-12
        );
    }

    #[test]
    fn reference_value_two_channels() {
        assert_abs_diff_eq!(comonotonic_exponential(10.0, 2), 3.742_971_799_531_456, epsilon = 1e-9);
    }

    #[test]
    fn independence_beats_comonotonicity_for_concave_payoff() {
        for n in 2..6usize {
            assert!(iid_exponential(10.0, n) > comonotonic_exponential(10.0, n));
        }
    }

    #[test]
    fn monte_carlo_agrees_with_iid_closed_form() {
        let marginals = vec![Exponential::unit(); 3];
        let mut rng = StdRng::seed_from_u64(11);
        let estimate =
            independent_monte_carlo(&marginals, capacity(10.0), 200_000, &mut rng).unwrap();
        assert_abs_diff_eq!(estimate, iid_exponential(10.0, 3), epsilon = 0.02);
    }
}
