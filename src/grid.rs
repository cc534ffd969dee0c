//! Discretization of a marginal set into lower/upper corner matrices.
//!
//! Row `i` of the lower corner holds every marginal's quantile at `i / N`, row
//! `i` of the upper corner the quantile at `(i + 1) / N`. Both matrices are
//! `N × d` with columns sorted non-decreasing, i.e. they describe the
//! comonotonic arrangement before any rearrangement happens.

use crate::bounds::BoundError;
use crate::marginal::Marginal;
use ndarray::{Array1, Array2};

/// The pair of `N × d` matrices bracketing the discretized joint arrangement.
#[derive(Debug, Clone, PartialEq)]
pub struct CornerMatrices {
    pub lower: Array2<f64>,
    pub upper: Array2<f64>,
}

impl CornerMatrices {
    pub fn num_levels(&self) -> usize {
        self.lower.nrows()
    }

    pub fn num_marginals(&self) -> usize {
        self.lower.ncols()
    }
}

/// Probability levels `(i / N, (i + 1) / N)` for `i = 0..N`. The final upper
/// level is still 1 here; [`discretize`] swaps in [`tail_proxy_level`] for
/// unbounded marginals.
pub fn probability_levels(num_levels: usize) -> (Array1<f64>, Array1<f64>) {
    let n = num_levels as f64;
    let lower = Array1::from_shape_fn(num_levels, |i| i as f64 / n);
    let upper = Array1::from_shape_fn(num_levels, |i| (i + 1) as f64 / n);
    (lower, upper)
}

/// Probability used in place of 1 for the last upper-corner row of an
/// unbounded marginal.
#[inline]
pub fn tail_proxy_level(num_levels: usize) -> f64 {
    1.0 - 1.0 / (2.0 * num_levels as f64)
}

/// Evaluates every marginal on the `N`-level grid.
pub fn discretize<M: Marginal>(
    marginals: &[M],
    num_levels: usize,
) -> Result<CornerMatrices, BoundError> {
    if marginals.is_empty() {
        return Err(BoundError::EmptyMarginals);
    }
    if num_levels == 0 {
        return Err(BoundError::InvalidLevelCount(num_levels));
    }

    let d = marginals.len();
    let (p_lower, p_upper) = probability_levels(num_levels);
    let mut lower = Array2::<f64>::zeros((num_levels, d));
    let mut upper = Array2::<f64>::zeros((num_levels, d));
    let last = num_levels - 1;
    let proxy = tail_proxy_level(num_levels);

    for (j, marginal) in marginals.iter().enumerate() {
        for i in 0..num_levels {
            lower[[i, j]] = checked_quantile(marginal, p_lower[i], j)?;
            let p_up = if i == last && !marginal.is_bounded_above() {
                proxy
            } else {
                p_upper[i]
            };
            upper[[i, j]] = checked_quantile(marginal, p_up, j)?;
        }
    }

    log::debug!(
        "discretized {} marginals on {} levels (tail proxy p={:.6})",
        d,
        num_levels,
        proxy
    );
    Ok(CornerMatrices { lower, upper })
}

/// Like [`discretize`], but first checks the marginal list against an
/// independently declared count.
pub fn discretize_declared<M: Marginal>(
    marginals: &[M],
    declared_count: usize,
    num_levels: usize,
) -> Result<CornerMatrices, BoundError> {
    if marginals.len() != declared_count {
        return Err(BoundError::InvalidMarginalCount {
            expected: declared_count,
            found: marginals.len(),
        });
    }
    discretize(marginals, num_levels)
}

fn checked_quantile<M: Marginal>(
    marginal: &M,
    probability: f64,
    column: usize,
) -> Result<f64, BoundError> {
    let value = marginal.quantile(probability);
    if value.is_finite() {
        Ok(value)
    } else {
        Err(BoundError::NonFiniteQuantile {
            column,
            probability,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marginal::{Exponential, QuantileFn, Uniform};
    use approx::assert_abs_diff_eq;

    #[test]
    fn closure_quantiles_default_to_the_tail_proxy() {
        let unbounded = discretize(&[QuantileFn::new(|p: f64| p)], 4).unwrap();
        assert_abs_diff_eq!(unbounded.upper[[3, 0]], 0.875, epsilon = 1e-15);

        let bounded = discretize(&[QuantileFn::bounded(|p: f64| p)], 4).unwrap();
        assert_abs_diff_eq!(bounded.upper[[3, 0]], 1.0, epsilon = 1e-15);
    }

    #[test]
    fn corner_rows_use_left_and_right_levels() {
        let marginals = [Exponential::unit(), Exponential::new(2.0).unwrap()];
        let corners = discretize(&marginals, 4).unwrap();
        assert_eq!(corners.lower.dim(), (4, 2));
        assert_eq!(corners.upper.dim(), (4, 2));
        assert_eq!(corners.lower[[0, 0]], 0.0);
        assert_abs_diff_eq!(corners.lower[[2, 0]], 2.0_f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(corners.upper[[1, 1]], 0.5 * 2.0_f64.ln(), epsilon = 1e-12);
        // last upper row uses p = 1 − 1/8
        assert_abs_diff_eq!(corners.upper[[3, 0]], 8.0_f64.ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(corners.upper[[3, 1]], 0.5 * 8.0_f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn upper_row_i_equals_lower_row_i_plus_one() {
        let marginals = [Exponential::unit()];
        let corners = discretize(&marginals, 10).unwrap();
        for i in 0..9 {
            assert_abs_diff_eq!(corners.upper[[i, 0]], corners.lower[[i + 1, 0]], epsilon = 1e-12);
        }
    }

    #[test]
    fn bounded_marginals_keep_their_top_quantile() {
        let marginals = [Uniform::new(0.0, 1.0).unwrap()];
        let corners = discretize(&marginals, 5).unwrap();
        assert_abs_diff_eq!(corners.upper[[4, 0]], 1.0, epsilon = 1e-15);
    }

    #[test]
    fn columns_are_sorted() {
        let marginals = [Exponential::unit(), Exponential::new(0.3).unwrap()];
        let corners = discretize(&marginals, 50).unwrap();
        for m in [&corners.lower, &corners.upper] {
            for col in m.columns() {
                assert!(col.windows(2).into_iter().all(|w| w[0] <= w[1]));
            }
        }
    }

    #[test]
    fn structural_errors() {
        let empty: [Exponential; 0] = [];
        assert!(matches!(discretize(&empty, 10), Err(BoundError::EmptyMarginals)));
        assert!(matches!(
            discretize(&[Exponential::unit()], 0),
            Err(BoundError::InvalidLevelCount(0))
        ));
        let three = [Exponential::unit(); 3];
        assert!(matches!(
            discretize_declared(&three, 2, 10),
            Err(BoundError::InvalidMarginalCount {
                expected: 2,
                found: 3
            })
        ));
    }

    #[test]
    fn non_finite_quantile_is_reported() {
        let marginals = [QuantileFn::new(|p: f64| if p > 0.5 { f64::INFINITY } else { p })];
        assert!(matches!(
            discretize(&marginals, 4),
            Err(BoundError::NonFiniteQuantile { column: 0, .. })
        ));
    }
}
