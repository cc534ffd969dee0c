use serde::{Deserialize, Serialize};

/// Which extremal dependency structure a bound is computed for.
///
/// `Best` aligns every marginal on the same probability grid (comonotonic
/// arrangement). `Worst` runs the iterative block rearrangement that drives
/// the row sums towards minimal variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundMode {
    Best,
    Worst,
}

impl BoundMode {
    pub const ALL: [BoundMode; 2] = [BoundMode::Best, BoundMode::Worst];

    pub fn label(self) -> &'static str {
        match self {
            BoundMode::Best => "best",
            BoundMode::Worst => "worst",
        }
    }
}

impl std::fmt::Display for BoundMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A `(lower, upper)` pair of scalar bounds with `lower <= upper`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundPair {
    pub lower: f64,
    pub upper: f64,
}

impl BoundPair {
    /// Builds the pair, ordering the two values if they arrive inverted.
    ///
    /// Inversions only happen through floating-point noise on nearly
    /// degenerate inputs; they are reported at `warn` level.
    pub fn new(lower: f64, upper: f64) -> Self {
        if lower > upper {
            log::warn!(
                "bound pair arrived inverted (lower={:.12e}, upper={:.12e}); swapping",
                lower,
                upper
            );
            Self {
                lower: upper,
                upper: lower,
            }
        } else {
            Self { lower, upper }
        }
    }

    /// Width of the discretization gap `upper - lower`.
    pub fn gap(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Halting state of an iterative procedure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceStatus {
    /// Stopped because the objective no longer improved beyond tolerance.
    Converged { iterations: usize },
    /// Hit the iteration cap; the best state seen so far is returned.
    NotConverged { iterations: usize },
}

impl ConvergenceStatus {
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceStatus::Converged { .. })
    }

    pub fn iterations(&self) -> usize {
        match *self {
            ConvergenceStatus::Converged { iterations }
            | ConvergenceStatus::NotConverged { iterations } => iterations,
        }
    }

    /// Combines the statuses of two independent runs; not converged wins.
    pub fn merge(self, other: ConvergenceStatus) -> ConvergenceStatus {
        let iterations = self.iterations().max(other.iterations());
        if self.is_converged() && other.is_converged() {
            ConvergenceStatus::Converged { iterations }
        } else {
            ConvergenceStatus::NotConverged { iterations }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_pair_orders_inverted_inputs() {
        let pair = BoundPair::new(2.0, 1.0);
        assert_eq!(pair.lower, 1.0);
        assert_eq!(pair.upper, 2.0);
        assert_eq!(pair.gap(), 1.0);
        assert!(pair.contains(1.5));
        assert!(!pair.contains(2.5));
    }

    #[test]
    fn merge_reports_not_converged_if_either_side_failed() {
        let a = ConvergenceStatus::Converged { iterations: 3 };
        let b = ConvergenceStatus::NotConverged { iterations: 10 };
        assert_eq!(a.merge(b), ConvergenceStatus::NotConverged { iterations: 10 });
        assert_eq!(
            a.merge(ConvergenceStatus::Converged { iterations: 7 }),
            ConvergenceStatus::Converged { iterations: 7 }
        );
    }
}
