use approx::{assert_abs_diff_eq, assert_relative_eq};
use ergodic_bounds::threshold::{
    FALLBACK_THRESHOLD, ThresholdSolver, arrangement_value, balance_diff,
};
use ergodic_bounds::roots::RootOptions;
use ergodic_bounds::quadrature::QuadratureOptions;
use ergodic_bounds::{RootStatus, best_case_exact, determine_cmin};

/// Residual scaled by the local slope of `diff`: the relative distance of
/// `c_min` from the true root.
fn relative_root_error(c: f64, n: usize) -> f64 {
    let residual = balance_diff(c, n, 0.0);
    if residual == 0.0 {
        return 0.0;
    }
    let h = 1e-6 * c;
    let slope = (balance_diff(c + h, n, 0.0) - balance_diff(c - h, n, 0.0)) / (2.0 * h);
    (residual / slope).abs() / c
}

#[test]
fn threshold_solves_balance_equation_inside_bracket() {
    for n in 2..=30usize {
        let sol = determine_cmin(n, 0.0).expect("valid parameters");
        let upper = 1.0 / (n * (n - 1)) as f64;
        assert!(sol.is_converged(), "n={n}: {:?}", sol.status);
        assert!(sol.c_min > 0.0 && sol.c_min <= upper, "n={n}: c_min={}", sol.c_min);
        if n > 2 {
            assert!(sol.c_min < upper, "n={n}");
        }
        let rel = relative_root_error(sol.c_min, n);
        assert!(rel <= 1e-9, "n={n}: c_min={} relative error {rel}", sol.c_min);
        match sol.status {
            RootStatus::Converged { residual, .. } => assert!(residual.abs() < 1e-8, "n={n}"),
            RootStatus::Inaccurate { .. } | RootStatus::Fallback { .. } => unreachable!(),
        }
    }
}

#[test]
fn large_link_counts_keep_threshold_and_bound_accurate() {
    let c25 = determine_cmin(25, 0.0).expect("n=25").c_min;
    assert_relative_eq!(c25, 1.388_794_398_088_187_1e-11, max_relative = 1e-8);

    let payoff = |s: f64| (1.0 + 10.0 * s).log2();
    let mut previous = f64::NEG_INFINITY;
    for n in 2..=30usize {
        let exact = best_case_exact(n, 0.0, payoff).expect("valid parameters");
        assert!(!exact.is_suspect(), "n={n}");
        assert!(exact.value > previous, "n={n}: {} after {previous}", exact.value);
        previous = exact.value;
    }
}

#[test]
fn reference_thresholds() {
    assert_abs_diff_eq!(determine_cmin(5, 0.0).expect("n=5").c_min, 0.007_959_698_011_099, epsilon = 1e-9);
    assert_abs_diff_eq!(determine_cmin(3, 0.0).expect("n=3").c_min, 0.094_541_577_788_104, epsilon = 1e-9);
}

#[test]
fn repeated_solves_are_bit_identical() {
    let first = determine_cmin(7, 0.0).expect("first");
    for _ in 0..5 {
        let again = determine_cmin(7, 0.0).expect("again");
        assert_eq!(first.c_min.to_bits(), again.c_min.to_bits());
    }
}

#[test]
fn starved_solver_falls_back_with_flag() {
    let solver = ThresholdSolver::new(
        RootOptions {
            max_iterations: 1,
            ..RootOptions::default()
        },
        QuadratureOptions::default(),
    );
    let sol = solver.determine_cmin(6, 0.0).expect("valid parameters");
    assert!(sol.is_fallback());
    assert_eq!(sol.c_min, FALLBACK_THRESHOLD);
    let exact = solver
        .best_case_exact(6, 0.0, |s: f64| (1.0 + 10.0 * s).log2())
        .expect("valid parameters");
    assert!(exact.is_suspect());
}

#[test]
fn arrangement_value_at_threshold_is_finite() {
    for n in [3usize, 4, 6] {
        let c = determine_cmin(n, 0.0).expect("solve").c_min;
        let h = arrangement_value(c, n, 0.0);
        assert!(h.is_finite() && h > 0.0);
    }
}

#[test]
fn exact_capacity_reference_values() {
    let payoff = |s: f64| (1.0 + 10.0 * s).log2();
    assert_abs_diff_eq!(best_case_exact(3, 0.0, payoff).expect("n=3").value, 4.935_688_958, epsilon = 1e-6);
    assert_abs_diff_eq!(best_case_exact(5, 0.0, payoff).expect("n=5").value, 5.670_953_394, epsilon = 1e-6);
}
