use approx::assert_abs_diff_eq;
use ergodic_bounds::{
    BoundMode, Exponential, LogNormal, Marginal, RearrangementEngine, compute_bound_ra,
    discretize, mixed_marginals,
};
use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

fn sorted(column: ArrayView1<'_, f64>) -> Vec<f64> {
    let mut values = column.to_vec();
    values.sort_by(f64::total_cmp);
    values
}

fn shuffled_columns(matrix: &Array2<f64>, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = matrix.clone();
    for mut column in out.columns_mut() {
        let mut values = column.to_vec();
        values.shuffle(&mut rng);
        for (slot, value) in column.iter_mut().zip(values) {
            *slot = value;
        }
    }
    out
}

#[test]
fn every_mode_preserves_column_multisets() {
    let links = mixed_marginals().expect("mixed marginals");
    let corners = discretize(&links, 200).expect("discretize");
    let engine = RearrangementEngine::default();
    for mode in BoundMode::ALL {
        let out = engine.rearrange_corners(&corners, mode);
        for (before, after) in [
            (&corners.lower, &out.lower.matrix),
            (&corners.upper, &out.upper.matrix),
        ] {
            assert_eq!(before.dim(), after.dim());
            for j in 0..before.ncols() {
                assert_eq!(sorted(before.column(j)), sorted(after.column(j)), "{mode}, column {j}");
            }
        }
    }
}

#[test]
fn scrambled_input_keeps_multisets_and_best_mode_undoes_it() {
    let marginals = [Exponential::unit(), Exponential::new(0.5).expect("rate")];
    let corners = discretize(&marginals, 64).expect("discretize");
    let scrambled = shuffled_columns(&corners.lower, 3);
    let engine = RearrangementEngine::default();

    let worst = engine.rearrange(scrambled.view(), BoundMode::Worst);
    let best = engine.rearrange(scrambled.view(), BoundMode::Best);
    for j in 0..2 {
        assert_eq!(sorted(scrambled.column(j)), sorted(worst.matrix.column(j)));
    }
    assert_eq!(best.matrix, corners.lower);
    assert!(worst.row_sum_variance <= best.row_sum_variance);
}

#[test]
fn single_marginal_has_no_dependency_ambiguity() {
    let marginals = [LogNormal::new(0.2, 0.8).expect("log-normal")];
    let payoff = |s: f64| (1.0 + 10.0 * s).log2();
    let num_levels = 50;
    let best = compute_bound_ra(&marginals, num_levels, BoundMode::Best, payoff).expect("best");
    let worst = compute_bound_ra(&marginals, num_levels, BoundMode::Worst, payoff).expect("worst");
    assert_eq!(best.bounds, worst.bounds);

    let n = num_levels as f64;
    let direct: f64 = (0..num_levels)
        .map(|i| payoff(marginals[0].quantile(i as f64 / n)))
        .sum::<f64>()
        / n;
    assert_abs_diff_eq!(best.bounds.lower, direct, epsilon = 1e-12);
}

#[test]
fn single_exponential_reference_bracket() {
    let marginals = [Exponential::unit()];
    let result = compute_bound_ra(&marginals, 50, BoundMode::Worst, |s| (1.0 + 10.0 * s).log2())
        .expect("bound");
    assert_abs_diff_eq!(result.bounds.lower, 2.84742, epsilon = 1e-4);
    assert_abs_diff_eq!(result.bounds.upper, 2.95854, epsilon = 1e-4);
}

#[test]
fn gap_tightens_as_levels_grow() {
    let marginals = vec![Exponential::unit(); 3];
    let payoff = |s: f64| (1.0 + 10.0 * s).log2();
    let mut previous = f64::INFINITY;
    for num_levels in [5usize, 10, 100, 1000, 10000] {
        let gap = compute_bound_ra(&marginals, num_levels, BoundMode::Worst, payoff)
            .expect("bound")
            .bounds
            .gap();
        assert!(gap >= 0.0);
        assert!(gap <= previous, "gap grew at N={num_levels}: {gap} > {previous}");
        previous = gap;
    }
    assert!(previous < 1e-2);
}
