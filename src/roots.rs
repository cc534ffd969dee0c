//! Bracketed scalar root finding (Brent's method).
//!
//! Inverse quadratic interpolation and secant steps are taken while they stay
//! well inside the bracket; otherwise the step falls back to bisection. The
//! bracket never loses its sign change, so convergence is guaranteed for any
//! continuous function with `f(lo)·f(hi) <= 0`.

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RootError {
    #[error("f(a) and f(b) must have different signs (f({lo:.6e})={f_lo:.6e}, f({hi:.6e})={f_hi:.6e})")]
    NoSignChange {
        lo: f64,
        hi: f64,
        f_lo: f64,
        f_hi: f64,
    },
    #[error("objective is not finite at x={x:.6e}")]
    NotFinite { x: f64 },
    #[error("root finder did not converge within {max_iterations} iterations (last x={last:.6e})")]
    MaxIterations { max_iterations: usize, last: f64 },
}

/// Stopping rule: `|bracket| / 2 < (xtol + rtol·|x|) / 2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RootOptions {
    pub xtol: f64,
    pub rtol: f64,
    pub max_iterations: usize,
}

impl Default for RootOptions {
    fn default() -> Self {
        Self {
            xtol: 2e-12,
            rtol: 4.0 * f64::EPSILON,
            max_iterations: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootResult {
    pub root: f64,
    pub iterations: usize,
    pub function_calls: usize,
}

/// Finds a root of `f` inside `[lo, hi]`.
///
/// `hint`, when it lies strictly inside the bracket, is evaluated first and
/// used to shrink the bracket to the half that keeps the sign change.
pub fn brent<F>(
    f: F,
    lo: f64,
    hi: f64,
    hint: Option<f64>,
    options: &RootOptions,
) -> Result<RootResult, RootError>
where
    F: Fn(f64) -> f64,
{
    let calls = Cell::new(0usize);
    let eval = |x: f64| -> Result<f64, RootError> {
        calls.set(calls.get() + 1);
        let v = f(x);
        if v.is_nan() {
            Err(RootError::NotFinite { x })
        } else {
            Ok(v)
        }
    };

    let (mut xpre, mut xcur) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    let mut fpre = eval(xpre)?;
    let mut fcur = eval(xcur)?;

    if fpre * fcur > 0.0 {
        return Err(RootError::NoSignChange {
            lo: xpre,
            hi: xcur,
            f_lo: fpre,
            f_hi: fcur,
        });
    }
    if fpre == 0.0 {
        return Ok(RootResult {
            root: xpre,
            iterations: 0,
            function_calls: calls.get(),
        });
    }
    if fcur == 0.0 {
        return Ok(RootResult {
            root: xcur,
            iterations: 0,
            function_calls: calls.get(),
        });
    }

    if let Some(x0) = hint.filter(|&x0| x0 > xpre && x0 < xcur) {
        let f0 = eval(x0)?;
        if f0 == 0.0 {
            return Ok(RootResult {
                root: x0,
                iterations: 0,
                function_calls: calls.get(),
            });
        }
        if fpre * f0 < 0.0 {
            xcur = x0;
            fcur = f0;
        } else {
            xpre = x0;
            fpre = f0;
        }
    }

    let mut xblk = 0.0;
    let mut fblk = 0.0;
    let mut spre = 0.0;
    let mut scur = 0.0;

    for iteration in 1..=options.max_iterations {
        if fpre * fcur < 0.0 {
            xblk = xpre;
            fblk = fpre;
            spre = xcur - xpre;
            scur = spre;
        }
        if fblk.abs() < fcur.abs() {
            xpre = xcur;
            xcur = xblk;
            xblk = xpre;
            fpre = fcur;
            fcur = fblk;
            fblk = fpre;
        }

        let delta = 0.5 * (options.xtol + options.rtol * xcur.abs());
        let sbis = 0.5 * (xblk - xcur);
        if fcur == 0.0 || sbis.abs() < delta {
            return Ok(RootResult {
                root: xcur,
                iterations: iteration,
                function_calls: calls.get(),
            });
        }

        if spre.abs() > delta && fcur.abs() < fpre.abs() {
            let stry = if xpre == xblk {
                // secant
                -fcur * (xcur - xpre) / (fcur - fpre)
            } else {
                // inverse quadratic interpolation
                let dpre = (fpre - fcur) / (xpre - xcur);
                let dblk = (fblk - fcur) / (xblk - xcur);
                -fcur * (fblk * dblk - fpre * dpre) / (dblk * dpre * (fblk - fpre))
            };
            if 2.0 * stry.abs() < spre.abs().min(3.0 * sbis.abs() - delta) {
                spre = scur;
                scur = stry;
            } else {
                spre = sbis;
                scur = sbis;
            }
        } else {
            spre = sbis;
            scur = sbis;
        }

        xpre = xcur;
        fpre = fcur;
        if scur.abs() > delta {
            xcur += scur;
        } else {
            xcur += if sbis > 0.0 { delta } else { -delta };
        }
        fcur = eval(xcur)?;
    }

    Err(RootError::MaxIterations {
        max_iterations: options.max_iterations,
        last: xcur,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn finds_cube_root_of_two() {
        let res = brent(|x| x * x * x - 2.0, 0.0, 2.0, None, &RootOptions::default()).unwrap();
        assert_abs_diff_eq!(res.root, 2.0_f64.cbrt(), epsilon = 1e-11);
        assert!(res.iterations < 50);
    }

    #[test]
    fn transcendental_root_with_hint() {
        // cos(x) = x near 0.739085
        let f = |x: f64| x.cos() - x;
        let with_hint = brent(f, 0.0, 1.0, Some(0.5), &RootOptions::default()).unwrap();
        let without = brent(f, 0.0, 1.0, None, &RootOptions::default()).unwrap();
        assert_abs_diff_eq!(with_hint.root, 0.739_085_133_215_160_6, epsilon = 1e-11);
        assert_abs_diff_eq!(without.root, with_hint.root, epsilon = 1e-11);
    }

    #[test]
    fn hint_outside_bracket_is_ignored() {
        let res = brent(|x| x - 0.25, 0.0, 1.0, Some(5.0), &RootOptions::default()).unwrap();
        assert_abs_diff_eq!(res.root, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn reversed_bracket_is_accepted() {
        let res = brent(|x| x - 0.25, 1.0, 0.0, None, &RootOptions::default()).unwrap();
        assert_abs_diff_eq!(res.root, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn root_on_endpoint_is_returned_immediately() {
        let res = brent(|x| x - 1.0, 0.0, 1.0, None, &RootOptions::default()).unwrap();
        assert_eq!(res.root, 1.0);
        assert_eq!(res.iterations, 0);
    }

    #[test]
    fn missing_sign_change_is_an_error() {
        let err = brent(|x| x * x + 1.0, -1.0, 1.0, None, &RootOptions::default()).unwrap_err();
        assert!(matches!(err, RootError::NoSignChange { .. }));
    }

    #[test]
    fn nan_objective_is_an_error() {
        let err = brent(|_| f64::NAN, 0.0, 1.0, None, &RootOptions::default()).unwrap_err();
        assert!(matches!(err, RootError::NotFinite { .. }));
    }
}
