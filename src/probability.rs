//! Scalar probability primitives shared by the marginals, the threshold solver
//! and the baselines.
//!
//! Everything here is a pure function of its arguments. Quantile evaluation in
//! this crate always goes through [`saturate_probability`] first so that heavy
//! tails never produce an infinite value at `p = 1`.

/// Largest `f64` strictly below one (`1 − 2⁻⁵³`).
pub const ONE_BELOW: f64 = 1.0 - f64::EPSILON / 2.0;

/// Euler–Mascheroni constant γ.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Clamp a probability into the quantile domain `[0, 1)`.
///
/// Probabilities at or above one are mapped to [`ONE_BELOW`], negatives to zero.
/// NaN passes through unchanged so callers can detect it.
#[inline]
pub fn saturate_probability(p: f64) -> f64 {
    if p.is_nan() {
        p
    } else if p >= 1.0 {
        ONE_BELOW
    } else if p <= 0.0 {
        0.0
    } else {
        p
    }
}

/// Quantile of the unit-rate exponential distribution, `−ln(1 − p)`, with
/// the saturation rule applied.
#[inline]
pub fn unit_exponential_quantile(p: f64) -> f64 {
    -(-saturate_probability(p)).ln_1p()
}

/// Unit-exponential quantile at `1 − q`, evaluated as `−ln q` so that small
/// upper-tail masses keep full relative precision.
///
/// Agrees with `unit_exponential_quantile(1.0 - q)` under the same saturation
/// rule: `q` is clamped into `[1 − ONE_BELOW, 1]`.
#[inline]
pub fn unit_exponential_upper_quantile(q: f64) -> f64 {
    -q.clamp(1.0 - ONE_BELOW, 1.0).ln()
}

/// Standard normal quantile Φ⁻¹(p) using Acklam's rational approximation.
#[inline]
pub fn standard_normal_quantile(p: f64) -> Result<f64, String> {
    if !(p.is_finite() && p > 0.0 && p < 1.0) {
        return Err(format!("normal quantile requires p in (0,1), got {p}"));
    }

    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.02425;
    const P_HIGH: f64 = 1.0 - P_LOW;

    let x = if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= P_HIGH {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (-p).ln_1p()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };
    Ok(x)
}

/// Natural log of the gamma function (Lanczos, g = 7, n = 9).
pub fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEFFS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        // Reflection: Γ(x)Γ(1−x) = π / sin(πx)
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).abs().ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut acc = COEFFS[0];
    for (i, &c) in COEFFS.iter().enumerate().skip(1) {
        acc += c / (x + i as f64);
    }
    let t = x + G + 0.5;
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + acc.ln()
}

/// Regularized lower incomplete gamma function P(a, x).
///
/// Series expansion for `x < a + 1`, Lentz continued fraction otherwise.
pub fn regularized_lower_gamma(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if !x.is_finite() {
        return 1.0;
    }
    if x < a + 1.0 {
        gamma_series(a, x)
    } else {
        1.0 - gamma_continued_fraction(a, x)
    }
}

/// Regularized upper incomplete gamma function Q(a, x) = 1 − P(a, x).
///
/// Evaluated directly in the tail so that values near zero keep their
/// relative precision.
pub fn regularized_upper_gamma(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    if !x.is_finite() {
        return 0.0;
    }
    if x < a + 1.0 {
        1.0 - gamma_series(a, x)
    } else {
        gamma_continued_fraction(a, x)
    }
}

fn gamma_series(a: f64, x: f64) -> f64 {
    let mut term = 1.0 / a;
    let mut sum = term;
    let mut ap = a;
    for _ in 0..500 {
        ap += 1.0;
        term *= x / ap;
        sum += term;
        if term.abs() < sum.abs() * 1e-15 {
            break;
        }
    }
    sum * (-x + a * x.ln() - ln_gamma(a)).exp()
}

/// Upper regularized gamma Q(a, x) = 1 − P(a, x) by continued fraction.
fn gamma_continued_fraction(a: f64, x: f64) -> f64 {
    const TINY: f64 = 1e-300;
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / TINY;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..=500 {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < TINY {
            d = TINY;
        }
        c = b + an / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < 1e-15 {
            break;
        }
    }
    h * (-x + a * x.ln() - ln_gamma(a)).exp()
}

/// Generalized exponential integral `E_n(x) = ∫₁^∞ e^{−xt} / tⁿ dt`.
///
/// Power series for `x ≤ 1`, modified Lentz continued fraction above.
/// Returns `+∞` for `x = 0, n ≤ 1` and NaN for negative `x`.
pub fn expint_en(n: u32, x: f64) -> f64 {
    const MAX_ITER: usize = 200;
    const EPS: f64 = 1e-16;
    const FPMIN: f64 = 1e-300;

    if x.is_nan() || x < 0.0 {
        return f64::NAN;
    }
    if n == 0 {
        return (-x).exp() / x;
    }
    if x == 0.0 {
        return if n == 1 {
            f64::INFINITY
        } else {
            1.0 / (n as f64 - 1.0)
        };
    }

    let nm1 = n as f64 - 1.0;
    if x > 1.0 {
        let mut b = x + n as f64;
        let mut c = 1.0 / FPMIN;
        let mut d = 1.0 / b;
        let mut h = d;
        for i in 1..=MAX_ITER {
            let i = i as f64;
            let an = -i * (nm1 + i);
            b += 2.0;
            d = 1.0 / (an * d + b);
            c = b + an / c;
            let del = c * d;
            h *= del;
            if (del - 1.0).abs() < EPS {
                break;
            }
        }
        return h * (-x).exp();
    }

    let mut ans = if nm1 != 0.0 {
        1.0 / nm1
    } else {
        -x.ln() - EULER_GAMMA
    };
    let mut fact = 1.0;
    for i in 1..=MAX_ITER {
        let i_f = i as f64;
        fact *= -x / i_f;
        let del = if (i as f64 - nm1).abs() > 0.5 {
            -fact / (i_f - nm1)
        } else {
            // ψ(n) = −γ + Σ_{k=1}^{n−1} 1/k
            let psi = -EULER_GAMMA + (1..n).map(|k| 1.0 / k as f64).sum::<f64>();
            fact * (-x.ln() + psi)
        };
        ans += del;
        if del.abs() < ans.abs() * EPS {
            break;
        }
    }
    ans
}

/// Exponential integral `E1(x) = −Ei(−x)` for `x > 0`.
#[inline]
pub fn expint_e1(x: f64) -> f64 {
    expint_en(1, x)
}
