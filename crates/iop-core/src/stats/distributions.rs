//! Normal and Student t distributions.

use std::f64::consts::{PI, SQRT_2};

/// Iteration cap for the incomplete beta continued fraction.
const BETA_CF_MAX_ITER: usize = 300;
const BETA_CF_EPS: f64 = 3.0e-16;
const FP_MIN: f64 = 1.0e-300;

/// Beyond this many degrees of freedom the t distribution is treated as normal.
const T_NORMAL_DF: f64 = 1.0e7;

// =============================================================================
// NORMAL
// =============================================================================

/// Complementary error function.
///
/// Chebyshev fit with fractional error below 1.2e-7 everywhere.
#[must_use]
pub fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let ans = t
        * (-z * z - 1.265_512_23
            + t * (1.000_023_68
                + t * (0.374_091_96
                    + t * (0.096_784_18
                        + t * (-0.186_288_06
                            + t * (0.278_868_07
                                + t * (-1.135_203_98
                                    + t * (1.488_515_87
                                        + t * (-0.822_152_23 + t * 0.170_872_77)))))))))
            .exp();
    if x >= 0.0 { ans } else { 2.0 - ans }
}

/// Standard normal CDF: P(Z <= z).
#[must_use]
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / SQRT_2)
}

/// Standard normal survival function: P(Z > z).
#[must_use]
pub fn normal_sf(z: f64) -> f64 {
    0.5 * erfc(z / SQRT_2)
}

/// Two-sided p-value of a z statistic.
#[must_use]
pub fn normal_two_sided_p(z: f64) -> f64 {
    (2.0 * normal_sf(z.abs())).clamp(0.0, 1.0)
}

/// Standard normal quantile (inverse CDF).
///
/// Acklam's rational approximation, relative error below 1.15e-9.
#[must_use]
pub fn normal_quantile(p: f64) -> f64 {
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

    if p.is_nan() {
        return f64::NAN;
    }
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

// =============================================================================
// GAMMA / BETA
// =============================================================================

/// Natural log of the gamma function (Lanczos, g = 7).
#[must_use]
pub fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEF: [f64; 9] = [
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
        // Reflection formula
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut a = COEF[0];
    for (i, &c) in COEF.iter().enumerate().skip(1) {
        a += c / (x + i as f64);
    }
    let t = x + G + 0.5;
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}

/// Regularized incomplete beta function I_x(a, b).
#[must_use]
pub fn regularized_incomplete_beta(x: f64, a: f64, b: f64) -> f64 {
    if x.is_nan() || a <= 0.0 || b <= 0.0 {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();

    // The continued fraction converges fast on this side of the mean.
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(x, a, b) / a
    } else {
        1.0 - front * beta_continued_fraction(1.0 - x, b, a) / b
    }
}

/// Continued fraction for the incomplete beta (modified Lentz).
fn beta_continued_fraction(x: f64, a: f64, b: f64) -> f64 {
    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let guard = |v: f64| if v.abs() < FP_MIN { FP_MIN } else { v };

    let mut c = 1.0;
    let mut d = 1.0 / guard(1.0 - qab * x / qap);
    let mut h = d;

    for m in 1..=BETA_CF_MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        // Even step
        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 / guard(1.0 + aa * d);
        c = guard(1.0 + aa / c);
        h *= d * c;

        // Odd step
        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 / guard(1.0 + aa * d);
        c = guard(1.0 + aa / c);
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < BETA_CF_EPS {
            break;
        }
    }
    h
}

// =============================================================================
// STUDENT T
// =============================================================================

/// Two-sided p-value of a t statistic with `df` degrees of freedom.
#[must_use]
pub fn student_t_two_sided_p(t: f64, df: f64) -> f64 {
    if t.is_nan() || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if df > T_NORMAL_DF {
        return normal_two_sided_p(t);
    }
    if t.is_infinite() {
        return 0.0;
    }
    regularized_incomplete_beta(df / (df + t * t), 0.5 * df, 0.5).clamp(0.0, 1.0)
}

/// Student t CDF: P(T <= t).
#[must_use]
pub fn student_t_cdf(t: f64, df: f64) -> f64 {
    let tail = 0.5 * student_t_two_sided_p(t, df);
    if t > 0.0 { 1.0 - tail } else { tail }
}

/// Student t quantile (inverse CDF), by bisection on the CDF.
#[must_use]
pub fn student_t_quantile(p: f64, df: f64) -> f64 {
    if p.is_nan() || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    if df > T_NORMAL_DF {
        return normal_quantile(p);
    }
    if p < 0.5 {
        return -student_t_quantile(1.0 - p, df);
    }
    if p == 0.5 {
        return 0.0;
    }

    let mut lo = 0.0;
    let mut hi = 1.0;
    while student_t_cdf(hi, df) < p && hi < 1.0e12 {
        lo = hi;
        hi *= 2.0;
    }
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if student_t_cdf(mid, df) < p {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo <= 1.0e-12 * hi.max(1.0) {
            break;
        }
    }
    0.5 * (lo + hi)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn normal_cdf_known_values() {
        assert!(close(normal_cdf(0.0), 0.5, 1e-7));
        assert!(close(normal_cdf(1.96), 0.975_002_1, 1e-6));
        assert!(close(normal_cdf(-1.0), 0.158_655_25, 1e-6));
        assert!(close(normal_sf(3.0), 0.001_349_9, 1e-6));
    }

    #[test]
    fn normal_sf_symmetry() {
        for z in [0.1, 0.5, 1.0, 2.5, 4.0] {
            assert!(close(normal_sf(z) + normal_sf(-z), 1.0, 1e-7));
        }
    }

    #[test]
    fn normal_quantile_known_values() {
        assert!(close(normal_quantile(0.5), 0.0, 1e-9));
        assert!(close(normal_quantile(0.975), 1.959_963_985, 1e-7));
        assert!(close(normal_quantile(0.995), 2.575_829_304, 1e-7));
        assert!(close(normal_quantile(0.01), -2.326_347_874, 1e-7));
        assert!(normal_quantile(0.0).is_infinite());
    }

    #[test]
    fn ln_gamma_matches_factorials() {
        assert!(close(ln_gamma(1.0), 0.0, 1e-12));
        assert!(close(ln_gamma(5.0), 24f64.ln(), 1e-12));
        assert!(close(ln_gamma(0.5), PI.sqrt().ln(), 1e-12));
        assert!(close(ln_gamma(10.5), 13.940_625_219_403_763, 1e-10));
    }

    #[test]
    fn incomplete_beta_edges_and_symmetry() {
        assert_eq!(regularized_incomplete_beta(0.0, 2.0, 3.0), 0.0);
        assert_eq!(regularized_incomplete_beta(1.0, 2.0, 3.0), 1.0);
        // I_x(1, 1) = x
        assert!(close(regularized_incomplete_beta(0.3, 1.0, 1.0), 0.3, 1e-12));
        // I_x(a, b) = 1 - I_{1-x}(b, a)
        let lhs = regularized_incomplete_beta(0.35, 2.5, 4.0);
        let rhs = 1.0 - regularized_incomplete_beta(0.65, 4.0, 2.5);
        assert!(close(lhs, rhs, 1e-12));
        assert!(regularized_incomplete_beta(0.5, -1.0, 1.0).is_nan());
    }

    #[test]
    fn t_distribution_known_values() {
        // df = 1 is Cauchy: P(T <= 1) = 0.75
        assert!(close(student_t_cdf(1.0, 1.0), 0.75, 1e-10));
        assert!(close(student_t_two_sided_p(2.228_138_852, 10.0), 0.05, 1e-8));
        assert!(close(student_t_two_sided_p(0.0, 5.0), 1.0, 1e-12));
        assert!(close(student_t_cdf(-2.0, 3.0) + student_t_cdf(2.0, 3.0), 1.0, 1e-12));
    }

    #[test]
    fn t_quantile_known_values() {
        assert!(close(student_t_quantile(0.975, 10.0), 2.228_138_852, 1e-8));
        assert!(close(student_t_quantile(0.975, 4.0), 2.776_445_105, 1e-8));
        assert!(close(student_t_quantile(0.995, 30.0), 2.749_995_654, 1e-8));
        assert!(close(student_t_quantile(0.025, 10.0), -2.228_138_852, 1e-8));
        assert!(close(student_t_quantile(0.5, 7.0), 0.0, 1e-12));
    }

    #[test]
    fn t_converges_to_normal() {
        let z = normal_quantile(0.975);
        assert!(close(student_t_quantile(0.975, 1.0e8), z, 1e-9));
        assert!(close(student_t_quantile(0.975, 100_000.0), z, 1e-4));
    }

    #[test]
    fn invalid_df_is_nan() {
        assert!(student_t_two_sided_p(1.0, 0.0).is_nan());
        assert!(student_t_quantile(0.9, -3.0).is_nan());
    }
}
