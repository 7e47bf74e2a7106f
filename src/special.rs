//! Special functions used by the count models.

use once_cell::sync::Lazy;

const LN_FACTORIAL_TABLE: usize = 256;
const SERIES_MAX_TERMS: usize = 2000;
const SERIES_REL_EPS: f64 = 1e-17;

static LN_FACTORIALS: Lazy<Vec<f64>> = Lazy::new(|| {
    let mut out = vec![0.0; LN_FACTORIAL_TABLE];
    for k in 1..LN_FACTORIAL_TABLE {
        out[k] = out[k - 1] + (k as f64).ln();
    }
    out
});

/// ln(n!)
pub fn ln_factorial(n: usize) -> f64 {
    if n < LN_FACTORIAL_TABLE {
        return LN_FACTORIALS[n];
    }
    // Stirling with the first correction terms; exact enough past the table.
    let x = n as f64;
    x * x.ln() - x + 0.5 * (2.0 * std::f64::consts::PI * x).ln() + 1.0 / (12.0 * x)
        - 1.0 / (360.0 * x.powi(3))
}

/// ln I_n(x) for the modified Bessel function of the first kind, integer order n, x > 0.
///
/// Summed as a power series in log space: the leading term (x/2)^n / n! is pulled out and the
/// remaining ratios are accumulated, so nothing overflows for the arguments a goal model sees.
pub fn ln_bessel_i(order: i32, x: f64) -> f64 {
    let n = order.unsigned_abs() as usize;
    if x <= 0.0 {
        return if n == 0 { 0.0 } else { f64::NEG_INFINITY };
    }

    let half = 0.5 * x;
    let q = half * half;
    let mut term = 1.0_f64;
    let mut sum = 1.0_f64;
    for m in 0..SERIES_MAX_TERMS {
        let m = m as f64;
        term *= q / ((m + 1.0) * (m + 1.0 + n as f64));
        sum += term;
        // Terms grow until m ~ x/2, so only stop once past the peak.
        if m + 1.0 > half && term < sum * SERIES_REL_EPS {
            break;
        }
    }

    n as f64 * half.ln() - ln_factorial(n) + sum.ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ln_factorial_matches_direct_product() {
        assert_eq!(ln_factorial(0), 0.0);
        assert!((ln_factorial(5) - 120.0_f64.ln()).abs() < 1e-12);
        let direct: f64 = (1..=300).map(|k| (k as f64).ln()).sum();
        assert!((ln_factorial(300) - direct).abs() < 1e-8);
    }

    #[test]
    fn bessel_reference_values() {
        // I_0(1) = 1.2660658777520082, I_1(2) = 1.5906368546373291
        assert!((ln_bessel_i(0, 1.0).exp() - 1.266_065_877_752_008_2).abs() < 1e-12);
        assert!((ln_bessel_i(1, 2.0).exp() - 1.590_636_854_637_329_1).abs() < 1e-12);
        assert_eq!(ln_bessel_i(-1, 2.0), ln_bessel_i(1, 2.0));
    }

    #[test]
    fn bessel_stays_finite_for_large_arguments() {
        let v = ln_bessel_i(3, 40.0);
        assert!(v.is_finite());
        // I_n(x) ~ e^x / sqrt(2 pi x) for large x
        let approx = 40.0 - 0.5 * (2.0 * std::f64::consts::PI * 40.0).ln();
        assert!((v - approx).abs() < 0.2);
    }
}
