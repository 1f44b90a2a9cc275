//! Hypergeometric probabilities
//!
//! Only the upper tail is needed for GO-PCA: the probability of drawing
//! at least `k` annotated genes in `n` draws without replacement from a
//! universe of `N` genes of which `K` are annotated.
use std::cmp;

use statrs::function::factorial::ln_binomial;

/// The support of the hypergeometric distribution
///
/// ```text
/// max(0, n + K - N) ..= min(K, n)
/// ```
fn support(big_n: usize, big_k: usize, n: usize) -> (usize, usize) {
    ((n + big_k).saturating_sub(big_n), cmp::min(big_k, n))
}

/// Probability mass at `k`
pub fn pmf(k: usize, big_n: usize, big_k: usize, n: usize) -> f64 {
    let (min, max) = support(big_n, big_k, n);
    if k < min || k > max {
        return 0.0;
    }
    ln_pmf(k, big_n, big_k, n).exp()
}

fn ln_pmf(k: usize, big_n: usize, big_k: usize, n: usize) -> f64 {
    ln_binomial(big_k as u64, k as u64) + ln_binomial((big_n - big_k) as u64, (n - k) as u64)
        - ln_binomial(big_n as u64, n as u64)
}

/// Upper tail `P(X >= k)` of the hypergeometric distribution
///
/// `big_n` is the population (all genes), `big_k` the number of successes
/// (annotated genes) and `n` the number of draws (the cutoff in the ranked
/// list).
///
/// Tails below the smallest representable `f64` are returned as `0.0`,
/// use [`ln_tail`] where such values must be compared.
///
/// # Panics
///
/// If `big_k > big_n` or `n > big_n`
///
/// # Examples
///
/// ```
/// use gopca::stats::hypergeom::tail;
///
/// // both annotated genes at the top of a list of 3
/// assert!((tail(2, 3, 2, 2) - 1.0 / 3.0).abs() < 1e-12);
/// // at least 0 successes is always certain
/// assert_eq!(tail(0, 3, 2, 2), 1.0);
/// ```
pub fn tail(k: usize, big_n: usize, big_k: usize, n: usize) -> f64 {
    ln_tail(k, big_n, big_k, n).exp().min(1.0)
}

/// Natural logarithm of the upper tail `P(X >= k)`
///
/// The tail is summed over the probability mass function from `k` to the
/// end of the support in log space, so the result stays finite for tails
/// far below `f64::MIN_POSITIVE`. Returns `f64::NEG_INFINITY` if `k` lies
/// above the support.
///
/// # Panics
///
/// If `big_k > big_n` or `n > big_n`
///
/// # Examples
///
/// ```
/// use gopca::stats::hypergeom::{ln_tail, tail};
///
/// // 300 annotated genes at the top of 10000 genes
/// assert_eq!(tail(300, 10_000, 300, 300), 0.0);
/// assert!(ln_tail(300, 10_000, 300, 300) > -2000.0);
/// ```
pub fn ln_tail(k: usize, big_n: usize, big_k: usize, n: usize) -> f64 {
    assert!(
        big_k <= big_n && n <= big_n,
        "invalid hypergeometric parameters N={big_n} K={big_k} n={n}"
    );
    let (min, max) = support(big_n, big_k, n);
    if k <= min {
        0.0
    } else if k > max {
        f64::NEG_INFINITY
    } else {
        let terms: Vec<f64> = (k..=max).map(|i| ln_pmf(i, big_n, big_k, n)).collect();
        ln_sum_exp(&terms).min(0.0)
    }
}

/// `ln(exp(a) + exp(b))` without leaving log space
pub(crate) fn ln_add(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let max = a.max(b);
    max + (-(a - b).abs()).exp().ln_1p()
}

fn ln_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn support_bounds() {
        assert_eq!(support(50, 25, 30), (5, 25));
        assert_eq!(support(50, 40, 30), (20, 30));
        assert_eq!(support(50, 10, 13), (0, 10));
    }

    #[test]
    fn upper_tail() {
        // Numbers calculated here https://statisticsbyjim.com/probability/hypergeometric-distribution/
        // 2 or more
        assert_relative_eq!(tail(2, 50, 25, 13), 0.9996189832542451, epsilon = 1e-12);
        // 4 or more
        assert_relative_eq!(tail(4, 50, 25, 13), 0.9746644799047702, epsilon = 1e-12);
        // 8 or more
        assert_relative_eq!(tail(8, 50, 25, 13), 0.26009737477738537, epsilon = 1e-12);
        // 13 or more
        assert_relative_eq!(tail(13, 50, 25, 13), 0.000014654490222007184, max_relative = 1e-9);
        assert_eq!(tail(14, 50, 25, 13), 0.0);
    }

    #[test]
    fn pmf_sums_to_one() {
        let total: f64 = (0..=10).map(|k| pmf(k, 40, 10, 12)).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn tail_decreases_with_k() {
        let mut last = 1.0;
        for k in 0..=7 {
            let p = tail(k, 30, 7, 12);
            assert!(p <= last + 1e-15);
            last = p;
        }
    }

    #[test]
    fn log_tail_matches_tail() {
        for k in 0..=8 {
            let ln = ln_tail(k, 50, 25, 13);
            assert_relative_eq!(ln.exp(), tail(k, 50, 25, 13), max_relative = 1e-12);
        }
        assert_eq!(ln_tail(14, 50, 25, 13), f64::NEG_INFINITY);
        assert_eq!(ln_tail(0, 50, 25, 13), 0.0);
    }

    #[test]
    fn log_tail_below_f64_range() {
        // P(X >= 300) for 300 draws with all 300 annotated genes = 1 / C(10000, 300)
        let expected = -ln_binomial(10_000, 300);
        assert!(expected < -1000.0);
        assert_relative_eq!(ln_tail(300, 10_000, 300, 300), expected, max_relative = 1e-12);
        // the tail keeps decreasing with every additional hit
        assert!(ln_tail(300, 10_000, 300, 300) < ln_tail(299, 10_000, 300, 299));
    }

    #[test]
    fn log_addition() {
        assert_relative_eq!(ln_add(0.5f64.ln(), 0.25f64.ln()), 0.75f64.ln(), epsilon = 1e-15);
        assert_eq!(ln_add(f64::NEG_INFINITY, -3.0), -3.0);
        assert_eq!(ln_add(-3.0, f64::NEG_INFINITY), -3.0);
        assert_relative_eq!(ln_add(-2000.0, -2000.0), -2000.0 + 2f64.ln(), max_relative = 1e-15);
    }

    #[test]
    #[should_panic(expected = "invalid hypergeometric parameters")]
    fn invalid_parameters() {
        tail(1, 2, 3, 2);
    }
}
