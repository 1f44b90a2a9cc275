//! The XL-mHG test
//!
//! The minimum hypergeometric (mHG) test looks for the most significant
//! prefix of a ranked list with respect to a binary annotation: for every
//! cutoff `n`, it calculates the hypergeometric tail probability of finding
//! at least `k(n)` annotated genes among the first `n` ranks, and reports the
//! smallest of these probabilities.
//!
//! The XL-mHG variant restricts the cutoffs to prefixes that contain at
//! least `X` annotated genes and are at most `L` ranks long.
//!
//! The statistic is converted into a p-value by calculating the exact
//! probability of observing a statistic at least as extreme under random
//! placement of the `K` annotated genes (see [`pvalue`]).
use tracing::trace;

use crate::f64_from_usize;
use crate::stats::hypergeom::{ln_add, ln_tail};

/// Relative tolerance used when comparing tail probabilities to the statistic
const TOLERANCE: f64 = 1e-10;

/// The best cutoff of an XL-mHG test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MhgOutcome {
    /// The XL-mHG statistic: the minimal hypergeometric tail probability,
    /// at least `f64::MIN_POSITIVE`
    pub stat: f64,
    /// The natural logarithm of the statistic, without any lower limit
    pub ln_stat: f64,
    /// The cutoff `n*` that attains the minimum
    pub cutoff: usize,
    /// The number of annotated genes `k*` within the first `n*` ranks
    pub k: usize,
}

/// Counts the hits within each prefix of the ranked list
///
/// Returns a vector of length `N + 1` whose element `n` is `k(n)`,
/// the number of hits within the first `n` ranks.
///
/// ```
/// use gopca::stats::xlmhg::cumulative_hits;
///
/// assert_eq!(cumulative_hits(&[false, true, true]), vec![0, 0, 1, 2]);
/// ```
pub fn cumulative_hits(hits: &[bool]) -> Vec<usize> {
    let mut res = Vec::with_capacity(hits.len() + 1);
    res.push(0);
    let mut k = 0;
    for hit in hits {
        if *hit {
            k += 1;
        }
        res.push(k);
    }
    res
}

/// The effective `X` parameter for a term with `K` annotated genes
///
/// `max(x_min, ceil(x_frac * K))`, limited to `1..=K`
pub fn effective_x(x_min: usize, x_frac: f64, big_k: usize) -> usize {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let from_frac = (x_frac * f64_from_usize(big_k)).ceil() as usize;
    x_min.max(from_frac).min(big_k).max(1)
}

/// The effective `L` parameter for a list of `N` genes
pub fn effective_l(l: Option<usize>, big_n: usize) -> usize {
    l.map_or(big_n, |l| l.min(big_n))
}

/// Calculates the XL-mHG statistic of a ranked list
///
/// `hits` marks the ranks of the annotated genes. Only cutoffs `n <= l`
/// with at least `x` hits are considered. The tail probability for a fixed
/// `k` increases with `n`, so the minimum is always attained at a rank that
/// holds a hit and only those ranks are evaluated. Ties are resolved in
/// favor of the shorter prefix.
///
/// Tail probabilities are compared in log space, so even extreme
/// enrichments have a well defined minimum.
///
/// Returns `None` if no cutoff satisfies the constraints.
///
/// # Examples
///
/// ```
/// use gopca::stats::xlmhg::statistic;
///
/// let outcome = statistic(&[true, true, false], 1, 3).unwrap();
/// assert_eq!(outcome.cutoff, 2);
/// assert_eq!(outcome.k, 2);
/// assert!((outcome.stat - 1.0 / 3.0).abs() < 1e-12);
/// ```
pub fn statistic(hits: &[bool], x: usize, l: usize) -> Option<MhgOutcome> {
    let big_n = hits.len();
    let big_k = hits.iter().filter(|h| **h).count();
    let l = l.min(big_n);

    let mut best: Option<MhgOutcome> = None;
    let mut k = 0usize;
    for (idx, hit) in hits[..l].iter().enumerate() {
        if !*hit {
            continue;
        }
        k += 1;
        if k < x {
            continue;
        }
        let n = idx + 1;
        let ln_p = ln_tail(k, big_n, big_k, n);
        trace!("cutoff n={} k={} ln(HGT)={}", n, k, ln_p);
        if best.map_or(true, |b| ln_p < b.ln_stat) {
            best = Some(MhgOutcome {
                stat: from_ln(ln_p),
                ln_stat: ln_p,
                cutoff: n,
                k,
            });
        }
    }
    best
}

/// Converts a log probability into a probability of at least `f64::MIN_POSITIVE`
pub fn from_ln(ln_p: f64) -> f64 {
    ln_p.exp().clamp(f64::MIN_POSITIVE, 1.0)
}

/// Calculates the exact p-value of an XL-mHG statistic
///
/// Same as [`ln_pvalue`], but with linear probabilities. The result lies
/// in `[stat, 1]`.
///
/// # Examples
///
/// ```
/// use gopca::stats::xlmhg::pvalue;
///
/// // N = 3, K = 2: only the ranking [hit, hit, miss] reaches a
/// // statistic of 1/3, which happens in 1 of 3 rankings
/// let p = pvalue(1.0 / 3.0, 3, 2, 1, 3);
/// assert!((p - 1.0 / 3.0).abs() < 1e-12);
/// ```
pub fn pvalue(stat: f64, big_n: usize, big_k: usize, x: usize, l: usize) -> f64 {
    from_ln(ln_pvalue(stat.ln(), big_n, big_k, x, l))
        .max(stat)
        .min(1.0)
}

/// Calculates the natural logarithm of the exact p-value of an XL-mHG
/// statistic, given as `ln_stat`
///
/// The p-value is the probability that a random ranking of `K` annotated
/// genes among `N` genes yields an XL-mHG statistic `<= stat`.
///
/// Every ranking corresponds to a path through a lattice with `K` steps
/// "down" (hits) and `N - K` steps "right" (misses). A cell `(k, n)` is part
/// of the rejection region if `n <= L`, `k >= X` and `HGT(k; N, K, n) <= stat`.
/// The probability of all paths entering the rejection region is
/// accumulated step by step in log space. No path can enter the region
/// after `L` steps, so only the first `L` steps are calculated.
///
/// The result always lies in `[ln_stat, 0]`.
pub fn ln_pvalue(ln_stat: f64, big_n: usize, big_k: usize, x: usize, l: usize) -> f64 {
    if ln_stat >= 0.0 || big_k == 0 || big_k >= big_n {
        return 0.0;
    }
    let l = l.min(big_n);
    let ln_threshold = ln_stat + TOLERANCE.ln_1p();
    let k_min = rejection_bounds(ln_threshold, big_n, big_k, x, l);

    let big_w = big_n - big_k;
    let mut state = vec![f64::NEG_INFINITY; big_k + 1];
    state[0] = 0.0;
    let mut rejected = f64::NEG_INFINITY;

    for n in 0..l {
        let ln_remaining = f64_from_usize(big_n - n).ln();
        let mut next = vec![f64::NEG_INFINITY; big_k + 1];
        let lower = n.saturating_sub(big_w);
        let upper = n.min(big_k);
        for (k, p) in state.iter().enumerate().take(upper + 1).skip(lower) {
            if *p == f64::NEG_INFINITY {
                continue;
            }
            let w = n - k;
            if k < big_k {
                let step = p + f64_from_usize(big_k - k).ln() - ln_remaining;
                next[k + 1] = ln_add(next[k + 1], step);
            }
            if w < big_w {
                let step = p + f64_from_usize(big_w - w).ln() - ln_remaining;
                next[k] = ln_add(next[k], step);
            }
        }

        if let Some(Some(first)) = k_min.get(n + 1) {
            for cell in next.iter_mut().take((n + 1).min(big_k) + 1).skip(*first) {
                rejected = ln_add(rejected, *cell);
                *cell = f64::NEG_INFINITY;
            }
        }
        state = next;
    }

    rejected.max(ln_stat).min(0.0)
}

/// For every cutoff `n` in `1..=l`, the smallest `k` that lies within the
/// rejection region, or `None` if the region does not reach `n`
///
/// `HGT(k; N, K, n)` decreases with `k`, so the bound can be found
/// with a binary search.
fn rejection_bounds(
    ln_threshold: f64,
    big_n: usize,
    big_k: usize,
    x: usize,
    l: usize,
) -> Vec<Option<usize>> {
    let mut bounds = vec![None; l + 1];
    for (n, bound) in bounds.iter_mut().enumerate().skip(1) {
        let lo = x.max(1);
        let hi = n.min(big_k);
        if lo > hi || ln_tail(hi, big_n, big_k, n) > ln_threshold {
            continue;
        }
        let (mut lo, mut hi) = (lo, hi);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if ln_tail(mid, big_n, big_k, n) <= ln_threshold {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        *bound = Some(lo);
    }
    bounds
}

/// Calculates the E-score of a ranked list
///
/// The E-score is the largest fold enrichment `(k/n) / (K/N)` among all
/// cutoffs that satisfy the XL-mHG constraints and have a hypergeometric
/// tail probability of at most `psi`.
///
/// Returns `None` if no cutoff qualifies.
pub fn escore(hits: &[bool], x: usize, l: usize, psi: f64) -> Option<f64> {
    let big_n = hits.len();
    let big_k = hits.iter().filter(|h| **h).count();
    if big_k == 0 {
        return None;
    }
    let l = l.min(big_n);
    let ln_psi = psi.ln();
    let background = f64_from_usize(big_k) / f64_from_usize(big_n);

    let mut best: Option<f64> = None;
    let mut k = 0usize;
    for (idx, hit) in hits[..l].iter().enumerate() {
        if !*hit {
            continue;
        }
        k += 1;
        let n = idx + 1;
        if k < x || ln_tail(k, big_n, big_k, n) > ln_psi {
            continue;
        }
        let fold = (f64_from_usize(k) / f64_from_usize(n)) / background;
        if best.map_or(true, |b| fold > b) {
            best = Some(fold);
        }
    }
    best
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::stats::hypergeom::tail;
    use approx::assert_relative_eq;

    /// All placements of `big_k` hits among `big_n` ranks
    fn all_rankings(big_n: usize, big_k: usize) -> Vec<Vec<bool>> {
        (0u32..(1 << big_n))
            .filter(|mask| mask.count_ones() as usize == big_k)
            .map(|mask| (0..big_n).map(|i| mask & (1 << i) != 0).collect())
            .collect()
    }

    #[test]
    fn cumulative_hits_properties() {
        let hits = [true, false, false, true, true, false, true];
        let k = cumulative_hits(&hits);
        assert_eq!(k.len(), hits.len() + 1);
        assert_eq!(k[0], 0);
        assert_eq!(*k.last().unwrap(), 4);
        assert!(k.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn statistic_respects_x() {
        // the single first hit is most significant, unless 2 hits are required
        let hits = [true, false, false, false, true, false, false, false];
        let best = statistic(&hits, 1, 8).unwrap();
        assert_eq!(best.cutoff, 1);
        assert_eq!(best.k, 1);

        let best = statistic(&hits, 2, 8).unwrap();
        assert_eq!(best.cutoff, 5);
        assert_eq!(best.k, 2);
    }

    #[test]
    fn statistic_respects_l() {
        let hits = [false, false, false, true, true];
        assert!(statistic(&hits, 1, 3).is_none());
        assert_eq!(statistic(&hits, 1, 4).unwrap().cutoff, 4);
    }

    #[test]
    fn statistic_bounded_by_cutoff_k() {
        let hits = [true, false, true, true, false, false, true, false, false, false];
        let big_k = 4;
        let best = statistic(&hits, 1, hits.len()).unwrap();
        let k_at_big_k = cumulative_hits(&hits)[big_k];
        assert!(best.stat > 0.0 && best.stat <= 1.0);
        assert!(best.stat <= tail(k_at_big_k, hits.len(), big_k, big_k));
    }

    #[test]
    fn pvalue_matches_enumeration() {
        let (big_n, big_k, x, l) = (9, 3, 1, 6);
        let rankings = all_rankings(big_n, big_k);
        let stats: Vec<f64> = rankings
            .iter()
            .map(|r| statistic(r, x, l).map_or(1.0, |o| o.stat))
            .collect();

        for observed in &stats {
            let expected = stats
                .iter()
                .filter(|s| **s <= observed * (1.0 + TOLERANCE))
                .count() as f64
                / rankings.len() as f64;
            assert_relative_eq!(
                pvalue(*observed, big_n, big_k, x, l),
                expected,
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn pvalue_with_x_matches_enumeration() {
        let (big_n, big_k, x, l) = (10, 4, 2, 10);
        let rankings = all_rankings(big_n, big_k);
        let stats: Vec<f64> = rankings
            .iter()
            .map(|r| statistic(r, x, l).map_or(1.0, |o| o.stat))
            .collect();

        let observed = stats.iter().cloned().fold(1.0, f64::min);
        let expected = stats
            .iter()
            .filter(|s| **s <= observed * (1.0 + TOLERANCE))
            .count() as f64
            / rankings.len() as f64;
        let p = pvalue(observed, big_n, big_k, x, l);
        assert_relative_eq!(p, expected, epsilon = 1e-12);
        assert!(p >= observed);
    }

    #[test]
    fn pvalue_of_insignificant_statistic() {
        assert_eq!(pvalue(1.0, 20, 5, 1, 20), 1.0);
    }

    #[test]
    fn tiny_pvalues_keep_precision() {
        let mut hits = vec![true; 20];
        hits.extend(vec![false; 980]);
        let best = statistic(&hits, 1, 1000).unwrap();
        assert_eq!(best.cutoff, 20);
        let p = pvalue(best.stat, 1000, 20, 1, 1000);
        assert!(p > 0.0);
        assert!(p >= best.stat);
        assert!(p < 1e-30);
    }

    #[test]
    fn extreme_enrichment_keeps_full_cutoff() {
        let mut hits = vec![true; 300];
        hits.extend(vec![false; 9700]);
        let best = statistic(&hits, 1, 10_000).unwrap();
        assert_eq!(best.cutoff, 300);
        assert_eq!(best.k, 300);
        assert!(best.stat > 0.0);
        assert!(best.ln_stat < -1000.0);

        let ln_p = ln_pvalue(best.ln_stat, 10_000, 300, 1, 1000);
        assert!(ln_p.is_finite());
        assert!(ln_p >= best.ln_stat);
        assert!(ln_p < -1000.0);
        assert!(pvalue(best.stat, 10_000, 300, 1, 1000) > 0.0);
    }

    #[test]
    fn stronger_enrichment_has_smaller_log_pvalue() {
        let ln_p = |top: usize| {
            let mut hits = vec![true; top];
            hits.extend(vec![false; 5000]);
            hits.extend(vec![true; 250 - top]);
            hits.extend(vec![false; 4750]);
            let best = statistic(&hits, 1, 1000).unwrap();
            ln_pvalue(best.ln_stat, hits.len(), 250, 1, 1000)
        };
        // both p-values are far below f64::MIN_POSITIVE
        assert!(ln_p(240) < ln_p(230));
        assert!(ln_p(230) < f64::MIN_POSITIVE.ln());
    }

    #[test]
    fn escore_of_top_hits() {
        // N = 8, K = 2, both hits at the top => fold enrichment 4
        let hits = [true, true, false, false, false, false, false, false];
        assert_relative_eq!(escore(&hits, 1, 8, 1.0).unwrap(), 4.0);
        // psi too strict for any cutoff
        assert!(escore(&hits, 1, 8, 1e-6).is_none());
    }

    #[test]
    fn effective_parameters() {
        assert_eq!(effective_x(5, 0.25, 40), 10);
        assert_eq!(effective_x(5, 0.25, 8), 5);
        assert_eq!(effective_x(5, 0.25, 3), 3);
        assert_eq!(effective_x(1, 0.0, 3), 1);
        assert_eq!(effective_l(Some(1000), 300), 300);
        assert_eq!(effective_l(None, 300), 300);
        assert_eq!(effective_l(Some(10), 300), 10);
    }
}
