//! XL-mHG enrichment of GO terms in ranked gene lists
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::annotations::GoTerm;
use crate::config::GoPcaConfig;
use crate::f64_from_usize;
use crate::ranking::RankedGeneList;
use crate::stats::xlmhg;
use crate::{GoPcaError, GoPcaResult};

/// The result of an XL-mHG test of one GO term in one ranked gene list
///
/// - `n`: the selected cutoff in the ranked list
/// - `k`: the number of annotated genes within the first `n` ranks
/// - `K`: the number of annotated genes in the universe
/// - `N`: the size of the gene universe
///
/// It always holds that `1 <= k <= K <= N` and `k <= n <= N`.
///
/// P-values below `f64::MIN_POSITIVE` are reported as `f64::MIN_POSITIVE`
/// by [`EnrichmentResult::pval`], the exact value is kept by
/// [`EnrichmentResult::ln_pval`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    term: GoTerm,
    pval: f64,
    ln_pval: f64,
    stat: f64,
    escore: Option<f64>,
    psi: f64,
    n: usize,
    k: usize,
    #[serde(rename = "K")]
    big_k: usize,
    #[serde(rename = "N")]
    big_n: usize,
}

impl EnrichmentResult {
    /// Constructs a new `EnrichmentResult`
    ///
    /// # Errors
    ///
    /// [`GoPcaError::InvalidInput`] if the sizes violate `1 <= k <= K <= N`
    /// and `k <= n <= N`, or the p-value is outside of `(0, 1]`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        term: GoTerm,
        pval: f64,
        stat: f64,
        escore: Option<f64>,
        psi: f64,
        n: usize,
        k: usize,
        big_k: usize,
        big_n: usize,
    ) -> GoPcaResult<Self> {
        let res = Self {
            term,
            pval,
            ln_pval: pval.ln(),
            stat,
            escore,
            psi,
            n,
            k,
            big_k,
            big_n,
        };
        res.validate()?;
        Ok(res)
    }

    /// Checks the invariants of the result
    pub(crate) fn validate(&self) -> GoPcaResult<()> {
        if !(1 <= self.k && self.k <= self.big_k && self.big_k <= self.big_n) {
            return Err(GoPcaError::InvalidInput(format!(
                "enrichment of {} has invalid sizes k={} K={} N={}",
                self.term.id(),
                self.k,
                self.big_k,
                self.big_n
            )));
        }
        if !(self.k <= self.n && self.n <= self.big_n) {
            return Err(GoPcaError::InvalidInput(format!(
                "enrichment of {} has invalid cutoff n={} (k={}, N={})",
                self.term.id(),
                self.n,
                self.k,
                self.big_n
            )));
        }
        if !(self.pval > 0.0 && self.pval <= 1.0 && self.ln_pval <= 0.0) {
            return Err(GoPcaError::InvalidInput(format!(
                "enrichment of {} has invalid p-value {}",
                self.term.id(),
                self.pval
            )));
        }
        Ok(())
    }

    /// The tested GO term
    pub fn term(&self) -> &GoTerm {
        &self.term
    }

    /// The XL-mHG p-value
    pub fn pval(&self) -> f64 {
        self.pval
    }

    /// The natural logarithm of the XL-mHG p-value
    ///
    /// Unlike [`EnrichmentResult::pval`], this stays exact for p-values
    /// that cannot be represented as `f64`.
    pub fn ln_pval(&self) -> f64 {
        self.ln_pval
    }

    /// The XL-mHG test statistic (the minimal hypergeometric tail probability)
    pub fn stat(&self) -> f64 {
        self.stat
    }

    /// The E-score, only defined for p-values `<= psi`
    pub fn escore(&self) -> Option<f64> {
        self.escore
    }

    /// The p-value threshold `psi` used for the E-score
    pub fn escore_pval_thresh(&self) -> f64 {
        self.psi
    }

    /// The cutoff `n`
    pub fn n(&self) -> usize {
        self.n
    }

    /// Annotated genes above the cutoff (`k`)
    pub fn k(&self) -> usize {
        self.k
    }

    /// Annotated genes in the universe (`K`)
    pub fn big_k(&self) -> usize {
        self.big_k
    }

    /// Size of the gene universe (`N`)
    pub fn big_n(&self) -> usize {
        self.big_n
    }

    /// The fold enrichment `(k/n) / (K/N)` at the cutoff
    pub fn fold_enrichment(&self) -> f64 {
        (f64_from_usize(self.k) / f64_from_usize(self.n))
            / (f64_from_usize(self.big_k) / f64_from_usize(self.big_n))
    }
}

/// Runs XL-mHG tests with a fixed set of parameters
///
/// # Examples
///
/// ```
/// use gopca::{EnrichmentTester, GoTerm, RankedGeneList};
///
/// let genes = vec!["g1".to_string(), "g2".to_string(), "g3".to_string()];
/// let ranked = RankedGeneList::from_loadings(&genes, &[0.1, 0.9, 0.5], -1).unwrap();
///
/// let tester = EnrichmentTester::new(1, 0.0, None, 1.0).unwrap();
/// let term = GoTerm::new("GO:1", "foo", "BP");
/// let res = tester.test(&ranked, &term, &[1, 2]).unwrap();
///
/// assert_eq!(res.n(), 2);
/// assert_eq!(res.k(), 2);
/// assert!((res.pval() - 1.0 / 3.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnrichmentTester {
    x_min: usize,
    x_frac: f64,
    l: Option<usize>,
    psi: f64,
    pval_thresh: Option<f64>,
}

impl EnrichmentTester {
    /// Constructs a new `EnrichmentTester`
    ///
    /// - `x_min` and `x_frac`: a cutoff must capture at least
    ///   `max(x_min, ceil(x_frac * K))` annotated genes
    /// - `l`: the longest tested prefix (`None` for the whole list)
    /// - `psi`: the p-value threshold for the E-score
    ///
    /// # Errors
    ///
    /// [`GoPcaError::Configuration`] for out-of-range parameters
    pub fn new(x_min: usize, x_frac: f64, l: Option<usize>, psi: f64) -> GoPcaResult<Self> {
        let tester = Self {
            x_min,
            x_frac,
            l,
            psi,
            pval_thresh: None,
        };
        tester.as_config().validate()?;
        Ok(tester)
    }

    /// Skips the p-value calculation of terms that cannot reach `pval_thresh`
    ///
    /// The p-value is never smaller than the XL-mHG statistic. If the
    /// statistic is above `pval_thresh`, the exact p-value is not calculated
    /// and reported as `1`.
    ///
    /// # Errors
    ///
    /// [`GoPcaError::Configuration`] if `pval_thresh` is outside of `(0, 1]`
    pub fn with_pval_thresh(self, pval_thresh: f64) -> GoPcaResult<Self> {
        if !(pval_thresh > 0.0 && pval_thresh <= 1.0) {
            return Err(GoPcaError::Configuration(format!(
                "pval_thresh must be in (0, 1], got {pval_thresh}"
            )));
        }
        Ok(Self {
            pval_thresh: Some(pval_thresh),
            ..self
        })
    }

    /// Creates a tester with the XL-mHG parameters and the p-value threshold
    /// of the config
    pub fn from_config(config: &GoPcaConfig) -> Self {
        Self {
            x_min: config.mhg_x_min,
            x_frac: config.mhg_x_frac,
            l: config.mhg_l,
            psi: config.escore_pval_thresh,
            pval_thresh: Some(config.pval_thresh),
        }
    }

    fn as_config(&self) -> GoPcaConfig {
        GoPcaConfig {
            mhg_x_min: self.x_min,
            mhg_x_frac: self.x_frac,
            mhg_l: self.l,
            escore_pval_thresh: self.psi,
            ..GoPcaConfig::default()
        }
    }

    /// Tests the enrichment of the `annotated` genes in the ranked list
    ///
    /// `annotated` contains the row indices of the genes annotated with `term`.
    ///
    /// If no cutoff satisfies the `X` and `L` constraints, the result spans
    /// the whole list (`n = N`, `k = K`) with a p-value of `1`.
    ///
    /// # Errors
    ///
    /// - [`GoPcaError::DegenerateTerm`] if no gene or every gene is annotated
    /// - [`GoPcaError::InvalidInput`] if an index is outside of the gene universe
    pub fn test(
        &self,
        ranked: &RankedGeneList,
        term: &GoTerm,
        annotated: &[usize],
    ) -> GoPcaResult<EnrichmentResult> {
        let hits = ranked.hits(annotated)?;
        let big_n = hits.len();
        let big_k = hits.iter().filter(|h| **h).count();
        if big_k == 0 || big_k == big_n {
            return Err(GoPcaError::DegenerateTerm {
                term: term.id().to_string(),
                annotated: big_k,
                universe: big_n,
            });
        }

        let x = xlmhg::effective_x(self.x_min, self.x_frac, big_k);
        let l = xlmhg::effective_l(self.l, big_n);

        let Some(outcome) = xlmhg::statistic(&hits, x, l) else {
            trace!(
                "{} (PC {}): no cutoff with at least {} hits within {} ranks",
                term.id(),
                ranked.pc(),
                x,
                l
            );
            return EnrichmentResult::new(
                term.clone(),
                1.0,
                1.0,
                None,
                self.psi,
                big_n,
                big_k,
                big_k,
                big_n,
            );
        };

        if self
            .pval_thresh
            .map_or(false, |thresh| outcome.ln_stat > thresh.ln())
        {
            trace!(
                "{} (PC {}): stat={:e} cannot reach the p-value threshold",
                term.id(),
                ranked.pc(),
                outcome.stat
            );
            return EnrichmentResult::new(
                term.clone(),
                1.0,
                outcome.stat,
                None,
                self.psi,
                outcome.cutoff,
                outcome.k,
                big_k,
                big_n,
            );
        }

        let ln_pval = xlmhg::ln_pvalue(outcome.ln_stat, big_n, big_k, x, l);
        let pval = xlmhg::from_ln(ln_pval);
        let escore = if ln_pval <= self.psi.ln() {
            xlmhg::escore(&hits, x, l, self.psi).or_else(|| {
                Some(
                    (f64_from_usize(outcome.k) / f64_from_usize(outcome.cutoff))
                        / (f64_from_usize(big_k) / f64_from_usize(big_n)),
                )
            })
        } else {
            None
        };
        trace!(
            "{} (PC {}): n={} k={} K={} N={} stat={:e} p={:e}",
            term.id(),
            ranked.pc(),
            outcome.cutoff,
            outcome.k,
            big_k,
            big_n,
            outcome.stat,
            pval
        );

        let mut res = EnrichmentResult::new(
            term.clone(),
            pval,
            outcome.stat,
            escore,
            self.psi,
            outcome.cutoff,
            outcome.k,
            big_k,
            big_n,
        )?;
        res.ln_pval = ln_pval;
        Ok(res)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn genes(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("g{i}")).collect()
    }

    fn term() -> GoTerm {
        GoTerm::new("GO:0000001", "test term", "BP")
    }

    #[test]
    fn three_gene_example() {
        let genes = genes(3);
        let loadings = [0.1, 0.9, 0.5];
        let tester = EnrichmentTester::new(1, 0.0, None, 1.0).unwrap();

        // ascending: [g1, g3, g2], both annotated genes at the bottom
        let ascending = RankedGeneList::from_loadings(&genes, &loadings, 1).unwrap();
        let res = tester.test(&ascending, &term(), &[1, 2]).unwrap();
        assert_relative_eq!(res.pval(), 1.0);

        // descending: [g2, g3, g1]
        let descending = RankedGeneList::from_loadings(&genes, &loadings, -1).unwrap();
        let res = tester.test(&descending, &term(), &[1, 2]).unwrap();
        assert_eq!(res.n(), 2);
        assert_eq!(res.k(), 2);
        assert_eq!(res.big_k(), 2);
        assert_eq!(res.big_n(), 3);
        assert_relative_eq!(res.stat(), 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(res.pval(), 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(res.escore().unwrap(), 1.5, epsilon = 1e-12);
    }

    #[test]
    fn degenerate_terms() {
        let genes = genes(3);
        let ranked = RankedGeneList::from_loadings(&genes, &[0.1, 0.9, 0.5], 1).unwrap();
        let tester = EnrichmentTester::new(1, 0.0, None, 1.0).unwrap();

        assert!(matches!(
            tester.test(&ranked, &term(), &[]),
            Err(GoPcaError::DegenerateTerm { annotated: 0, .. })
        ));
        assert!(matches!(
            tester.test(&ranked, &term(), &[0, 1, 2]),
            Err(GoPcaError::DegenerateTerm { annotated: 3, .. })
        ));
    }

    #[test]
    fn no_qualifying_cutoff() {
        let genes = genes(10);
        let loadings: Vec<f64> = (0..10).map(f64::from).collect();
        let ranked = RankedGeneList::from_loadings(&genes, &loadings, 1).unwrap();
        // annotated genes sit at ranks 8 and 9, L = 5
        let tester = EnrichmentTester::new(1, 0.0, Some(5), 1.0).unwrap();
        let res = tester.test(&ranked, &term(), &[8, 9]).unwrap();
        assert_eq!(res.n(), 10);
        assert_eq!(res.k(), 2);
        assert_relative_eq!(res.pval(), 1.0);
        assert!(res.escore().is_none());
    }

    #[test]
    fn escore_only_for_significant_terms() {
        let genes = genes(20);
        let loadings: Vec<f64> = (0..20).map(f64::from).collect();
        let ranked = RankedGeneList::from_loadings(&genes, &loadings, 1).unwrap();

        let strict = EnrichmentTester::new(1, 0.0, None, 1e-3).unwrap();
        let res = strict.test(&ranked, &term(), &[0, 7, 15]).unwrap();
        assert!(res.pval() > 1e-3);
        assert!(res.escore().is_none());

        let res = strict.test(&ranked, &term(), &[0, 1, 2, 3]).unwrap();
        assert!(res.pval() <= 1e-3);
        // all 4 annotated genes at the top of 20 => 5-fold enrichment
        assert_relative_eq!(res.escore().unwrap(), 5.0, epsilon = 1e-12);
        assert!(res.pval() >= res.stat());
    }

    #[test]
    fn extreme_enrichment() {
        let genes = genes(10_000);
        let loadings: Vec<f64> = (0..10_000).map(f64::from).collect();
        let ranked = RankedGeneList::from_loadings(&genes, &loadings, 1).unwrap();
        let annotated: Vec<usize> = (0..300).collect();

        let tester = EnrichmentTester::new(1, 0.0, Some(1000), 1e-4).unwrap();
        let res = tester.test(&ranked, &term(), &annotated).unwrap();
        assert_eq!(res.n(), 300);
        assert_eq!(res.k(), 300);
        assert!(res.pval() > 0.0);
        assert_eq!(res.pval(), f64::MIN_POSITIVE);
        assert!(res.ln_pval() < -1000.0);
        assert!(res.stat() > 0.0);
        assert_relative_eq!(res.escore().unwrap(), 10_000.0 / 300.0, epsilon = 1e-9);
    }

    #[test]
    fn pvalue_threshold_skips_hopeless_terms() {
        let genes = genes(20);
        let loadings: Vec<f64> = (0..20).map(f64::from).collect();
        let ranked = RankedGeneList::from_loadings(&genes, &loadings, 1).unwrap();

        let exact = EnrichmentTester::new(1, 0.0, None, 1e-3).unwrap();
        let fast = exact.with_pval_thresh(1e-3).unwrap();

        // statistic 3/20 is above the threshold
        let res = fast.test(&ranked, &term(), &[0, 7, 15]).unwrap();
        assert_eq!(res.pval(), 1.0);
        assert_eq!(res.ln_pval(), 0.0);
        assert_relative_eq!(res.stat(), 0.15, epsilon = 1e-12);
        assert!(exact.test(&ranked, &term(), &[0, 7, 15]).unwrap().pval() < 1.0);

        // statistic 1/4845 is below the threshold, the p-value is exact
        assert_eq!(
            fast.test(&ranked, &term(), &[0, 1, 2, 3]).unwrap(),
            exact.test(&ranked, &term(), &[0, 1, 2, 3]).unwrap()
        );

        assert!(exact.with_pval_thresh(0.0).is_err());
        assert!(exact.with_pval_thresh(1.5).is_err());
    }

    #[test]
    fn invalid_parameters() {
        assert!(matches!(
            EnrichmentTester::new(10, 0.0, Some(5), 0.1),
            Err(GoPcaError::Configuration(_))
        ));
        assert!(EnrichmentTester::new(1, 0.0, None, 0.0).is_err());
    }

    #[test]
    fn result_invariants() {
        assert!(EnrichmentResult::new(term(), 0.1, 0.01, None, 0.1, 5, 3, 4, 10).is_ok());
        assert!(EnrichmentResult::new(term(), 0.1, 0.01, None, 0.1, 5, 0, 4, 10).is_err());
        assert!(EnrichmentResult::new(term(), 0.1, 0.01, None, 0.1, 5, 5, 4, 10).is_err());
        assert!(EnrichmentResult::new(term(), 0.1, 0.01, None, 0.1, 2, 3, 4, 10).is_err());
        assert!(EnrichmentResult::new(term(), 1.1, 0.01, None, 0.1, 5, 3, 4, 10).is_err());
        assert!(EnrichmentResult::new(term(), 0.0, 0.01, None, 0.1, 5, 3, 4, 10).is_err());
    }
}
