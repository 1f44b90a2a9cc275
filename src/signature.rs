//! GO-PCA signatures
//!
//! A [`Signature`] is a set of genes that (a) are all annotated with the
//! same GO term and (b) all contribute to the same principal component.
//! As a consequence, their expression profiles are correlated.
use std::fmt::Display;
use std::hash::{Hash, Hasher};

use hashers::fnv::FNV1aHasher64;
use ndarray::{Array2, ArrayView2, Axis};

use crate::annotations::GoTerm;
use crate::enrichment::EnrichmentResult;
use crate::{GoPcaError, GoPcaResult};

/// Abbreviations applied to term names in signature labels, in this order
const ABBREVIATIONS: [(&str, &str); 5] = [
    ("positive ", "pos. "),
    ("negative ", "neg. "),
    ("interferon-", "IFN-"),
    ("proliferation", "prolif."),
    ("signaling", "signal."),
];

/// Controls which parts are included in a signature label
///
/// See [`Signature::get_label`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelOptions {
    /// Truncate term names that are longer, `0` disables truncation
    pub max_name_length: usize,
    pub include_stats: bool,
    pub include_id: bool,
    /// Adds E-score and p-value to the stats
    pub include_pval: bool,
    pub include_domain: bool,
}

impl Default for LabelOptions {
    fn default() -> Self {
        Self {
            max_name_length: 0,
            include_stats: true,
            include_id: true,
            include_pval: false,
            include_domain: true,
        }
    }
}

/// A GO-PCA signature
///
/// The signature holds the genes (in the order of their PC ranking),
/// their expression profiles, the signed PC that the genes were ranked by
/// and the XL-mHG enrichment result of the GO term.
///
/// Signatures are immutable. The expression matrix is copied on
/// construction and only exposed as a read-only view.
///
/// Two signatures are equal if all their content is identical, including
/// the bit patterns of all statistics and expression values.
///
/// # Examples
///
/// ```
/// use gopca::{EnrichmentResult, GoTerm, Signature};
/// use ndarray::array;
///
/// let enr = EnrichmentResult::new(
///     GoTerm::new("GO:0060337", "type I interferon-signaling pathway", "BP"),
///     1.2e-7, 3.0e-9, Some(4.25), 1e-4, 30, 3, 10, 1000,
/// ).unwrap();
///
/// let signature = Signature::new(
///     vec!["IFIT1".to_string(), "MX1".to_string(), "ISG15".to_string()],
///     array![[1.0, 2.0, 3.0], [2.0, 4.0, 6.5], [0.5, 1.0, 1.4]],
///     -2,
///     enr,
/// ).unwrap();
///
/// assert_eq!(signature.k(), 3);
/// assert_eq!(signature.gene_list(), "IFIT1,ISG15,MX1");
/// assert_eq!(signature.label(), "BP: type I IFN-signal. pathway [-2:3/10]");
/// ```
#[derive(Debug, Clone)]
pub struct Signature {
    genes: Vec<String>,
    x: Array2<f64>,
    pc: i32,
    enr: EnrichmentResult,
    checksum: u64,
}

impl Signature {
    /// Constructs a new `Signature`
    ///
    /// # Errors
    ///
    /// [`GoPcaError::InvalidInput`] if the number of genes, the rows of `x`
    /// and `k` of the enrichment result differ, or if `pc` is `0`
    pub fn new(genes: Vec<String>, x: Array2<f64>, pc: i32, enr: EnrichmentResult) -> GoPcaResult<Self> {
        enr.validate()?;
        if genes.len() != x.nrows() || genes.len() != enr.k() {
            return Err(GoPcaError::InvalidInput(format!(
                "signature of {} has {} genes, {} expression rows and k={}",
                enr.term().id(),
                genes.len(),
                x.nrows(),
                enr.k()
            )));
        }
        if pc == 0 {
            return Err(GoPcaError::InvalidInput(
                "PCs are numbered starting with 1".to_string(),
            ));
        }
        let checksum = content_checksum(x.view());
        Ok(Self {
            genes,
            x,
            pc,
            enr,
            checksum,
        })
    }

    /// The genes of the signature, in the order of the PC ranking
    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    /// The expression profiles of the genes (genes × samples)
    pub fn expression(&self) -> ArrayView2<'_, f64> {
        self.x.view()
    }

    /// The PC (starting at 1) that the signature was derived from
    ///
    /// A positive sign indicates that genes were ranked by ascending
    /// loadings, a negative sign indicates a descending ranking.
    pub fn pc(&self) -> i32 {
        self.pc
    }

    /// The XL-mHG result of the GO term
    pub fn enrichment(&self) -> &EnrichmentResult {
        &self.enr
    }

    pub fn term(&self) -> &GoTerm {
        self.enr.term()
    }

    pub fn term_id(&self) -> &str {
        self.enr.term().id()
    }

    pub fn term_name(&self) -> &str {
        self.enr.term().name()
    }

    pub fn pval(&self) -> f64 {
        self.enr.pval()
    }

    pub fn escore(&self) -> Option<f64> {
        self.enr.escore()
    }

    pub fn escore_pval_thresh(&self) -> f64 {
        self.enr.escore_pval_thresh()
    }

    /// The number of genes in the signature
    pub fn k(&self) -> usize {
        self.genes.len()
    }

    /// The number of genes annotated with the GO term
    pub fn big_k(&self) -> usize {
        self.enr.big_k()
    }

    /// The cutoff in the ranked list that defined the signature
    pub fn n(&self) -> usize {
        self.enr.n()
    }

    /// The total number of genes in the data
    pub fn big_n(&self) -> usize {
        self.enr.big_n()
    }

    /// The number of samples
    pub fn n_samples(&self) -> usize {
        self.x.ncols()
    }

    /// The label with the default [`LabelOptions`], but without the term id
    pub fn label(&self) -> String {
        self.get_label(&LabelOptions {
            include_id: false,
            ..LabelOptions::default()
        })
    }

    /// Generates a signature label
    ///
    /// The full label has the format
    /// `<domain>: <term name> (<term id>) [<pc>:<k>/<K>, e=<escore>, p=<pval>]`.
    /// Common words of the term name are abbreviated.
    ///
    /// ```
    /// # use gopca::{EnrichmentResult, GoTerm, LabelOptions, Signature};
    /// # use ndarray::array;
    /// # let enr = EnrichmentResult::new(
    /// #     GoTerm::new("GO:0008284", "positive regulation of cell proliferation", "BP"),
    /// #     1.2e-7, 3.0e-9, Some(4.31), 1e-4, 30, 2, 10, 1000,
    /// # ).unwrap();
    /// # let signature = Signature::new(
    /// #     vec!["A".to_string(), "B".to_string()],
    /// #     array![[1.0, 2.0], [2.0, 4.0]],
    /// #     3,
    /// #     enr,
    /// # ).unwrap();
    /// let options = LabelOptions { include_pval: true, ..LabelOptions::default() };
    /// assert_eq!(
    ///     signature.get_label(&options),
    ///     "BP: pos. regulation of cell prolif. (GO:0008284) [3:2/10, e=4.3, p=1.2e-07]"
    /// );
    ///
    /// let options = LabelOptions {
    ///     max_name_length: 15,
    ///     include_stats: false,
    ///     include_id: false,
    ///     include_domain: false,
    ///     ..LabelOptions::default()
    /// };
    /// assert_eq!(signature.get_label(&options), "pos. regulat...");
    /// ```
    pub fn get_label(&self, options: &LabelOptions) -> String {
        let term = self.term();

        let mut term_name = term.name().to_string();
        for (pattern, replacement) in ABBREVIATIONS {
            term_name = term_name.replace(pattern, replacement);
        }
        if options.max_name_length > 0 && term_name.chars().count() > options.max_name_length {
            term_name = term_name
                .chars()
                .take(options.max_name_length.saturating_sub(3))
                .collect::<String>()
                + "...";
        }

        let mut label = if options.include_domain {
            format!("{}: {}", term.domain(), term_name)
        } else {
            term_name
        };

        if options.include_id {
            label.push_str(&format!(" ({})", term.id()));
        }

        if options.include_stats {
            let mut e_str = String::new();
            let mut p_str = String::new();
            if options.include_pval {
                p_str = format!(", p={}", format_sci(self.pval()));
                if let Some(escore) = self.escore() {
                    e_str = format!(", e={escore:.1}");
                }
            }
            label.push_str(&format!(
                " [{}:{}/{}{}{}]",
                self.pc,
                self.k(),
                self.big_k(),
                e_str,
                p_str
            ));
        }
        label
    }

    /// The median Pearson correlation of all pairs of signature genes
    ///
    /// Returns `NaN` for signatures with less than 2 genes, or if a gene
    /// has constant expression.
    pub fn median_correlation(&self) -> f64 {
        let k = self.k();
        if k < 2 {
            return f64::NAN;
        }

        let centered: Vec<Vec<f64>> = self
            .x
            .rows()
            .into_iter()
            .map(|row| {
                let mean = row.mean().unwrap_or(0.0);
                row.iter().map(|v| v - mean).collect()
            })
            .collect();
        let norms: Vec<f64> = centered
            .iter()
            .map(|row| row.iter().map(|v| v * v).sum::<f64>().sqrt())
            .collect();

        let mut correlations = Vec::with_capacity(k * (k - 1) / 2);
        for i in 0..k {
            for j in (i + 1)..k {
                let dot: f64 = centered[i]
                    .iter()
                    .zip(centered[j].iter())
                    .map(|(a, b)| a * b)
                    .sum();
                let r = dot / (norms[i] * norms[j]);
                if r.is_nan() {
                    return f64::NAN;
                }
                correlations.push(r.clamp(-1.0, 1.0));
            }
        }

        correlations.sort_by(f64::total_cmp);
        let mid = correlations.len() / 2;
        if correlations.len() % 2 == 0 {
            (correlations[mid - 1] + correlations[mid]) / 2.0
        } else {
            correlations[mid]
        }
    }

    /// Comma-separated list of the genes, in alphabetical order
    pub fn gene_list(&self) -> String {
        let mut genes: Vec<&str> = self.genes.iter().map(String::as_str).collect();
        genes.sort_unstable();
        genes.join(",")
    }

    /// The main properties of the signature as `(column, value)` pairs
    ///
    /// Used for tabular summaries of signatures.
    pub fn summary(&self) -> Vec<(String, String)> {
        vec![
            ("Label".to_string(), self.label()),
            ("PC".to_string(), self.pc.to_string()),
            ("GO Term ID".to_string(), self.term_id().to_string()),
            ("k".to_string(), self.k().to_string()),
            ("K".to_string(), self.big_k().to_string()),
            ("P-value".to_string(), format_sci(self.pval())),
            (
                format!("E-score (psi={})", format_sci(self.escore_pval_thresh())),
                self.escore().map_or_else(String::new, |e| format!("{e:.1}")),
            ),
            (
                "Median Correlation".to_string(),
                format!("{:.2}", self.median_correlation()),
            ),
            ("Genes".to_string(), self.gene_list()),
        ]
    }

    /// Returns a new signature with the samples (columns) in the given order
    ///
    /// # Errors
    ///
    /// [`GoPcaError::InvalidInput`] if `order` is not a permutation of the samples
    pub fn with_sample_order(&self, order: &[usize]) -> GoPcaResult<Self> {
        check_permutation(order, self.n_samples())?;
        Signature::new(
            self.genes.clone(),
            self.x.select(Axis(1), order),
            self.pc,
            self.enr.clone(),
        )
    }

    /// The bit patterns of all floating point statistics
    fn stat_bits(&self) -> [u64; 5] {
        [
            self.enr.pval().to_bits(),
            self.enr.ln_pval().to_bits(),
            self.enr.stat().to_bits(),
            self.enr.escore_pval_thresh().to_bits(),
            self.enr.escore().map_or(u64::MAX, f64::to_bits),
        ]
    }

    fn size_key(&self) -> (usize, usize, usize, usize) {
        (self.enr.n(), self.enr.k(), self.enr.big_k(), self.enr.big_n())
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.checksum == other.checksum
            && self.pc == other.pc
            && self.genes == other.genes
            && self.term() == other.term()
            && self.enr.escore().is_some() == other.enr.escore().is_some()
            && self.stat_bits() == other.stat_bits()
            && self.size_key() == other.size_key()
            && self.x.dim() == other.x.dim()
            && self
                .x
                .iter()
                .zip(other.x.iter())
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Eq for Signature {}

impl Hash for Signature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.genes.hash(state);
        self.pc.hash(state);
        self.term().hash(state);
        self.stat_bits().hash(state);
        self.size_key().hash(state);
        self.checksum.hash(state);
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let escore = self
            .escore()
            .map_or_else(|| "n/a".to_string(), |e| format!("{e:.1}x"));
        write!(
            f,
            "<Signature \"{}\" (p-value {} / E-score {})>",
            self.label(),
            format_sci(self.pval()),
            escore
        )
    }
}

/// FNV-1a checksum of the shape and bit patterns of a matrix
///
/// All numbers are hashed as little-endian `u64`, the checksum does not
/// depend on the platform, the Rust release or the process.
fn content_checksum(x: ArrayView2<'_, f64>) -> u64 {
    let mut hasher = FNV1aHasher64::default();
    let (rows, cols) = x.dim();
    for dim in [rows, cols] {
        hasher.write(&(dim as u64).to_le_bytes());
    }
    for value in x.iter() {
        hasher.write(&value.to_bits().to_le_bytes());
    }
    hasher.finish()
}

/// Checks that `order` contains every index of `0..len` exactly once
pub(crate) fn check_permutation(order: &[usize], len: usize) -> GoPcaResult<()> {
    let mut seen = vec![false; len];
    for idx in order {
        match seen.get_mut(*idx) {
            Some(flag) if !*flag => *flag = true,
            _ => {
                return Err(GoPcaError::InvalidInput(format!(
                    "{order:?} is not a permutation of {len} elements"
                )))
            }
        }
    }
    if order.len() != len {
        return Err(GoPcaError::InvalidInput(format!(
            "{order:?} is not a permutation of {len} elements"
        )));
    }
    Ok(())
}

/// Formats a number in scientific notation with one decimal and
/// an exponent of at least two digits, e.g. `1.2e-07`
pub(crate) fn format_sci(value: f64) -> String {
    let formatted = format!("{value:.1e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => formatted,
    }
}
