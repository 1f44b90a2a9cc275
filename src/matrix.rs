//! The signature matrix and its clustering
//!
//! A [`SignatureMatrix`] summarizes the expression of every signature in
//! every sample. Imagine three signatures and four samples:
//!
//! | Signature       |   s1 |   s2 |   s3 |   s4 |
//! |:--------------- | ----:| ----:| ----:| ----:|
//! | **BP: mitosis** |  1.2 |  0.3 |  1.1 |  0.2 |
//! | **CC: ribosome**|  5.1 |  5.3 |  4.9 |  5.0 |
//! | **BP: IFN-...** |  0.1 |  2.4 |  0.2 |  2.6 |
//!
//! Each value is the summary (by default the mean) of the expression of the
//! signature genes in one sample.
//!
//! [`MatrixOrderer`] reorders the rows and (optionally) the columns by
//! average linkage clustering, so that similar signatures and similar
//! samples end up next to each other.
use std::cmp::Ordering;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::signature::{check_permutation, LabelOptions, Signature};
use crate::stats::Linkage;
use crate::{GoPcaError, GoPcaResult};

/// Summarizes the expression of the signature genes per sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureSummary {
    /// Average expression of the genes
    #[default]
    Mean,
    /// Median expression of the genes
    Median,
    /// Average of the genes after standardizing each gene to zero mean
    /// and unit variance across the samples
    ZScoreMean,
}

impl SignatureSummary {
    /// Summarizes `x` (genes × samples) into one value per sample
    pub fn summarize(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        match self {
            SignatureSummary::Mean => x
                .mean_axis(Axis(0))
                .unwrap_or_else(|| Array1::zeros(x.ncols())),
            SignatureSummary::Median => x
                .columns()
                .into_iter()
                .map(|col| median(col.to_vec()))
                .collect(),
            SignatureSummary::ZScoreMean => {
                let mut z = x.to_owned();
                for mut row in z.rows_mut() {
                    let mean = row.mean().unwrap_or(0.0);
                    let std = if row.len() > 1 { row.std(1.0) } else { 0.0 };
                    if std > 0.0 {
                        row.mapv_inplace(|v| (v - mean) / std);
                    } else {
                        row.fill(0.0);
                    }
                }
                z.mean_axis(Axis(0))
                    .unwrap_or_else(|| Array1::zeros(x.ncols()))
            }
        }
    }
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Signatures × samples matrix of summarized expression values
///
/// The columns of every signature's expression matrix are aligned with
/// the samples of the `SignatureMatrix`.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureMatrix {
    signatures: Vec<Signature>,
    samples: Vec<String>,
    values: Array2<f64>,
}

impl SignatureMatrix {
    /// Creates the matrix by summarizing the expression of each signature
    ///
    /// # Errors
    ///
    /// [`GoPcaError::InvalidInput`] if a signature has a different number
    /// of samples
    ///
    /// # Examples
    ///
    /// ```
    /// use gopca::{EnrichmentResult, GoTerm, Signature, SignatureMatrix, SignatureSummary};
    /// use ndarray::array;
    ///
    /// let enr = EnrichmentResult::new(
    ///     GoTerm::new("GO:0006412", "translation", "BP"), 1e-8, 1e-9, Some(3.0), 1e-4, 10, 2, 5, 100,
    /// ).unwrap();
    /// let signature = Signature::new(
    ///     vec!["RPL3".to_string(), "RPS6".to_string()],
    ///     array![[1.0, 2.0, 3.0], [3.0, 4.0, 5.0]],
    ///     1,
    ///     enr,
    /// ).unwrap();
    ///
    /// let samples = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    /// let matrix = SignatureMatrix::from_signatures(vec![signature], samples, SignatureSummary::Mean).unwrap();
    /// assert_eq!(matrix.values().row(0).to_vec(), vec![2.0, 3.0, 4.0]);
    /// ```
    pub fn from_signatures(
        signatures: Vec<Signature>,
        samples: Vec<String>,
        summary: SignatureSummary,
    ) -> GoPcaResult<Self> {
        let mut values = Array2::<f64>::zeros((signatures.len(), samples.len()));
        for (mut row, signature) in values.rows_mut().into_iter().zip(signatures.iter()) {
            if signature.n_samples() != samples.len() {
                return Err(sample_mismatch(signature, samples.len()));
            }
            row.assign(&summary.summarize(signature.expression()));
        }
        Self::new(signatures, samples, values)
    }

    /// Creates the matrix from precomputed values
    ///
    /// # Errors
    ///
    /// [`GoPcaError::InvalidInput`] if the shape of `values` does not match
    /// the signatures and samples
    pub fn new(signatures: Vec<Signature>, samples: Vec<String>, values: Array2<f64>) -> GoPcaResult<Self> {
        if values.dim() != (signatures.len(), samples.len()) {
            return Err(GoPcaError::InvalidInput(format!(
                "matrix of shape {:?} for {} signatures and {} samples",
                values.dim(),
                signatures.len(),
                samples.len()
            )));
        }
        if let Some(signature) = signatures
            .iter()
            .find(|sig| sig.n_samples() != samples.len())
        {
            return Err(sample_mismatch(signature, samples.len()));
        }
        Ok(Self {
            signatures,
            samples,
            values,
        })
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// The summarized expression values (signatures × samples)
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// The number of signatures
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// The labels of all signatures
    pub fn labels(&self, options: &LabelOptions) -> Vec<String> {
        self.signatures
            .iter()
            .map(|sig| sig.get_label(options))
            .collect()
    }

    /// Returns a new matrix with reordered rows and columns
    ///
    /// The columns of every signature's expression follow the new sample order.
    ///
    /// # Errors
    ///
    /// [`GoPcaError::InvalidInput`] if `rows` or `cols` are not permutations
    pub fn permute(&self, rows: &[usize], cols: &[usize]) -> GoPcaResult<Self> {
        check_permutation(rows, self.len())?;
        check_permutation(cols, self.samples.len())?;
        let signatures = rows
            .iter()
            .map(|idx| self.signatures[*idx].with_sample_order(cols))
            .collect::<GoPcaResult<Vec<Signature>>>()?;
        let samples = cols.iter().map(|idx| self.samples[*idx].clone()).collect();
        let values = self.values.select(Axis(0), rows).select(Axis(1), cols);
        Self::new(signatures, samples, values)
    }
}

fn sample_mismatch(signature: &Signature, n_samples: usize) -> GoPcaError {
    GoPcaError::InvalidInput(format!(
        "signature {} has {} samples instead of {}",
        signature.term_id(),
        signature.n_samples(),
        n_samples
    ))
}

/// Distance metrics for clustering rows and columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    /// Sum of absolute differences
    Cityblock,
    /// `1 - cos(a, b)`
    Cosine,
    /// `1 - pearson(a, b)`
    Correlation,
}

impl DistanceMetric {
    /// The distance of two vectors of equal length
    ///
    /// Cosine and correlation distances are `NaN` for zero-length and
    /// constant vectors, respectively.
    pub fn distance(&self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
        match self {
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y).powi(2))
                .sum::<f64>()
                .sqrt(),
            DistanceMetric::Cityblock => a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum(),
            DistanceMetric::Cosine => 1.0 - cosine(a.iter().copied(), b.iter().copied()),
            DistanceMetric::Correlation => {
                let mean_a = a.mean().unwrap_or(0.0);
                let mean_b = b.mean().unwrap_or(0.0);
                1.0 - cosine(a.iter().map(|v| v - mean_a), b.iter().map(|v| v - mean_b))
            }
        }
    }
}

fn cosine<A, B>(a: A, b: B) -> f64
where
    A: Iterator<Item = f64>,
    B: Iterator<Item = f64>,
{
    let (dot, norm_a, norm_b) = a
        .zip(b)
        .fold((0.0, 0.0, 0.0), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });
    dot / (norm_a * norm_b).sqrt()
}

/// Orders a [`SignatureMatrix`] by hierarchical clustering
///
/// Rows (signatures) are always clustered, columns (samples) only if
/// `cluster_samples` is set. Both use average linkage.
///
/// The resulting order depends only on the content of the matrix, not on
/// its current order: equal distances are resolved by the values of the
/// rows or columns, then by term id and PC or by sample name. Ordering an
/// already ordered matrix does not change it. This also applies to `invert_signatures`, which reverses the row
/// order: ordering twice with `invert_signatures` gives the same matrix as
/// ordering once.
///
/// # Examples
///
/// ```
/// use gopca::{DistanceMetric, MatrixOrderer};
///
/// let orderer = MatrixOrderer {
///     sample_metric: DistanceMetric::Correlation,
///     ..MatrixOrderer::default()
/// };
/// assert_eq!(orderer.signature_metric, DistanceMetric::Euclidean);
/// assert!(orderer.cluster_samples);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixOrderer {
    pub signature_metric: DistanceMetric,
    pub sample_metric: DistanceMetric,
    /// Reverse the order of the signatures
    pub invert_signatures: bool,
    pub cluster_samples: bool,
}

impl Default for MatrixOrderer {
    fn default() -> Self {
        Self {
            signature_metric: DistanceMetric::Euclidean,
            sample_metric: DistanceMetric::Euclidean,
            invert_signatures: false,
            cluster_samples: true,
        }
    }
}

impl MatrixOrderer {
    /// Returns a reordered copy of `matrix`
    ///
    /// # Errors
    ///
    /// Only fails if the permuted matrix is invalid, which indicates a bug
    pub fn order(&self, matrix: &SignatureMatrix) -> GoPcaResult<SignatureMatrix> {
        let values = matrix.values();

        let rows: Vec<ArrayView1<f64>> = values.rows().into_iter().collect();
        let row_names: Vec<String> = matrix
            .signatures()
            .iter()
            .map(|sig| format!("{}\t{}", sig.term_id(), sig.pc()))
            .collect();
        let mut row_order = leaf_order(&rows, &row_names, self.signature_metric);
        if self.invert_signatures {
            row_order.reverse();
        }

        let col_order = if self.cluster_samples {
            let cols: Vec<ArrayView1<f64>> = values.columns().into_iter().collect();
            leaf_order(&cols, matrix.samples(), self.sample_metric)
        } else {
            (0..values.ncols()).collect()
        };

        matrix.permute(&row_order, &col_order)
    }
}

/// Clusters the vectors and returns the order of the leaves
///
/// `names` break ties between vectors with identical values.
fn leaf_order(vectors: &[ArrayView1<f64>], names: &[String], metric: DistanceMetric) -> Vec<usize> {
    // Vectors are compared by their sorted values, so that the comparison
    // does not depend on the order of the other axis
    let keys: Vec<Vec<f64>> = vectors
        .iter()
        .map(|v| {
            let mut key = v.to_vec();
            key.sort_by(f64::total_cmp);
            key
        })
        .collect();
    let cmp = |a: usize, b: usize| {
        lexicographic(&keys[a], &keys[b]).then_with(|| names[a].cmp(&names[b]))
    };

    let linkage = Linkage::average_by(
        vectors,
        |combs| combs.map(|(a, b)| metric.distance(a.view(), b.view())).collect(),
        cmp,
    );
    linkage.leaf_order(cmp)
}

fn lexicographic(a: &[f64], b: &[f64]) -> Ordering {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| x.total_cmp(y))
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}
