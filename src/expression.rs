//! The gene expression matrix that GO-PCA operates on
use std::collections::HashMap;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::{GoPcaError, GoPcaResult};

/// A genes × samples matrix of expression values
///
/// Rows are identified by unique gene ids, columns by unique sample ids.
/// The matrix is immutable once constructed.
///
/// # Examples
///
/// ```
/// use gopca::ExpressionMatrix;
/// use ndarray::array;
///
/// let matrix = ExpressionMatrix::new(
///     vec!["EGFR".to_string(), "KRAS".to_string()],
///     vec!["s1".to_string(), "s2".to_string(), "s3".to_string()],
///     array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
/// ).unwrap();
///
/// assert_eq!(matrix.n_genes(), 2);
/// assert_eq!(matrix.gene_index("KRAS"), Some(1));
/// assert_eq!(matrix.gene_row(1).to_vec(), vec![4.0, 5.0, 6.0]);
/// ```
#[derive(Debug, Clone)]
pub struct ExpressionMatrix {
    genes: Vec<String>,
    samples: Vec<String>,
    data: Array2<f64>,
    gene_index: HashMap<String, usize>,
}

impl ExpressionMatrix {
    /// Constructs a new `ExpressionMatrix`
    ///
    /// # Errors
    ///
    /// [`GoPcaError::InvalidInput`] if the matrix is empty, the dimensions do
    /// not match the ids, ids are duplicated or a value is not finite
    pub fn new(genes: Vec<String>, samples: Vec<String>, data: Array2<f64>) -> GoPcaResult<Self> {
        if genes.is_empty() || samples.is_empty() {
            return Err(GoPcaError::InvalidInput(
                "expression matrix must contain at least one gene and one sample".to_string(),
            ));
        }
        if data.dim() != (genes.len(), samples.len()) {
            return Err(GoPcaError::InvalidInput(format!(
                "expression matrix has shape {:?}, but {} genes and {} samples were given",
                data.dim(),
                genes.len(),
                samples.len()
            )));
        }

        let mut gene_index = HashMap::with_capacity(genes.len());
        for (idx, gene) in genes.iter().enumerate() {
            if gene_index.insert(gene.clone(), idx).is_some() {
                return Err(GoPcaError::InvalidInput(format!("duplicate gene {gene}")));
            }
        }

        let mut seen = std::collections::HashSet::with_capacity(samples.len());
        for sample in &samples {
            if !seen.insert(sample.as_str()) {
                return Err(GoPcaError::InvalidInput(format!(
                    "duplicate sample {sample}"
                )));
            }
        }

        if let Some(((row, col), value)) = data.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(GoPcaError::InvalidInput(format!(
                "expression of {} in {} is not finite ({value})",
                genes[row], samples[col]
            )));
        }

        Ok(Self {
            genes,
            samples,
            data,
            gene_index,
        })
    }

    /// The gene ids, in row order
    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    /// The sample ids, in column order
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn n_genes(&self) -> usize {
        self.genes.len()
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    /// Read-only view of the expression values
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    /// Returns the row index of the gene, or `None` if it is not present
    pub fn gene_index(&self, gene: &str) -> Option<usize> {
        self.gene_index.get(gene).copied()
    }

    /// The expression profile of the gene in row `idx`
    ///
    /// # Panics
    ///
    /// If `idx` is out of bounds
    pub fn gene_row(&self, idx: usize) -> ArrayView1<'_, f64> {
        self.data.row(idx)
    }

    /// Copies the rows of the given genes into a new matrix, in the given order
    pub(crate) fn select_rows(&self, rows: &[usize]) -> Array2<f64> {
        self.data.select(Axis(0), rows)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::array;

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{prefix}{i}")).collect()
    }

    #[test]
    fn shape_mismatch() {
        let res = ExpressionMatrix::new(ids("g", 3), ids("s", 2), array![[1.0, 2.0], [3.0, 4.0]]);
        assert!(matches!(res, Err(GoPcaError::InvalidInput(_))));
    }

    #[test]
    fn duplicate_genes() {
        let genes = vec!["a".to_string(), "a".to_string()];
        let res = ExpressionMatrix::new(genes, ids("s", 2), array![[1.0, 2.0], [3.0, 4.0]]);
        assert!(res.is_err());
    }

    #[test]
    fn duplicate_samples() {
        let samples = vec!["s".to_string(), "s".to_string()];
        let res = ExpressionMatrix::new(ids("g", 2), samples, array![[1.0, 2.0], [3.0, 4.0]]);
        assert!(res.is_err());
    }

    #[test]
    fn non_finite_values() {
        let res = ExpressionMatrix::new(
            ids("g", 2),
            ids("s", 2),
            array![[1.0, f64::NAN], [3.0, 4.0]],
        );
        assert!(res.is_err());
    }

    #[test]
    fn select_rows() {
        let m = ExpressionMatrix::new(
            ids("g", 3),
            ids("s", 2),
            array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]],
        )
        .unwrap();
        assert_eq!(m.select_rows(&[2, 0]), array![[5.0, 6.0], [1.0, 2.0]]);
        assert_eq!(m.gene_index("g3"), Some(2));
        assert_eq!(m.gene_index("g4"), None);
    }
}
