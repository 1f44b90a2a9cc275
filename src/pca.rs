//! Principal component analysis of expression matrices
//!
//! Samples are the observations and genes the variables. The loadings of a
//! PC are the coefficients of its principal axis, one per gene.
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use tracing::debug;

use crate::expression::ExpressionMatrix;
use crate::f64_from_usize;
use crate::{GoPcaError, GoPcaResult};

/// Eigenvalues below this fraction of the total variance count as zero
const RANK_TOLERANCE: f64 = 1e-12;

/// Per-gene loadings of the first principal components
///
/// # Examples
///
/// ```
/// use gopca::{ExpressionMatrix, PcaLoadings};
/// use ndarray::array;
///
/// let matrix = ExpressionMatrix::new(
///     vec!["a".to_string(), "b".to_string(), "c".to_string()],
///     vec!["s1".to_string(), "s2".to_string(), "s3".to_string(), "s4".to_string()],
///     array![[1.0, 2.0, 3.0, 4.0], [2.0, 4.0, 6.0, 8.0], [1.0, 1.0, 1.0, 1.0]],
/// ).unwrap();
///
/// let pca = PcaLoadings::compute(&matrix, 1).unwrap();
/// let pc1 = pca.component(0);
/// assert!((pc1[1] - 2.0 / 5f64.sqrt()).abs() < 1e-10);
/// assert!(pc1[2].abs() < 1e-10);
/// assert!((pca.explained_variance()[0] - 25.0 / 3.0).abs() < 1e-10);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PcaLoadings {
    loadings: Array2<f64>,
    explained_variance: Vec<f64>,
}

impl PcaLoadings {
    /// Computes the first `n_components` PCs of `matrix`
    ///
    /// Every gene is centered across the samples. The principal axes are
    /// derived from the eigendecomposition of the sample × sample Gram
    /// matrix, so the cost depends on the number of samples, not genes.
    ///
    /// The sign of each PC is chosen so that its largest absolute loading
    /// is positive.
    ///
    /// # Errors
    ///
    /// [`GoPcaError::InvalidInput`] if `n_components` is `0`, exceeds
    /// `min(samples - 1, genes)` or if a requested PC explains no variance
    pub fn compute(matrix: &ExpressionMatrix, n_components: usize) -> GoPcaResult<Self> {
        let n_samples = matrix.n_samples();
        let max_components = n_samples.saturating_sub(1).min(matrix.n_genes());
        if n_components == 0 || n_components > max_components {
            return Err(GoPcaError::InvalidInput(format!(
                "cannot compute {n_components} PCs of {} genes and {n_samples} samples",
                matrix.n_genes()
            )));
        }

        let values = matrix.values();
        let means = values
            .mean_axis(Axis(1))
            .ok_or_else(|| GoPcaError::InvalidInput("empty expression matrix".to_string()))?;
        let centered = &values - &means.insert_axis(Axis(1));

        let gram = centered.t().dot(&centered);
        let eigen = SymmetricEigen::new(DMatrix::from_fn(n_samples, n_samples, |i, j| {
            gram[[i, j]]
        }));

        let mut order: Vec<usize> = (0..n_samples).collect();
        order.sort_by(|a, b| eigen.eigenvalues[*b].total_cmp(&eigen.eigenvalues[*a]));

        let total: f64 = eigen.eigenvalues.iter().filter(|v| **v > 0.0).sum();
        let denominator = f64_from_usize(n_samples - 1);

        let mut loadings = Array2::<f64>::zeros((matrix.n_genes(), n_components));
        let mut explained_variance = Vec::with_capacity(n_components);
        for (pc, idx) in order.into_iter().take(n_components).enumerate() {
            let eigenvalue = eigen.eigenvalues[idx];
            if eigenvalue <= RANK_TOLERANCE * total {
                return Err(GoPcaError::InvalidInput(format!(
                    "PC {} explains no variance",
                    pc + 1
                )));
            }
            let vector: Vec<f64> = eigen.eigenvectors.column(idx).iter().copied().collect();
            let mut axis = centered.dot(&Array1::from(vector)) / eigenvalue.sqrt();

            let largest = axis
                .iter()
                .copied()
                .max_by(|a, b| a.abs().total_cmp(&b.abs()))
                .unwrap_or(0.0);
            if largest < 0.0 {
                axis.mapv_inplace(|v| -v);
            }

            loadings.column_mut(pc).assign(&axis);
            explained_variance.push(eigenvalue / denominator);
        }

        debug!(
            "Computed {} PCs, explained variance {:?}",
            n_components, explained_variance
        );
        Ok(Self {
            loadings,
            explained_variance,
        })
    }

    /// Creates `PcaLoadings` from precomputed loadings (genes × components)
    ///
    /// # Errors
    ///
    /// [`GoPcaError::InvalidInput`] if the number of explained variances
    /// differs from the number of components or a value is not finite
    pub fn from_array(loadings: Array2<f64>, explained_variance: Vec<f64>) -> GoPcaResult<Self> {
        if loadings.ncols() != explained_variance.len() {
            return Err(GoPcaError::InvalidInput(format!(
                "{} components, but {} explained variances",
                loadings.ncols(),
                explained_variance.len()
            )));
        }
        if loadings.iter().chain(explained_variance.iter()).any(|v| !v.is_finite()) {
            return Err(GoPcaError::InvalidInput(
                "loadings must be finite".to_string(),
            ));
        }
        Ok(Self {
            loadings,
            explained_variance,
        })
    }

    /// The loadings of the PC with the 0-based index `idx`
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of bounds
    pub fn component(&self, idx: usize) -> ArrayView1<'_, f64> {
        self.loadings.column(idx)
    }

    /// The loading matrix (genes × components)
    pub fn loadings(&self) -> &Array2<f64> {
        &self.loadings
    }

    pub fn explained_variance(&self) -> &[f64] {
        &self.explained_variance
    }

    pub fn n_components(&self) -> usize {
        self.loadings.ncols()
    }

    pub fn n_genes(&self) -> usize {
        self.loadings.nrows()
    }
}
