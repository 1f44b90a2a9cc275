//! Parameters of a GO-PCA run
use serde::{Deserialize, Serialize};

use crate::{GoPcaError, GoPcaResult};

/// All parameters that control signature generation
///
/// The defaults follow the values commonly used for GO-PCA on
/// human or mouse expression data. Call [`GoPcaConfig::validate`]
/// before using a manually assembled config; [`crate::GoPca`] and
/// [`crate::SignatureBuilder`] do this for you.
///
/// # Examples
///
/// ```
/// use gopca::GoPcaConfig;
///
/// let config = GoPcaConfig {
///     n_components: 5,
///     ..GoPcaConfig::default()
/// };
/// assert!(config.validate().is_ok());
///
/// let invalid = GoPcaConfig {
///     escore_pval_thresh: 0.0,
///     ..GoPcaConfig::default()
/// };
/// assert!(invalid.validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoPcaConfig {
    /// Number of principal components to test
    pub n_components: usize,
    /// Maximum XL-mHG p-value of a signature
    pub pval_thresh: f64,
    /// The p-value threshold `psi` used for the E-score
    pub escore_pval_thresh: f64,
    /// Minimum E-score of a signature
    pub escore_thresh: f64,
    /// Terms with fewer annotated genes are not tested
    pub min_term_genes: usize,
    /// Terms with more annotated genes are not tested
    pub max_term_genes: usize,
    /// XL-mHG `X` as a fraction of the annotated genes `K`
    pub mhg_x_frac: f64,
    /// Lower bound of the XL-mHG `X` parameter
    pub mhg_x_min: usize,
    /// XL-mHG `L`: the longest prefix of the ranked list that is tested.
    /// `None` tests the whole list.
    pub mhg_l: Option<usize>,
    /// Maximum Jaccard index between the genes of two accepted signatures
    pub max_overlap: f64,
    /// Signatures must contain at least this many genes
    pub sig_min_genes: usize,
}

impl Default for GoPcaConfig {
    fn default() -> Self {
        Self {
            n_components: 10,
            pval_thresh: 1e-6,
            escore_pval_thresh: 1e-4,
            escore_thresh: 2.0,
            min_term_genes: 5,
            max_term_genes: 1000,
            mhg_x_frac: 0.25,
            mhg_x_min: 5,
            mhg_l: Some(1000),
            max_overlap: 0.5,
            sig_min_genes: 5,
        }
    }
}

impl GoPcaConfig {
    /// Checks that all parameters are within their allowed range
    ///
    /// # Errors
    ///
    /// Returns [`GoPcaError::Configuration`] naming the first offending parameter
    pub fn validate(&self) -> GoPcaResult<()> {
        fn unit_interval(name: &str, value: f64) -> GoPcaResult<()> {
            if value > 0.0 && value <= 1.0 {
                Ok(())
            } else {
                Err(GoPcaError::Configuration(format!(
                    "{name} must be in (0, 1], got {value}"
                )))
            }
        }

        if self.n_components == 0 {
            return Err(GoPcaError::Configuration(
                "n_components must be at least 1".to_string(),
            ));
        }
        unit_interval("pval_thresh", self.pval_thresh)?;
        unit_interval("escore_pval_thresh", self.escore_pval_thresh)?;
        if !self.escore_thresh.is_finite() || self.escore_thresh < 0.0 {
            return Err(GoPcaError::Configuration(format!(
                "escore_thresh must be a non-negative number, got {}",
                self.escore_thresh
            )));
        }
        if !(0.0..=1.0).contains(&self.mhg_x_frac) {
            return Err(GoPcaError::Configuration(format!(
                "mhg_x_frac must be in [0, 1], got {}",
                self.mhg_x_frac
            )));
        }
        if self.mhg_x_min == 0 {
            return Err(GoPcaError::Configuration(
                "mhg_x_min must be at least 1".to_string(),
            ));
        }
        if let Some(l) = self.mhg_l {
            if l == 0 {
                return Err(GoPcaError::Configuration(
                    "mhg_l must be at least 1".to_string(),
                ));
            }
            if self.mhg_x_min > l {
                return Err(GoPcaError::Configuration(format!(
                    "mhg_x_min ({}) must not exceed mhg_l ({l})",
                    self.mhg_x_min
                )));
            }
        }
        if self.min_term_genes == 0 || self.min_term_genes > self.max_term_genes {
            return Err(GoPcaError::Configuration(format!(
                "invalid term size range [{}, {}]",
                self.min_term_genes, self.max_term_genes
            )));
        }
        if !(0.0..=1.0).contains(&self.max_overlap) {
            return Err(GoPcaError::Configuration(format!(
                "max_overlap must be in [0, 1], got {}",
                self.max_overlap
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(GoPcaConfig::default().validate().is_ok());
    }

    #[test]
    fn x_larger_than_l() {
        let config = GoPcaConfig {
            mhg_x_min: 20,
            mhg_l: Some(10),
            ..GoPcaConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(GoPcaError::Configuration(_))
        ));
    }

    #[test]
    fn psi_range() {
        for psi in [0.0, -0.1, 1.5, f64::NAN] {
            let config = GoPcaConfig {
                escore_pval_thresh: psi,
                ..GoPcaConfig::default()
            };
            assert!(config.validate().is_err(), "psi {psi} must be rejected");
        }
        let config = GoPcaConfig {
            escore_pval_thresh: 1.0,
            ..GoPcaConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn term_size_range() {
        let config = GoPcaConfig {
            min_term_genes: 10,
            max_term_genes: 5,
            ..GoPcaConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unlimited_l() {
        let config = GoPcaConfig {
            mhg_l: None,
            mhg_x_min: 5000,
            ..GoPcaConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
