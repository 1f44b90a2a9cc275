//! GO-PCA combines principal component analysis of a gene expression matrix
//! with GO term enrichment testing to find gene *signatures*: small sets of
//! genes that are annotated with a common GO term and co-vary along a shared
//! principal component.
//!
//! The main entry point is [`GoPca`], which runs the full pipeline and
//! returns a [`GoPcaRun`]. The individual stages are public as well:
//!
//! - [`RankedGeneList`] orders the genes by their loading on one PC
//! - [`EnrichmentTester`] runs the XL-mHG test for one GO term
//! - [`SignatureBuilder`] tests all terms on all PCs and assembles [`Signature`]s
//! - [`SignatureMatrix`] summarizes the signatures per sample
//! - [`MatrixOrderer`] clusters the signature matrix for display and export
//!
//! # Examples
//!
//! ```
//! use gopca::{ExpressionMatrix, GeneAnnotationSet, GoPca, GoPcaConfig, GoTerm};
//! use ndarray::array;
//!
//! let genes: Vec<String> = (1..=6).map(|i| format!("g{i}")).collect();
//! let samples: Vec<String> = (1..=4).map(|i| format!("s{i}")).collect();
//! let matrix = ExpressionMatrix::new(
//!     genes,
//!     samples,
//!     array![
//!         [1.0, 2.0, 3.0, 4.0],
//!         [2.0, 4.1, 6.0, 8.2],
//!         [1.1, 2.0, 2.9, 4.2],
//!         [0.5, 0.4, 0.6, 0.5],
//!         [0.3, 0.2, 0.1, 0.4],
//!         [0.2, 0.3, 0.3, 0.1],
//!     ],
//! ).unwrap();
//!
//! let mut annotations = GeneAnnotationSet::new();
//! annotations.add_term(GoTerm::new("GO:0000001", "cell growth", "BP"), ["g1", "g2", "g3"]).unwrap();
//!
//! let config = GoPcaConfig {
//!     n_components: 1,
//!     pval_thresh: 1.0,
//!     escore_pval_thresh: 1.0,
//!     escore_thresh: 0.0,
//!     min_term_genes: 1,
//!     mhg_x_frac: 0.0,
//!     mhg_x_min: 1,
//!     mhg_l: None,
//!     sig_min_genes: 1,
//!     ..GoPcaConfig::default()
//! };
//!
//! let run = GoPca::new(config).run(&matrix, &annotations).unwrap();
//! assert_eq!(run.signature_matrix().samples().len(), 4);
//! ```
use std::num::ParseFloatError;

use thiserror::Error;

pub mod annotations;
pub mod builder;
pub mod config;
pub mod enrichment;
pub mod expression;
pub mod matrix;
pub mod parser;
pub mod pca;
pub mod ranking;
pub mod run;
pub mod signature;
pub mod stats;
pub mod utils;

pub use annotations::{GeneAnnotationSet, GoTerm};
pub use builder::SignatureBuilder;
pub use config::GoPcaConfig;
pub use enrichment::{EnrichmentResult, EnrichmentTester};
pub use expression::ExpressionMatrix;
pub use matrix::{DistanceMetric, MatrixOrderer, SignatureMatrix, SignatureSummary};
pub use pca::PcaLoadings;
pub use ranking::RankedGeneList;
pub use run::{GoPca, GoPcaRun};
pub use signature::{LabelOptions, Signature};

/// Errors raised by the GO-PCA pipeline
#[derive(Error, Debug)]
pub enum GoPcaError {
    /// Malformed input or inputs with mismatched dimensions
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The term annotates no gene or every gene of the universe
    #[error("term {term} is degenerate: {annotated} of {universe} genes are annotated")]
    DegenerateTerm {
        term: String,
        annotated: usize,
        universe: usize,
    },
    /// Out-of-range configuration parameters
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// An error that occured while processing a specific PC or term
    #[error("{stage} failed for {key}: {source}")]
    Stage {
        stage: &'static str,
        key: String,
        #[source]
        source: Box<GoPcaError>,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("unable to parse number: {0}")]
    ParseFloat(#[from] ParseFloatError),
}

impl GoPcaError {
    /// Wraps the error with the pipeline stage and the key (PC, term) that failed
    pub fn in_stage(self, stage: &'static str, key: impl Into<String>) -> Self {
        GoPcaError::Stage {
            stage,
            key: key.into(),
            source: Box::new(self),
        }
    }
}

/// Shortcut for `Result<T, GoPcaError>`
pub type GoPcaResult<T> = Result<T, GoPcaError>;

/// We frequently need to divide counts and return f64 values.
/// To ensure some kind of safety we use this method to panic
/// in case of overflows.
pub(crate) fn f64_from_usize(n: usize) -> f64 {
    let intermediate: u32 = n
        .try_into()
        .expect("cannot safely create f64 from large usize");
    intermediate.into()
}
