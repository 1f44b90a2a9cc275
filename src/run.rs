//! The GO-PCA pipeline
use std::io::{Read, Write};

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::annotations::GeneAnnotationSet;
use crate::builder::SignatureBuilder;
use crate::config::GoPcaConfig;
use crate::enrichment::EnrichmentResult;
use crate::expression::ExpressionMatrix;
use crate::matrix::{SignatureMatrix, SignatureSummary};
use crate::pca::PcaLoadings;
use crate::signature::Signature;
use crate::{GoPcaError, GoPcaResult};

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Runs GO-PCA on an expression matrix
///
/// ```mermaid
/// flowchart LR
///     X[ExpressionMatrix] --> PCA[PcaLoadings]
///     PCA --> R["RankedGeneList (+pc, -pc)"]
///     A[GeneAnnotationSet] --> T
///     R --> T[EnrichmentTester]
///     T --> B[SignatureBuilder]
///     B --> S[SignatureMatrix]
///     S --> O[MatrixOrderer]
/// ```
///
/// The pipeline computes the first `n_components` PCs, generates the
/// signatures of every PC and summarizes them in a [`SignatureMatrix`].
/// Ordering the matrix for display is left to [`MatrixOrderer`](crate::MatrixOrderer).
#[derive(Debug, Clone, Default)]
pub struct GoPca {
    config: GoPcaConfig,
}

impl GoPca {
    pub fn new(config: GoPcaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GoPcaConfig {
        &self.config
    }

    /// Runs the pipeline
    ///
    /// # Errors
    ///
    /// - [`GoPcaError::Configuration`] if the config is invalid
    /// - [`GoPcaError::Stage`] if PCA fails, e.g. because more PCs are
    ///   requested than the data supports
    pub fn run(
        &self,
        matrix: &ExpressionMatrix,
        annotations: &GeneAnnotationSet,
    ) -> GoPcaResult<GoPcaRun> {
        let builder = SignatureBuilder::new(self.config.clone())?;

        let pca = PcaLoadings::compute(matrix, self.config.n_components)
            .map_err(|err| err.in_stage("pca", format!("{} PCs", self.config.n_components)))?;
        info!(
            "Computed {} PCs of {} genes and {} samples",
            pca.n_components(),
            matrix.n_genes(),
            matrix.n_samples()
        );

        let signatures = builder.build(matrix, annotations, &pca)?;
        info!(
            "Generated {} signatures from {} GO terms",
            signatures.len(),
            annotations.len()
        );

        let sig_matrix = SignatureMatrix::from_signatures(
            signatures,
            matrix.samples().to_vec(),
            SignatureSummary::Mean,
        )?;
        Ok(GoPcaRun {
            config: self.config.clone(),
            explained_variance: pca.explained_variance().to_vec(),
            sig_matrix,
        })
    }
}

/// The result of a GO-PCA run
#[derive(Debug, Clone, PartialEq)]
pub struct GoPcaRun {
    config: GoPcaConfig,
    explained_variance: Vec<f64>,
    sig_matrix: SignatureMatrix,
}

impl GoPcaRun {
    /// The configuration of the run
    pub fn config(&self) -> &GoPcaConfig {
        &self.config
    }

    /// The explained variance of every tested PC
    pub fn explained_variance(&self) -> &[f64] {
        &self.explained_variance
    }

    pub fn signature_matrix(&self) -> &SignatureMatrix {
        &self.sig_matrix
    }

    pub fn signatures(&self) -> &[Signature] {
        self.sig_matrix.signatures()
    }

    /// Serializes the run as JSON
    ///
    /// # Errors
    ///
    /// [`GoPcaError::Json`] if writing fails
    pub fn write_json<W: Write>(&self, writer: W) -> GoPcaResult<()> {
        let record = RunRecord::from(self);
        serde_json::to_writer(writer, &record)?;
        info!(
            "Wrote GO-PCA run with {} signatures",
            self.sig_matrix.len()
        );
        Ok(())
    }

    /// Reads a run that was written by [`GoPcaRun::write_json`]
    ///
    /// All signatures and the signature matrix are validated again.
    ///
    /// # Errors
    ///
    /// - [`GoPcaError::Json`] for malformed JSON
    /// - [`GoPcaError::InvalidInput`] or [`GoPcaError::Configuration`] if
    ///   the content violates an invariant
    pub fn read_json<R: Read>(reader: R) -> GoPcaResult<Self> {
        let record: RunRecord = serde_json::from_reader(reader)?;
        record.try_into()
    }
}

#[derive(Serialize, Deserialize)]
struct SignatureRecord {
    genes: Vec<String>,
    pc: i32,
    enrichment: EnrichmentResult,
    expression: Vec<Vec<f64>>,
}

#[derive(Serialize, Deserialize)]
struct RunRecord {
    config: GoPcaConfig,
    explained_variance: Vec<f64>,
    samples: Vec<String>,
    signatures: Vec<SignatureRecord>,
    values: Vec<Vec<f64>>,
}

fn to_rows(values: ndarray::ArrayView2<'_, f64>) -> Vec<Vec<f64>> {
    values.rows().into_iter().map(|row| row.to_vec()).collect()
}

fn from_rows(rows: Vec<Vec<f64>>, n_cols: usize) -> GoPcaResult<Array2<f64>> {
    let n_rows = rows.len();
    let data: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((n_rows, n_cols), data)
        .map_err(|err| GoPcaError::InvalidInput(format!("malformed matrix: {err}")))
}

impl From<&GoPcaRun> for RunRecord {
    fn from(run: &GoPcaRun) -> Self {
        let matrix = &run.sig_matrix;
        Self {
            config: run.config.clone(),
            explained_variance: run.explained_variance.clone(),
            samples: matrix.samples().to_vec(),
            signatures: matrix
                .signatures()
                .iter()
                .map(|sig| SignatureRecord {
                    genes: sig.genes().to_vec(),
                    pc: sig.pc(),
                    enrichment: sig.enrichment().clone(),
                    expression: to_rows(sig.expression()),
                })
                .collect(),
            values: to_rows(matrix.values()),
        }
    }
}

impl TryFrom<RunRecord> for GoPcaRun {
    type Error = GoPcaError;

    fn try_from(record: RunRecord) -> GoPcaResult<Self> {
        record.config.validate()?;
        let n_samples = record.samples.len();
        let signatures = record
            .signatures
            .into_iter()
            .map(|sig| {
                let x = from_rows(sig.expression, n_samples)?;
                Signature::new(sig.genes, x, sig.pc, sig.enrichment)
            })
            .collect::<GoPcaResult<Vec<Signature>>>()?;
        let values = from_rows(record.values, n_samples)?;
        Ok(Self {
            config: record.config,
            explained_variance: record.explained_variance,
            sig_matrix: SignatureMatrix::new(signatures, record.samples, values)?,
        })
    }
}
