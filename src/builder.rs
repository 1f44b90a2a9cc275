//! Generation of GO-PCA signatures from PC loadings
use std::collections::HashSet;

use rayon::prelude::*;
use tracing::debug;

use crate::annotations::{GeneAnnotationSet, GoTerm};
use crate::config::GoPcaConfig;
use crate::enrichment::{EnrichmentResult, EnrichmentTester};
use crate::expression::ExpressionMatrix;
use crate::f64_from_usize;
use crate::pca::PcaLoadings;
use crate::ranking::RankedGeneList;
use crate::signature::Signature;
use crate::{GoPcaError, GoPcaResult};

/// Tests all GO terms on all PCs and assembles the resulting signatures
///
/// For every PC, the genes are ranked by ascending (`+pc`) and by
/// descending (`-pc`) loadings. Every term with an acceptable number of
/// annotated genes is tested in both lists. Enriched terms become
/// candidate signatures if they pass
///
/// - `pval <= pval_thresh`
/// - `escore >= escore_thresh`
/// - `k >= sig_min_genes`
///
/// The candidates of one PC are sorted by p-value and accepted one by one,
/// unless their genes overlap with an already accepted signature with a
/// Jaccard index of `max_overlap` or more.
///
/// The returned signatures are ordered by PC, then by p-value.
#[derive(Debug, Clone)]
pub struct SignatureBuilder {
    config: GoPcaConfig,
    tester: EnrichmentTester,
}

impl SignatureBuilder {
    /// Constructs a new `SignatureBuilder`
    ///
    /// # Errors
    ///
    /// [`GoPcaError::Configuration`] if the config is invalid
    pub fn new(config: GoPcaConfig) -> GoPcaResult<Self> {
        config.validate()?;
        let tester = EnrichmentTester::from_config(&config);
        Ok(Self { config, tester })
    }

    pub fn config(&self) -> &GoPcaConfig {
        &self.config
    }

    /// Generates the signatures of the first `n_components` PCs
    ///
    /// # Errors
    ///
    /// - [`GoPcaError::InvalidInput`] if `loadings` and `matrix` differ in
    ///   the number of genes or if there are fewer PCs than `n_components`
    /// - [`GoPcaError::Stage`] wrapping the error of a single PC or term
    pub fn build(
        &self,
        matrix: &ExpressionMatrix,
        annotations: &GeneAnnotationSet,
        loadings: &PcaLoadings,
    ) -> GoPcaResult<Vec<Signature>> {
        if loadings.n_genes() != matrix.n_genes() {
            return Err(GoPcaError::InvalidInput(format!(
                "loadings for {} genes, but the expression matrix has {} genes",
                loadings.n_genes(),
                matrix.n_genes()
            )));
        }
        if loadings.n_components() < self.config.n_components {
            return Err(GoPcaError::InvalidInput(format!(
                "{} PCs requested, but only {} are available",
                self.config.n_components,
                loadings.n_components()
            )));
        }

        let resolved = annotations.resolve(matrix);
        let n_terms = resolved.len();
        let size_range = self.config.min_term_genes..=self.config.max_term_genes;
        let terms: Vec<(&GoTerm, Vec<usize>)> = resolved
            .into_iter()
            .filter(|(_, genes)| size_range.contains(&genes.len()))
            .collect();
        debug!(
            "Testing {} of {} terms with {} to {} annotated genes",
            terms.len(),
            n_terms,
            self.config.min_term_genes,
            self.config.max_term_genes
        );

        let mut signatures: Vec<Signature> = Vec::new();
        for pc in 1..=self.config.n_components {
            let component = loadings.component(pc - 1).to_vec();
            let signed_pc: i32 = pc.try_into().map_err(|_| {
                GoPcaError::InvalidInput(format!("PC {pc} exceeds the supported number of PCs"))
            })?;

            let mut candidates = Vec::new();
            for signed in [signed_pc, -signed_pc] {
                let ranked = RankedGeneList::from_loadings(matrix.genes(), &component, signed)
                    .map_err(|err| err.in_stage("ranking", format!("PC {signed}")))?;
                candidates.extend(self.candidates(matrix, &ranked, &terms)?);
            }

            // `sort_by` is stable, ties keep the discovery order
            candidates.sort_by(|a, b| {
                a.enrichment()
                    .ln_pval()
                    .total_cmp(&b.enrichment().ln_pval())
            });

            let n_candidates = candidates.len();
            let before = signatures.len();
            for candidate in candidates {
                let redundant = signatures
                    .iter()
                    .any(|accepted| jaccard(accepted, &candidate) >= self.config.max_overlap);
                if redundant {
                    debug!("{} is redundant", candidate.term_id());
                } else {
                    signatures.push(candidate);
                }
            }
            debug!(
                "PC {}: {} candidates, {} signatures accepted",
                pc,
                n_candidates,
                signatures.len() - before
            );
        }
        Ok(signatures)
    }

    /// Tests all terms in one ranked list and returns the candidate signatures
    /// in discovery order
    fn candidates(
        &self,
        matrix: &ExpressionMatrix,
        ranked: &RankedGeneList,
        terms: &[(&GoTerm, Vec<usize>)],
    ) -> GoPcaResult<Vec<Signature>> {
        let results: Vec<GoPcaResult<Option<EnrichmentResult>>> = terms
            .par_iter()
            .map(|(term, annotated)| match self.tester.test(ranked, term, annotated) {
                Ok(res) => Ok(Some(res)),
                Err(GoPcaError::DegenerateTerm {
                    annotated, universe, ..
                }) => {
                    debug!(
                        "Skipping {}: {} of {} genes annotated",
                        term.id(),
                        annotated,
                        universe
                    );
                    Ok(None)
                }
                Err(err) => Err(err.in_stage(
                    "enrichment",
                    format!("PC {}, term {}", ranked.pc(), term.id()),
                )),
            })
            .collect();

        let mut candidates = Vec::new();
        for ((term, annotated), result) in terms.iter().zip(results) {
            let Some(enr) = result? else {
                continue;
            };
            if !self.passes_filters(&enr) {
                continue;
            }
            let signature = signature(matrix, ranked, annotated, enr).map_err(|err| {
                err.in_stage("signature", format!("PC {}, term {}", ranked.pc(), term.id()))
            })?;
            candidates.push(signature);
        }
        Ok(candidates)
    }

    fn passes_filters(&self, enr: &EnrichmentResult) -> bool {
        enr.pval() <= self.config.pval_thresh
            && enr
                .escore()
                .map_or(false, |escore| escore >= self.config.escore_thresh)
            && enr.k() >= self.config.sig_min_genes
    }
}

/// Creates the signature of the annotated genes above the cutoff `n`
fn signature(
    matrix: &ExpressionMatrix,
    ranked: &RankedGeneList,
    annotated: &[usize],
    enr: EnrichmentResult,
) -> GoPcaResult<Signature> {
    let rows: Vec<usize> = ranked.indices()[..enr.n()]
        .iter()
        .copied()
        .filter(|idx| annotated.binary_search(idx).is_ok())
        .collect();
    let genes = rows.iter().map(|idx| matrix.genes()[*idx].clone()).collect();
    Signature::new(genes, matrix.select_rows(&rows), ranked.pc(), enr)
}

/// The Jaccard index of the gene sets of two signatures
fn jaccard(a: &Signature, b: &Signature) -> f64 {
    let genes_a: HashSet<&str> = a.genes().iter().map(String::as_str).collect();
    let genes_b: HashSet<&str> = b.genes().iter().map(String::as_str).collect();
    let union = genes_a.union(&genes_b).count();
    if union == 0 {
        return 0.0;
    }
    f64_from_usize(genes_a.intersection(&genes_b).count()) / f64_from_usize(union)
}
