//! GO terms and the genes annotated with them
//!
//! A [`GeneAnnotationSet`] maps each [`GoTerm`] to the set of genes that
//! are annotated with it. The annotation set is static per run and
//! shared read-only by all enrichment tests.
use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::expression::ExpressionMatrix;
use crate::{GoPcaError, GoPcaResult};

/// A single GO term: identifier, name and domain (namespace)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GoTerm {
    id: String,
    name: String,
    domain: String,
}

impl GoTerm {
    /// Constructs a new `GoTerm`
    ///
    /// ```
    /// use gopca::GoTerm;
    ///
    /// let term = GoTerm::new("GO:0006955", "immune response", "BP");
    /// assert_eq!(term.to_string(), "GO:0006955 (immune response)");
    /// ```
    pub fn new(id: &str, name: &str, domain: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            domain: domain.to_string(),
        }
    }

    /// The term identifier, e.g. `GO:0006955`
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The GO domain, e.g. `BP`, `MF` or `CC`
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl Display for GoTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.id, self.name)
    }
}

/// Mapping of GO terms to their annotated genes
///
/// Terms keep their insertion order, which is the order in which
/// [`crate::SignatureBuilder`] tests them.
///
/// # Examples
///
/// ```
/// use gopca::{GeneAnnotationSet, GoTerm};
///
/// let mut annotations = GeneAnnotationSet::new();
/// annotations.add_term(GoTerm::new("GO:1", "foo", "BP"), ["A", "B", "B"]).unwrap();
/// annotations.add_term(GoTerm::new("GO:2", "bar", "MF"), ["C"]).unwrap();
///
/// assert_eq!(annotations.len(), 2);
/// assert_eq!(annotations.genes("GO:1").unwrap().len(), 2);
/// assert!(annotations.add_term(GoTerm::new("GO:1", "dup", "BP"), ["A"]).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct GeneAnnotationSet {
    terms: Vec<GoTerm>,
    genes: Vec<BTreeSet<String>>,
    index: HashMap<String, usize>,
}

impl GeneAnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a term and its annotated genes
    ///
    /// Genes are de-duplicated.
    ///
    /// # Errors
    ///
    /// [`GoPcaError::InvalidInput`] if a term with the same id already exists
    pub fn add_term<I, S>(&mut self, term: GoTerm, genes: I) -> GoPcaResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.index.contains_key(term.id()) {
            return Err(GoPcaError::InvalidInput(format!(
                "duplicate GO term {}",
                term.id()
            )));
        }
        self.index.insert(term.id().to_string(), self.terms.len());
        self.terms.push(term);
        self.genes.push(genes.into_iter().map(Into::into).collect());
        Ok(())
    }

    /// Number of terms
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Returns the term with the given id
    pub fn term(&self, id: &str) -> Option<&GoTerm> {
        self.index.get(id).map(|idx| &self.terms[*idx])
    }

    /// Returns the genes that are annotated with the term
    pub fn genes(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.index.get(id).map(|idx| &self.genes[*idx])
    }

    /// Iterates all terms and their genes in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&GoTerm, &BTreeSet<String>)> {
        self.terms.iter().zip(self.genes.iter())
    }

    /// Resolves the annotated genes of every term to row indices of the
    /// expression matrix
    ///
    /// Genes that are not part of the matrix are dropped, so the length of
    /// each index list is the `K` of the term within the gene universe.
    /// Terms without any known gene are kept with an empty list.
    pub(crate) fn resolve<'a>(
        &'a self,
        matrix: &ExpressionMatrix,
    ) -> Vec<(&'a GoTerm, Vec<usize>)> {
        let mut missing = 0usize;
        let mut any_present = false;
        let resolved: Vec<(&GoTerm, Vec<usize>)> = self
            .iter()
            .map(|(term, genes)| {
                let mut indices: Vec<usize> = genes
                    .iter()
                    .filter_map(|gene| {
                        let idx = matrix.gene_index(gene);
                        if idx.is_none() {
                            missing += 1;
                        }
                        idx
                    })
                    .collect();
                indices.sort_unstable();
                any_present |= !indices.is_empty();
                (term, indices)
            })
            .collect();

        if !self.is_empty() && !any_present {
            warn!("None of the annotated genes is part of the expression matrix");
        } else if missing > 0 {
            warn!(
                "{} gene annotations refer to genes outside of the expression matrix",
                missing
            );
        }
        resolved
    }
}
