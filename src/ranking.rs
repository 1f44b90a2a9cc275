//! Ranking of genes by their loading on a principal component
use crate::{GoPcaError, GoPcaResult};

/// The genes of the universe, ordered by their loading on one PC
///
/// The sign of [`RankedGeneList::pc`] encodes the direction of the ranking:
/// positive values rank by ascending loadings, negative values by
/// descending loadings. Genes with equal loadings keep their original order.
///
/// # Examples
///
/// ```
/// use gopca::RankedGeneList;
///
/// let genes = vec!["g1".to_string(), "g2".to_string(), "g3".to_string()];
/// let loadings = [0.1, 0.9, 0.5];
///
/// let ascending = RankedGeneList::from_loadings(&genes, &loadings, 1).unwrap();
/// assert_eq!(ascending.iter().collect::<Vec<&str>>(), vec!["g1", "g3", "g2"]);
///
/// let descending = RankedGeneList::from_loadings(&genes, &loadings, -1).unwrap();
/// assert_eq!(descending.iter().collect::<Vec<&str>>(), vec!["g2", "g3", "g1"]);
/// ```
#[derive(Debug, Clone)]
pub struct RankedGeneList<'a> {
    genes: &'a [String],
    order: Vec<usize>,
    ranks: Vec<usize>,
    pc: i32,
}

impl<'a> RankedGeneList<'a> {
    /// Ranks `genes` by `loadings`
    ///
    /// # Errors
    ///
    /// [`GoPcaError::InvalidInput`] if the number of loadings does not match
    /// the number of genes, a loading is not finite or `pc` is `0`
    pub fn from_loadings(genes: &'a [String], loadings: &[f64], pc: i32) -> GoPcaResult<Self> {
        if loadings.len() != genes.len() {
            return Err(GoPcaError::InvalidInput(format!(
                "PC {pc} has {} loadings for {} genes",
                loadings.len(),
                genes.len()
            )));
        }
        if pc == 0 {
            return Err(GoPcaError::InvalidInput(
                "PCs are numbered starting with 1".to_string(),
            ));
        }
        if loadings.iter().any(|v| !v.is_finite()) {
            return Err(GoPcaError::InvalidInput(format!(
                "PC {pc} contains non-finite loadings"
            )));
        }

        let mut order: Vec<usize> = (0..genes.len()).collect();
        // `sort_by` is stable, so ties keep the order of the gene universe
        if pc > 0 {
            order.sort_by(|a, b| loadings[*a].total_cmp(&loadings[*b]));
        } else {
            order.sort_by(|a, b| loadings[*b].total_cmp(&loadings[*a]));
        }

        let mut ranks = vec![0usize; order.len()];
        for (rank, idx) in order.iter().enumerate() {
            ranks[*idx] = rank;
        }

        Ok(Self {
            genes,
            order,
            ranks,
            pc,
        })
    }

    /// The signed PC (starting at 1) that this ranking was derived from
    pub fn pc(&self) -> i32 {
        self.pc
    }

    /// Returns `true` if genes are ranked by ascending loadings
    pub fn is_ascending(&self) -> bool {
        self.pc > 0
    }

    /// The number of ranked genes `N`
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterates the gene ids in rank order
    pub fn iter(&self) -> impl Iterator<Item = &'a str> + '_ {
        let genes = self.genes;
        self.order.iter().map(move |idx| genes[*idx].as_str())
    }

    /// The row indices of the genes, in rank order
    pub fn indices(&self) -> &[usize] {
        &self.order
    }

    /// The row index of the gene at the (0-based) `rank`
    pub fn index_at(&self, rank: usize) -> Option<usize> {
        self.order.get(rank).copied()
    }

    /// The (0-based) rank of the gene with row index `idx`
    pub fn rank_of(&self, idx: usize) -> Option<usize> {
        self.ranks.get(idx).copied()
    }

    /// Marks the ranks of the annotated genes
    ///
    /// Returns a vector of length `N` that is `true` at every rank that
    /// holds one of the `annotated` genes.
    ///
    /// # Errors
    ///
    /// [`GoPcaError::InvalidInput`] if an index is outside of the gene universe
    pub fn hits(&self, annotated: &[usize]) -> GoPcaResult<Vec<bool>> {
        let mut hits = vec![false; self.len()];
        for idx in annotated {
            let rank = self.rank_of(*idx).ok_or_else(|| {
                GoPcaError::InvalidInput(format!(
                    "gene index {idx} is outside of the {} ranked genes",
                    self.len()
                ))
            })?;
            hits[rank] = true;
        }
        Ok(hits)
    }
}
