//! Packages the outputs of one match run into a single [`MatchResult`].

use serde::{Deserialize, Serialize};

use crate::matcher::CrosswalkRow;
use crate::model::{Cluster, Item, ItemKey, MatchedPair};
use crate::report::{instrument_similarity, InstrumentSimilarity, MatchStatistics};
use crate::similarity::{SimilarityMatrices, SimilarityMatrix};

/// Everything a caller needs to map scores back to the original text.
///
/// `items[p]` describes row/column `p` of both matrices, and pairs and
/// clusters refer to items by [`ItemKey`] and by position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub items: Vec<Item>,
    pub raw_matrix: SimilarityMatrix,
    pub adjusted_matrix: SimilarityMatrix,
    pub matched_pairs: Vec<MatchedPair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clusters: Option<Vec<Cluster>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crosswalk: Option<Vec<CrosswalkRow>>,
    pub instrument_similarity: Vec<InstrumentSimilarity>,
    pub statistics: MatchStatistics,
}

impl MatchResult {
    /// Result for a run with no items. Requested sections are present but empty.
    pub fn empty(instrument_count: usize, with_clusters: bool, with_crosswalk: bool) -> Self {
        ResultAssembler::new(instrument_count, vec![], SimilarityMatrices::default())
            .clusters(with_clusters.then(Vec::new))
            .crosswalk(with_crosswalk.then(Vec::new))
            .build()
    }

    pub fn item(&self, key: &ItemKey) -> Option<&Item> {
        self.items.iter().find(|item| item.key() == *key)
    }
}

pub struct ResultAssembler {
    instrument_count: usize,
    items: Vec<Item>,
    matrices: SimilarityMatrices,
    pairs: Vec<MatchedPair>,
    clusters: Option<Vec<Cluster>>,
    crosswalk: Option<Vec<CrosswalkRow>>,
}

impl ResultAssembler {
    pub fn new(instrument_count: usize, items: Vec<Item>, matrices: SimilarityMatrices) -> Self {
        Self {
            instrument_count,
            items,
            matrices,
            pairs: vec![],
            clusters: None,
            crosswalk: None,
        }
    }

    pub fn pairs(mut self, pairs: Vec<MatchedPair>) -> Self {
        self.pairs = pairs;
        self
    }

    pub fn clusters(mut self, clusters: Option<Vec<Cluster>>) -> Self {
        self.clusters = clusters;
        self
    }

    pub fn crosswalk(mut self, crosswalk: Option<Vec<CrosswalkRow>>) -> Self {
        self.crosswalk = crosswalk;
        self
    }

    pub fn build(self) -> MatchResult {
        let statistics = MatchStatistics::compute(self.instrument_count, &self.items, &self.pairs);
        let instrument_similarity = instrument_similarity(&self.matrices.adjusted, &self.items);

        MatchResult {
            items: self.items,
            raw_matrix: self.matrices.raw,
            adjusted_matrix: self.matrices.adjusted,
            matched_pairs: self.pairs,
            clusters: self.clusters,
            crosswalk: self.crosswalk,
            instrument_similarity,
            statistics,
        }
    }
}
