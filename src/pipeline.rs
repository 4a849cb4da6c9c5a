//! The match operation: validate, flatten, vectorise, score, then match,
//! cluster and crosswalk on the polarity-adjusted matrix.
//!
//! Every call allocates its own matrices and holds no state between runs.
//! The only slow step is the vectoriser call, which receives all texts in
//! one batch.

use serde::{Deserialize, Serialize};

use crate::assemble::{MatchResult, ResultAssembler};
use crate::cluster::{cluster, ClusterMethod};
use crate::errors::{MatchError, ValidationError};
use crate::matcher::{
    crosswalk, find_matches, find_query_matches, CrosswalkOptions, MatchOptions, DEFAULT_MIN_SCORE,
    DEFAULT_TOP_K,
};
use crate::model::{flatten, Instrument, Item, MatchedPair};
use crate::similarity::{compute_similarity, SimilarityMatrices};
use crate::validation::{validate_instruments, validate_query, validate_request};
use crate::vectoriser::{vectorise_checked, Vectoriser};

/// Name given to the synthetic instrument holding a query.
pub const QUERY_INSTRUMENT_NAME: &str = "query";

/// Options for one match run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchRequest {
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_min_score")]
    pub min_score: f32,

    /// Multiply scores by both items' polarities.
    #[serde(default)]
    pub negate_polarity: bool,

    /// Keep both directions of each pair instead of the canonical one.
    #[serde(default)]
    pub directional: bool,

    #[serde(default)]
    pub cluster: Option<ClusterMethod>,

    #[serde(default)]
    pub crosswalk: Option<CrosswalkOptions>,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_min_score() -> f32 {
    DEFAULT_MIN_SCORE
}

impl Default for MatchRequest {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            min_score: DEFAULT_MIN_SCORE,
            negate_polarity: false,
            directional: false,
            cluster: None,
            crosswalk: None,
        }
    }
}

impl MatchRequest {
    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            top_k: self.top_k,
            min_score: self.min_score,
            directional: self.directional,
        }
    }
}

/// Match every item against the items of every other instrument.
pub fn match_instruments(
    instruments: &[Instrument],
    request: &MatchRequest,
    vectoriser: &dyn Vectoriser,
) -> Result<MatchResult, MatchError> {
    validate_request(request)?;
    validate_instruments(instruments)?;

    let items = flatten(instruments);
    log::info!(
        "matching {} items from {} instruments",
        items.len(),
        instruments.len()
    );

    if items.is_empty() {
        return Ok(MatchResult::empty(
            instruments.len(),
            request.cluster.is_some(),
            request.crosswalk.is_some(),
        ));
    }

    let matrices = score(&items, request, vectoriser)?;
    let pairs = find_matches(&matrices.adjusted, &items, &request.match_options())?;

    finish(instruments.len(), items, matrices, pairs, request)
}

/// Match one ad hoc query against every item of `instruments`.
///
/// The query becomes the only item of a synthetic instrument whose id is
/// below every real id and below zero. It sits at position 0 of the result,
/// and every pair is emitted query first. The synthetic instrument counts as
/// an instrument in the statistics and shows up in `instrument_similarity`,
/// clusters and crosswalk like any other.
pub fn match_query(
    instruments: &[Instrument],
    query: &str,
    request: &MatchRequest,
    vectoriser: &dyn Vectoriser,
) -> Result<MatchResult, MatchError> {
    validate_request(request)?;
    validate_query(query)?;
    validate_instruments(instruments)?;

    let query_id = query_instrument_id(instruments)?;
    let mut all = Vec::with_capacity(instruments.len() + 1);
    all.push(Instrument::new(query_id, QUERY_INSTRUMENT_NAME).with_item(query));
    all.extend(instruments.iter().cloned());

    let items = flatten(&all);
    log::info!(
        "matching query against {} items from {} instruments",
        items.len() - 1,
        instruments.len()
    );

    let matrices = score(&items, request, vectoriser)?;
    let pairs = find_query_matches(&matrices.adjusted, &items, 0, &request.match_options())?;

    finish(all.len(), items, matrices, pairs, request)
}

/// `min(lowest id, 0) - 1`.
fn query_instrument_id(instruments: &[Instrument]) -> Result<i64, ValidationError> {
    let lowest = instruments.iter().map(|i| i.id).min().unwrap_or(0).min(0);
    lowest
        .checked_sub(1)
        .ok_or(ValidationError::InstrumentIdOutOfRange(lowest))
}

fn score(
    items: &[Item],
    request: &MatchRequest,
    vectoriser: &dyn Vectoriser,
) -> Result<SimilarityMatrices, MatchError> {
    let texts: Vec<String> = items.iter().map(|item| item.text.clone()).collect();
    let vectors = vectorise_checked(vectoriser, &texts)?;

    let polarities: Option<Vec<f32>> = request
        .negate_polarity
        .then(|| items.iter().map(|item| item.polarity).collect());

    Ok(compute_similarity(&vectors, polarities.as_deref())?)
}

fn finish(
    instrument_count: usize,
    items: Vec<Item>,
    matrices: SimilarityMatrices,
    pairs: Vec<MatchedPair>,
    request: &MatchRequest,
) -> Result<MatchResult, MatchError> {
    let clusters = request
        .cluster
        .as_ref()
        .map(|method| cluster(&matrices.adjusted, &items, method))
        .transpose()?;

    let rows = request
        .crosswalk
        .as_ref()
        .map(|options| crosswalk(&matrices.adjusted, &items, options))
        .transpose()?;

    log::info!(
        "found {} matched pairs{}",
        pairs.len(),
        clusters
            .as_ref()
            .map(|c| format!(", {} clusters", c.len()))
            .unwrap_or_default()
    );

    Ok(ResultAssembler::new(instrument_count, items, matrices)
        .pairs(pairs)
        .clusters(clusters)
        .crosswalk(rows)
        .build())
}
