//! Cross-instrument matching over a similarity matrix.
//!
//! - `find_matches`: top-k candidates per item, never within the same instrument
//! - `find_query_matches`: one synthetic query item against the whole corpus
//! - `crosswalk`: one-to-one mapping built greedily from the best pairs

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;
use crate::model::{Item, ItemKey, MatchedPair};
use crate::similarity::SimilarityMatrix;

/// Default number of candidates kept per item.
pub const DEFAULT_TOP_K: usize = 1;
/// Default lower bound on match scores (accepts everything).
pub const DEFAULT_MIN_SCORE: f32 = -1.0;
/// Default crosswalk threshold.
pub const DEFAULT_CROSSWALK_THRESHOLD: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchOptions {
    pub top_k: usize,
    pub min_score: f32,
    /// Emit every (source, target) pair as found instead of one canonical pair.
    pub directional: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            min_score: DEFAULT_MIN_SCORE,
            directional: false,
        }
    }
}

fn default_crosswalk_threshold() -> f32 {
    DEFAULT_CROSSWALK_THRESHOLD
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrosswalkOptions {
    #[serde(default = "default_crosswalk_threshold")]
    pub threshold: f32,

    #[serde(default)]
    pub allow_within_instrument: bool,
}

impl Default for CrosswalkOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CROSSWALK_THRESHOLD,
            allow_within_instrument: false,
        }
    }
}

/// One row of a crosswalk table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrosswalkRow {
    pub pair_id: usize,
    pub source: ItemKey,
    pub target: ItemKey,
    pub source_text: String,
    pub target_text: String,
    pub score: f32,
}

/// Rank cross-instrument matches for every item.
///
/// Each item keeps up to `top_k` candidates from other instruments whose score
/// is at least `min_score`; ties go to the lower target key. Unless
/// `directional` is set, `(a, b)` and `(b, a)` collapse into one pair with the
/// lower instrument id first. Output is sorted by descending score, then by
/// source and target key.
pub fn find_matches(
    matrix: &SimilarityMatrix,
    items: &[Item],
    options: &MatchOptions,
) -> Result<Vec<MatchedPair>, ValidationError> {
    check_inputs(matrix, items, options)?;

    let mut pairs = Vec::new();
    for source in 0..items.len() {
        pairs.extend(best_candidates(matrix, items, source, options));
    }

    if !options.directional {
        pairs = canonicalize(pairs);
    }

    sort_pairs(&mut pairs);
    Ok(pairs)
}

/// Match a single query item (at `query_position`) against every other item.
///
/// The query belongs to its own synthetic instrument, so it can match any real
/// item but never itself. Pairs are always emitted query first.
pub fn find_query_matches(
    matrix: &SimilarityMatrix,
    items: &[Item],
    query_position: usize,
    options: &MatchOptions,
) -> Result<Vec<MatchedPair>, ValidationError> {
    check_inputs(matrix, items, options)?;
    if query_position >= items.len() {
        return Err(ValidationError::MatrixSize {
            expected: query_position + 1,
            got: items.len(),
        });
    }

    let mut pairs = best_candidates(matrix, items, query_position, options);
    sort_pairs(&mut pairs);
    Ok(pairs)
}

/// Build a one-to-one crosswalk: pairs with a positive score at or above the
/// threshold are taken best-first, and an item already used is skipped.
pub fn crosswalk(
    matrix: &SimilarityMatrix,
    items: &[Item],
    options: &CrosswalkOptions,
) -> Result<Vec<CrosswalkRow>, ValidationError> {
    if matrix.len() != items.len() {
        return Err(ValidationError::MatrixSize {
            expected: items.len(),
            got: matrix.len(),
        });
    }

    let mut candidates = Vec::new();
    for i in 0..items.len() {
        for j in (i + 1)..items.len() {
            let (a, b) = ordered(&items[i], &items[j]);
            if a.instrument_id == b.instrument_id && !options.allow_within_instrument {
                continue;
            }
            let score = matrix.get(i, j);
            if score > 0.0 && score >= options.threshold {
                candidates.push((score, a, b));
            }
        }
    }

    candidates.sort_by(|x, y| {
        y.0.total_cmp(&x.0)
            .then_with(|| x.1.key().cmp(&y.1.key()))
            .then_with(|| x.2.key().cmp(&y.2.key()))
    });

    let mut used = BTreeSet::new();
    let mut rows = Vec::new();
    for (score, a, b) in candidates {
        if used.contains(&a.position) || used.contains(&b.position) {
            continue;
        }
        used.insert(a.position);
        used.insert(b.position);
        rows.push(CrosswalkRow {
            pair_id: rows.len(),
            source: a.key(),
            target: b.key(),
            source_text: a.text.clone(),
            target_text: b.text.clone(),
            score,
        });
    }

    Ok(rows)
}

fn check_inputs(
    matrix: &SimilarityMatrix,
    items: &[Item],
    options: &MatchOptions,
) -> Result<(), ValidationError> {
    if options.top_k == 0 {
        return Err(ValidationError::NonPositiveTopK);
    }
    if matrix.len() != items.len() {
        return Err(ValidationError::MatrixSize {
            expected: items.len(),
            got: matrix.len(),
        });
    }
    Ok(())
}

fn best_candidates(
    matrix: &SimilarityMatrix,
    items: &[Item],
    source: usize,
    options: &MatchOptions,
) -> Vec<MatchedPair> {
    let source_item = &items[source];
    let row = matrix.row(source);

    let mut candidates: Vec<(usize, f32)> = items
        .iter()
        .enumerate()
        .filter(|(_, target)| target.instrument_id != source_item.instrument_id)
        .map(|(target, _)| (target, row[target]))
        .filter(|(_, score)| *score >= options.min_score)
        .collect();

    candidates.sort_by(|a, b| {
        b.1.total_cmp(&a.1)
            .then_with(|| items[a.0].key().cmp(&items[b.0].key()))
    });
    candidates.truncate(options.top_k);

    candidates
        .into_iter()
        .map(|(target, score)| MatchedPair {
            source: source_item.key(),
            target: items[target].key(),
            source_position: source,
            target_position: target,
            score,
        })
        .collect()
}

/// Flip every pair to lower-instrument-first and drop the duplicates.
fn canonicalize(pairs: Vec<MatchedPair>) -> Vec<MatchedPair> {
    let mut seen = BTreeSet::new();
    pairs
        .into_iter()
        .map(|pair| {
            if pair.source > pair.target {
                MatchedPair {
                    source: pair.target,
                    target: pair.source,
                    source_position: pair.target_position,
                    target_position: pair.source_position,
                    score: pair.score,
                }
            } else {
                pair
            }
        })
        .filter(|pair| seen.insert((pair.source_position, pair.target_position)))
        .collect()
}

fn sort_pairs(pairs: &mut [MatchedPair]) {
    pairs.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.source.cmp(&b.source))
            .then_with(|| a.target.cmp(&b.target))
    });
}

fn ordered<'a>(a: &'a Item, b: &'a Item) -> (&'a Item, &'a Item) {
    match a.key().cmp(&b.key()) {
        Ordering::Greater => (b, a),
        _ => (a, b),
    }
}
