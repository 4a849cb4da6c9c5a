//! Summaries derived from a finished match run.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::{Item, MatchedPair};
use crate::similarity::SimilarityMatrix;

/// How closely two instruments cover the same content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSimilarity {
    pub first: i64,
    pub second: i64,
    pub score: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchStatistics {
    pub instrument_count: usize,
    pub item_count: usize,
    pub matched_pairs: usize,
    /// Matched pairs with a score above zero.
    pub positive_matches: usize,
    pub mean_score: Option<f32>,
    /// Items taking part in at least one matched pair.
    pub matched_items: usize,
}

impl MatchStatistics {
    pub fn compute(instrument_count: usize, items: &[Item], pairs: &[MatchedPair]) -> Self {
        let matched_items: BTreeSet<usize> = pairs
            .iter()
            .flat_map(|p| [p.source_position, p.target_position])
            .collect();

        let mean_score = if pairs.is_empty() {
            None
        } else {
            let total: f64 = pairs.iter().map(|p| p.score as f64).sum();
            Some((total / pairs.len() as f64) as f32)
        };

        Self {
            instrument_count,
            item_count: items.len(),
            matched_pairs: pairs.len(),
            positive_matches: pairs.iter().filter(|p| p.score > 0.0).count(),
            mean_score,
            matched_items: matched_items.len(),
        }
    }
}

/// Score every pair of instruments that have items, lower id first.
///
/// Each direction takes the mean, over the items of one instrument, of their
/// best score against the other; the two directions are then averaged.
pub fn instrument_similarity(
    matrix: &SimilarityMatrix,
    items: &[Item],
) -> Vec<InstrumentSimilarity> {
    let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for item in items {
        groups.entry(item.instrument_id).or_default().push(item.position);
    }

    let groups: Vec<(i64, Vec<usize>)> = groups.into_iter().collect();
    let mut out = Vec::new();
    for (n, (first, a)) in groups.iter().enumerate() {
        for (second, b) in &groups[n + 1..] {
            let forward = mean_best(matrix, a, b);
            let backward = mean_best(matrix, b, a);
            out.push(InstrumentSimilarity {
                first: *first,
                second: *second,
                score: ((forward + backward) / 2.0) as f32,
            });
        }
    }
    out
}

fn mean_best(matrix: &SimilarityMatrix, from: &[usize], to: &[usize]) -> f64 {
    let total: f64 = from
        .iter()
        .map(|&i| {
            to.iter()
                .map(|&j| matrix.get(i, j))
                .fold(f32::NEG_INFINITY, f32::max) as f64
        })
        .sum();
    total / from.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{flatten, Instrument, ItemKey};

    fn key(instrument_id: i64, index: usize) -> ItemKey {
        ItemKey { instrument_id, index }
    }

    #[test]
    fn test_instrument_similarity_is_symmetrised() {
        let items = flatten(&[
            Instrument::new(2, "B").with_item("b0"),
            Instrument::new(1, "A").with_items(["a0", "a1"]),
        ]);
        // positions: 0 = B/0, 1 = A/0, 2 = A/1
        let matrix = SimilarityMatrix::from_rows(vec![
            vec![1.0, 0.8, 0.2],
            vec![0.8, 1.0, 0.0],
            vec![0.2, 0.0, 1.0],
        ])
        .unwrap();

        let scores = instrument_similarity(&matrix, &items);

        // A -> B: (0.8 + 0.2) / 2 = 0.5; B -> A: 0.8
        assert_eq!(scores.len(), 1);
        assert_eq!((scores[0].first, scores[0].second), (1, 2));
        assert!((scores[0].score - 0.65).abs() < 1e-6);
    }

    #[test]
    fn test_single_instrument_has_no_scores() {
        let items = flatten(&[Instrument::new(1, "A").with_items(["a0", "a1"])]);
        let matrix = SimilarityMatrix::from_rows(vec![vec![1.0, 0.3], vec![0.3, 1.0]]).unwrap();
        assert!(instrument_similarity(&matrix, &items).is_empty());
    }

    #[test]
    fn test_statistics() {
        let items = flatten(&[
            Instrument::new(1, "A").with_items(["a0", "a1"]),
            Instrument::new(2, "B").with_item("b0"),
            Instrument::new(3, "Empty"),
        ]);
        let pairs = vec![
            MatchedPair {
                source: key(1, 0),
                target: key(2, 0),
                source_position: 0,
                target_position: 2,
                score: 0.9,
            },
            MatchedPair {
                source: key(1, 1),
                target: key(2, 0),
                source_position: 1,
                target_position: 2,
                score: -0.3,
            },
        ];

        let stats = MatchStatistics::compute(3, &items, &pairs);

        assert_eq!(stats.instrument_count, 3);
        assert_eq!(stats.item_count, 3);
        assert_eq!(stats.matched_pairs, 2);
        assert_eq!(stats.positive_matches, 1);
        assert_eq!(stats.matched_items, 3);
        assert!((stats.mean_score.unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_statistics_without_pairs() {
        let stats = MatchStatistics::compute(0, &[], &[]);
        assert_eq!(stats, MatchStatistics::default());
    }
}
