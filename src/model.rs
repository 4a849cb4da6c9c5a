//! Core data model: instruments, flattened items, pairs and clusters.
//!
//! Callers hand in [`Instrument`]s made of [`ItemInput`]s. The pipeline
//! flattens them into [`Item`]s that carry their provenance and their row
//! in the similarity matrices, so every score can be mapped back to text.

use serde::{Deserialize, Serialize};

/// A fixed-length embedding produced by a vectoriser.
pub type EmbeddingVector = Vec<f32>;

const POSITIVE_POLARITY: f32 = 1.0;

fn default_polarity() -> f32 {
    POSITIVE_POLARITY
}

/// A single text unit as supplied by the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemInput {
    pub text: String,

    /// `1.0` for regular items, `-1.0` for reverse-scored ones.
    #[serde(default = "default_polarity")]
    pub polarity: f32,
}

impl ItemInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            polarity: POSITIVE_POLARITY,
        }
    }

    pub fn reversed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            polarity: -POSITIVE_POLARITY,
        }
    }
}

impl From<&str> for ItemInput {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for ItemInput {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// A named, ordered collection of items (e.g. a questionnaire).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: i64,
    pub name: String,

    /// ISO language code, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default)]
    pub items: Vec<ItemInput>,
}

impl Instrument {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            language: None,
            items: vec![],
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_item(mut self, item: impl Into<ItemInput>) -> Self {
        self.items.push(item.into());
        self
    }

    pub fn with_items<I, T>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ItemInput>,
    {
        self.items.extend(items.into_iter().map(Into::into));
        self
    }
}

/// Identifies an item by owning instrument and position within it.
///
/// Ordering is by instrument id, then index; matcher tie-breaks rely on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    pub instrument_id: i64,
    pub index: usize,
}

/// An item after flattening, immutable for the rest of the run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Row/column of this item in the similarity matrices.
    pub position: usize,
    pub instrument_id: i64,
    pub instrument_name: String,
    pub index: usize,
    pub text: String,
    pub polarity: f32,
}

impl Item {
    pub fn key(&self) -> ItemKey {
        ItemKey {
            instrument_id: self.instrument_id,
            index: self.index,
        }
    }
}

/// Flatten instruments into items, in instrument order then item order.
///
/// Indices are assigned here, so they are contiguous from zero by construction.
pub fn flatten(instruments: &[Instrument]) -> Vec<Item> {
    instruments
        .iter()
        .flat_map(|instrument| {
            instrument
                .items
                .iter()
                .enumerate()
                .map(move |(index, input)| (instrument, index, input))
        })
        .enumerate()
        .map(|(position, (instrument, index, input))| Item {
            position,
            instrument_id: instrument.id,
            instrument_name: instrument.name.clone(),
            index,
            text: input.text.clone(),
            polarity: input.polarity,
        })
        .collect()
}

/// Two items from different instruments proposed as equivalent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchedPair {
    pub source: ItemKey,
    pub target: ItemKey,
    pub source_position: usize,
    pub target_position: usize,
    pub score: f32,
}

/// A group of items deemed mutually equivalent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: usize,
    pub members: Vec<ItemKey>,
    /// Matrix positions of the members, ascending.
    pub positions: Vec<usize>,
    /// Mean pairwise similarity of the members (1.0 for singletons).
    pub mean_similarity: f32,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, key: &ItemKey) -> bool {
        self.members.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_assigns_positions_and_indices() {
        let instruments = vec![
            Instrument::new(7, "GAD-7")
                .with_items(["Feeling nervous", "Not being able to stop worrying"]),
            Instrument::new(2, "Empty"),
            Instrument::new(3, "PHQ-9")
                .with_item(ItemInput::reversed("Feeling good about yourself")),
        ];

        let items = flatten(&instruments);

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].key(), ItemKey { instrument_id: 7, index: 0 });
        assert_eq!(items[1].key(), ItemKey { instrument_id: 7, index: 1 });
        assert_eq!(items[2].key(), ItemKey { instrument_id: 3, index: 0 });
        assert_eq!(items[2].position, 2);
        assert_eq!(items[2].polarity, -1.0);
        assert_eq!(items[2].instrument_name, "PHQ-9");
    }

    #[test]
    fn test_item_key_ordering() {
        let a = ItemKey { instrument_id: 1, index: 5 };
        let b = ItemKey { instrument_id: 2, index: 0 };
        let c = ItemKey { instrument_id: 2, index: 1 };
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_item_input_polarity_defaults_to_positive() {
        let item: ItemInput = serde_json::from_str(r#"{"text": "I feel calm"}"#).unwrap();
        assert_eq!(item.polarity, 1.0);
    }
}
