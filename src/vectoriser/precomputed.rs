use std::collections::HashMap;
use std::path::Path;

use super::{Vectoriser, VectoriserError};
use crate::model::EmbeddingVector;

/// Vectoriser answering from a fixed text -> vector table.
///
/// Useful for offline runs against embeddings produced elsewhere, and for
/// tests that need engineered vectors.
pub struct Precomputed {
    model: String,
    vectors: HashMap<String, EmbeddingVector>,
}

impl Precomputed {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            vectors: HashMap::new(),
        }
    }

    pub fn with_vector(mut self, text: &str, vector: EmbeddingVector) -> Self {
        self.insert(text, vector);
        self
    }

    pub fn insert(&mut self, text: &str, vector: EmbeddingVector) {
        self.vectors.insert(text.to_string(), vector);
    }

    /// Load a JSON object mapping each text to its vector.
    pub fn from_json_file(path: &Path) -> Result<Self, VectoriserError> {
        let data = std::fs::read(path)?;
        let vectors: HashMap<String, EmbeddingVector> = serde_json::from_slice(&data)?;

        log::info!("Loaded {} precomputed vectors from {}", vectors.len(), path.display());

        let model = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("precomputed")
            .to_string();

        Ok(Self { model, vectors })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

impl Vectoriser for Precomputed {
    fn framework(&self) -> &str {
        "precomputed"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn vectorise(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, VectoriserError> {
        texts
            .iter()
            .map(|text| {
                self.vectors
                    .get(text)
                    .cloned()
                    .ok_or_else(|| VectoriserError::UnknownText(text.clone()))
            })
            .collect()
    }
}
