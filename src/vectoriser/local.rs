//! Local embedding model backed by fastembed.
//!
//! - Models are downloaded into `<base>/models` on first use
//! - Dimensions are probed once at load time
//! - Batches go through a single `Mutex`, since fastembed's `embed()` takes `&mut self`

use fastembed::{InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Mutex;

use super::{Vectoriser, VectoriserError};
use crate::model::EmbeddingVector;

/// Wrapper around fastembed's TextEmbedding model.
pub struct LocalModel {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimensions: usize,
    batch_size: Option<usize>,
}

impl LocalModel {
    /// Load `model_name`, downloading it into `cache_dir/models` if needed.
    ///
    /// # Arguments
    /// * `model_name` - Name of the model (e.g., "paraphrase-multilingual-minilm-l12-v2")
    /// * `cache_dir` - Directory to cache downloaded models
    /// * `batch_size` - Batch size handed to fastembed (its default when `None`)
    pub fn new(
        model_name: &str,
        cache_dir: PathBuf,
        batch_size: Option<usize>,
    ) -> Result<Self, VectoriserError> {
        let model_enum = Self::parse_model_name(model_name)?;

        let models_dir = cache_dir.join("models");
        std::fs::create_dir_all(&models_dir).map_err(|e| {
            VectoriserError::InitFailed(format!("Failed to create models directory: {}", e))
        })?;

        let options = InitOptions::new(model_enum)
            .with_cache_dir(models_dir)
            .with_show_download_progress(true);

        log::info!("Loading embedding model '{}'", model_name);

        let mut model = TextEmbedding::try_new(options)
            .map_err(|e| VectoriserError::InitFailed(e.to_string()))?;

        let dimensions = Self::probe_dimensions(&mut model)?;

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
            dimensions,
            batch_size,
        })
    }

    /// Get the embedding dimensions for this model
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Parse model name string to fastembed enum.
    fn parse_model_name(name: &str) -> Result<fastembed::EmbeddingModel, VectoriserError> {
        use fastembed::EmbeddingModel as M;

        match name.to_lowercase().as_str() {
            "paraphrase-multilingual-minilm-l12-v2" => Ok(M::ParaphraseMLMiniLML12V2),
            "paraphrase-multilingual-minilm-l12-v2-q" => Ok(M::ParaphraseMLMiniLML12V2Q),
            "paraphrase-multilingual-mpnet-base-v2" => Ok(M::ParaphraseMLMpnetBaseV2),
            "multilingual-e5-small" => Ok(M::MultilingualE5Small),
            "multilingual-e5-base" => Ok(M::MultilingualE5Base),
            "multilingual-e5-large" => Ok(M::MultilingualE5Large),
            "all-minilm-l6-v2" => Ok(M::AllMiniLML6V2),
            "all-minilm-l6-v2-q" => Ok(M::AllMiniLML6V2Q),
            "all-minilm-l12-v2" => Ok(M::AllMiniLML12V2),
            "all-minilm-l12-v2-q" => Ok(M::AllMiniLML12V2Q),
            "bge-small-en-v1.5" => Ok(M::BGESmallENV15),
            "bge-small-en-v1.5-q" => Ok(M::BGESmallENV15Q),
            "bge-base-en-v1.5" => Ok(M::BGEBaseENV15),
            "bge-base-en-v1.5-q" => Ok(M::BGEBaseENV15Q),
            "bge-large-en-v1.5" => Ok(M::BGELargeENV15),
            "bge-large-en-v1.5-q" => Ok(M::BGELargeENV15Q),
            _ => Err(VectoriserError::InvalidModel(format!(
                "Unknown model: {}. Run `harmonise models` for the supported list",
                name
            ))),
        }
    }

    /// Probe the model to determine embedding dimensions.
    fn probe_dimensions(model: &mut TextEmbedding) -> Result<usize, VectoriserError> {
        let test_embeddings = model.embed(vec!["test"], None).map_err(|e| {
            VectoriserError::InitFailed(format!("Failed to probe dimensions: {}", e))
        })?;

        test_embeddings
            .first()
            .map(|v| v.len())
            .ok_or_else(|| VectoriserError::InitFailed("Model returned no embedding".to_string()))
    }
}

impl Vectoriser for LocalModel {
    fn framework(&self) -> &str {
        "fastembed"
    }

    fn model(&self) -> &str {
        &self.model_name
    }

    fn vectorise(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, VectoriserError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut model = self.model.lock().map_err(|e| {
            VectoriserError::EmbeddingFailed(format!("Failed to acquire model lock: {}", e))
        })?;

        model
            .embed(texts.to_vec(), self.batch_size)
            .map_err(|e| VectoriserError::EmbeddingFailed(e.to_string()))
    }
}
