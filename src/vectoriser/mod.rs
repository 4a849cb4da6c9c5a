//! Text vectorisation backends.
//!
//! The matching core only depends on the [`Vectoriser`] trait. Concrete
//! backends are picked explicitly through configuration:
//!
//! - `local`: fastembed ONNX models run in-process (feature `fastembed`)
//! - `remote`: OpenAI-compatible embeddings HTTP API
//! - `precomputed`: lookup table loaded from a JSON file
//! - `cache`: in-memory cache wrapping any of the above
//! - `factory`: builds a backend from [`crate::config::VectoriserConfig`]

mod cache;
mod factory;
#[cfg(feature = "fastembed")]
mod local;
mod precomputed;
mod remote;

pub use cache::{CacheStats, CachedVectoriser};
pub use factory::build_vectoriser;
#[cfg(feature = "fastembed")]
pub use local::LocalModel;
pub use precomputed::Precomputed;
pub use remote::RemoteApi;

use serde::Serialize;

use crate::errors::{ContractViolation, MatchError};
use crate::model::EmbeddingVector;

/// Error type for vectoriser backends
#[derive(Debug, thiserror::Error)]
pub enum VectoriserError {
    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Invalid model name: {0}")]
    InvalidModel(String),

    #[error("Invalid endpoint {endpoint:?}: {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    #[error("Embedding API returned an error: {0}")]
    Api(String),

    #[error("request error: {0:?}")]
    Request(#[from] reqwest::Error),

    #[error("No precomputed vector for text {0:?}")]
    UnknownText(String),

    #[error("io error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Contract violation: {0}")]
    Contract(ContractViolation),

    #[error("Missing configuration: {0}")]
    MissingConfig(&'static str),

    #[error("This build does not include the `{0}` feature")]
    FeatureDisabled(&'static str),
}

/// Maps an ordered batch of texts to one embedding per text.
///
/// Implementations must be length- and order-preserving: output `i`
/// corresponds to input `i`. [`vectorise_checked`] enforces this.
pub trait Vectoriser: Send + Sync {
    /// Backend family, e.g. `fastembed` or `remote`.
    fn framework(&self) -> &str;

    /// Model name within the framework.
    fn model(&self) -> &str;

    fn vectorise(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, VectoriserError>;
}

impl<V: Vectoriser + ?Sized> Vectoriser for Box<V> {
    fn framework(&self) -> &str {
        (**self).framework()
    }

    fn model(&self) -> &str {
        (**self).model()
    }

    fn vectorise(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, VectoriserError> {
        (**self).vectorise(texts)
    }
}

/// Run `vectoriser` and verify the output honours the contract.
///
/// Count must match the input, every vector must share one non-zero
/// dimension, and every value must be finite.
pub fn vectorise_checked(
    vectoriser: &dyn Vectoriser,
    texts: &[String],
) -> Result<Vec<EmbeddingVector>, MatchError> {
    if texts.is_empty() {
        return Ok(vec![]);
    }

    log::debug!(
        "vectorising {} texts with {}/{}",
        texts.len(),
        vectoriser.framework(),
        vectoriser.model()
    );

    let vectors = vectoriser.vectorise(texts)?;
    check_contract(texts.len(), &vectors)?;

    Ok(vectors)
}

fn check_contract(expected: usize, vectors: &[EmbeddingVector]) -> Result<(), ContractViolation> {
    if vectors.len() != expected {
        return Err(ContractViolation::Count {
            expected,
            got: vectors.len(),
        });
    }

    let dimensions = vectors.first().map(Vec::len).unwrap_or_default();
    for (position, vector) in vectors.iter().enumerate() {
        if vector.is_empty() {
            return Err(ContractViolation::EmptyVector { position });
        }
        if vector.len() != dimensions {
            return Err(ContractViolation::Dimension {
                position,
                expected: dimensions,
                got: vector.len(),
            });
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(ContractViolation::NonFinite { position });
        }
    }

    Ok(())
}

/// A model name the local backend understands.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct ModelInfo {
    pub name: &'static str,
    pub dimensions: usize,
    /// Suitable for matching items written in different languages.
    pub multilingual: bool,
}

impl ModelInfo {
    const fn new(name: &'static str, dimensions: usize, multilingual: bool) -> Self {
        Self {
            name,
            dimensions,
            multilingual,
        }
    }
}

/// Models accepted by the `fastembed` framework (add `-q` for quantized
/// variants where fastembed ships one).
pub const LOCAL_MODELS: &[ModelInfo] = &[
    ModelInfo::new("paraphrase-multilingual-minilm-l12-v2", 384, true),
    ModelInfo::new("paraphrase-multilingual-mpnet-base-v2", 768, true),
    ModelInfo::new("multilingual-e5-small", 384, true),
    ModelInfo::new("multilingual-e5-base", 768, true),
    ModelInfo::new("multilingual-e5-large", 1024, true),
    ModelInfo::new("all-minilm-l6-v2", 384, false),
    ModelInfo::new("all-minilm-l12-v2", 384, false),
    ModelInfo::new("bge-small-en-v1.5", 384, false),
    ModelInfo::new("bge-base-en-v1.5", 768, false),
    ModelInfo::new("bge-large-en-v1.5", 1024, false),
];

/// Models the `fastembed` framework can load, for listing in the CLI.
pub fn supported_models() -> &'static [ModelInfo] {
    LOCAL_MODELS
}
