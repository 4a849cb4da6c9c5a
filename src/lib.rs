//! Cross-lingual matching of questionnaire items.
//!
//! Instruments (ordered sets of items, possibly in different languages) are
//! embedded by a pluggable [`Vectoriser`], scored pairwise by cosine
//! similarity, and turned into ranked cross-instrument matches, optional
//! clusters and an optional one-to-one crosswalk.
//!
//! ```no_run
//! use harmonise::{match_instruments, Instrument, ItemInput, MatchRequest, Precomputed};
//!
//! let instruments = vec![
//!     Instrument::new(1, "GAD-7").with_item("Feeling nervous"),
//!     Instrument::new(2, "GAD-7 (pt)").with_item(ItemInput::new("Sentir-se nervoso")),
//! ];
//! let vectoriser = Precomputed::from_json_file("vectors.json".as_ref())?;
//! let result = match_instruments(&instruments, &MatchRequest::default(), &vectoriser)?;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod assemble;
pub mod cluster;
pub mod config;
pub mod errors;
pub mod input;
pub mod matcher;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod similarity;
pub mod validation;
pub mod vectoriser;

#[cfg(test)]
mod tests;

pub use assemble::{MatchResult, ResultAssembler};
pub use cluster::{cluster, ClusterMethod, HierarchicalCut, Linkage};
pub use config::{Config, ConfigError, Framework, MatchingConfig, VectoriserConfig};
pub use errors::{ContractViolation, MatchError, ValidationError};
pub use input::{load_instruments, InputError};
pub use matcher::{
    crosswalk, find_matches, find_query_matches, CrosswalkOptions, CrosswalkRow, MatchOptions,
};
pub use model::{
    flatten, Cluster, EmbeddingVector, Instrument, Item, ItemInput, ItemKey, MatchedPair,
};
pub use pipeline::{match_instruments, match_query, MatchRequest};
pub use report::{InstrumentSimilarity, MatchStatistics};
pub use similarity::{compute_similarity, cosine_similarity, SimilarityMatrices, SimilarityMatrix};
pub use vectoriser::{
    build_vectoriser, supported_models, vectorise_checked, CacheStats, CachedVectoriser, ModelInfo,
    Precomputed, RemoteApi, Vectoriser, VectoriserError,
};
#[cfg(feature = "fastembed")]
pub use vectoriser::LocalModel;
