use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cluster::DEFAULT_CLUSTER_THRESHOLD;
use crate::matcher::{DEFAULT_MIN_SCORE, DEFAULT_TOP_K};
use crate::pipeline::MatchRequest;

const CONFIG_FILE: &str = "config.yaml";

/// Default embedding model, multilingual so items in different languages land
/// in one vector space.
const DEFAULT_MODEL: &str = "paraphrase-multilingual-minilm-l12-v2";
/// Environment variable holding the remote API key.
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Default timeout for remote embedding requests in seconds
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("config is malformed: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("{field}: {message}")]
    Invalid { field: &'static str, message: String },
}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.into(),
    }
}

/// Which vectoriser backend to build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    /// Local ONNX model via fastembed
    #[default]
    Fastembed,
    /// OpenAI-compatible embeddings API
    Remote,
    /// Vectors loaded from a JSON file
    Precomputed,
}

/// Configuration for the vectoriser backend
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VectoriserConfig {
    #[serde(default)]
    pub framework: Framework,

    /// Model name within the framework (e.g., "multilingual-e5-small")
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the embeddings API, required for `remote`
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// JSON file mapping text to vector, required for `precomputed`
    #[serde(default)]
    pub precomputed_path: Option<PathBuf>,

    /// Timeout for remote requests in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Batch size for local inference, fastembed's default when unset
    #[serde(default)]
    pub batch_size: Option<usize>,

    /// Keep computed vectors in memory for the lifetime of the process
    #[serde(default = "default_true")]
    pub cache: bool,
}

impl Default for VectoriserConfig {
    fn default() -> Self {
        Self {
            framework: Framework::default(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            precomputed_path: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            batch_size: None,
            cache: true,
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}

/// Defaults applied to every match run unless overridden on the command line
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_min_score")]
    pub min_score: f32,

    #[serde(default)]
    pub negate_polarity: bool,

    /// Threshold used when clustering is requested without one
    #[serde(default = "default_cluster_threshold")]
    pub cluster_threshold: f32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            min_score: DEFAULT_MIN_SCORE,
            negate_polarity: false,
            cluster_threshold: DEFAULT_CLUSTER_THRESHOLD,
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_min_score() -> f32 {
    DEFAULT_MIN_SCORE
}

fn default_cluster_threshold() -> f32 {
    DEFAULT_CLUSTER_THRESHOLD
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub vectoriser: VectoriserConfig,
    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Config {
    /// `$HARMONISE_BASE_PATH`, or `~/.local/share/harmonise`.
    pub fn default_base_path() -> Result<PathBuf, ConfigError> {
        if let Ok(path) = std::env::var("HARMONISE_BASE_PATH") {
            return Ok(PathBuf::from(path));
        }

        let home = homedir::my_home()
            .map_err(|e| invalid("base_path", format!("could not determine home directory: {e}")))?
            .ok_or_else(|| invalid("base_path", "home directory path is empty"))?;

        Ok(home.join(".local/share/harmonise"))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn path(&self) -> PathBuf {
        self.base_path.join(CONFIG_FILE)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let vec = &self.vectoriser;
        if vec.model.trim().is_empty() {
            return Err(invalid("vectoriser.model", "must not be empty"));
        }

        match vec.framework {
            Framework::Remote => {
                let endpoint = vec.endpoint.as_deref().ok_or_else(|| {
                    invalid("vectoriser.endpoint", "required for the remote framework")
                })?;
                let parsed = url::Url::parse(endpoint)
                    .map_err(|e| invalid("vectoriser.endpoint", format!("{endpoint:?}: {e}")))?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(invalid(
                        "vectoriser.endpoint",
                        format!("{endpoint:?}: scheme must be http or https"),
                    ));
                }
            }
            Framework::Precomputed if vec.precomputed_path.is_none() => {
                return Err(invalid(
                    "vectoriser.precomputed_path",
                    "required for the precomputed framework",
                ));
            }
            _ => {}
        }

        if vec.request_timeout_secs == 0 {
            return Err(invalid("vectoriser.request_timeout_secs", "must be greater than 0"));
        }

        if vec.batch_size == Some(0) {
            return Err(invalid("vectoriser.batch_size", "must be greater than 0"));
        }

        let matching = &self.matching;
        if matching.top_k == 0 {
            return Err(invalid("matching.top_k", "must be a positive integer"));
        }

        for (field, value) in [
            ("matching.min_score", matching.min_score),
            ("matching.cluster_threshold", matching.cluster_threshold),
        ] {
            if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
                return Err(invalid(field, format!("must be between -1.0 and 1.0, got {value}")));
            }
        }

        Ok(())
    }

    /// Load `<base_path>/config.yaml`, creating it with defaults if missing.
    pub fn load_with(base_path: &Path) -> Result<Self, ConfigError> {
        std::fs::create_dir_all(base_path)?;

        let path = base_path.join(CONFIG_FILE);

        // create new if does not exist
        if !path.exists() {
            write_atomic(&path, serde_yml::to_string(&Self::default())?.as_bytes())?;
        }

        let config_str = std::fs::read_to_string(&path)?;
        let mut config: Self = serde_yml::from_str(&config_str)?;

        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            log::info!("upgrading {}", path.display());
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let config_str = serde_yml::to_string(&self)?;
        write_atomic(&self.path(), config_str.as_bytes())?;
        Ok(())
    }

    /// Match request seeded from the `matching` section.
    pub fn default_request(&self) -> MatchRequest {
        MatchRequest {
            top_k: self.matching.top_k,
            min_score: self.matching.min_score,
            negate_polarity: self.matching.negate_polarity,
            ..MatchRequest::default()
        }
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let temp_path = path.with_extension(format!("{}.tmp", std::process::id()));

    std::fs::write(&temp_path, data)?;

    std::fs::rename(&temp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();

        let config = Config::load_with(dir.path()).unwrap();

        assert!(dir.path().join("config.yaml").exists());
        assert_eq!(config.vectoriser, VectoriserConfig::default());
        assert_eq!(config.matching, MatchingConfig::default());
        assert_eq!(config.base_path(), dir.path());
    }

    #[test]
    fn test_load_fills_missing_fields_and_resaves() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.yaml"),
            "vectoriser:\n  model: multilingual-e5-small\n",
        )
        .unwrap();

        let config = Config::load_with(dir.path()).unwrap();
        assert_eq!(config.vectoriser.model, "multilingual-e5-small");
        assert_eq!(config.vectoriser.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert!(config.vectoriser.cache);

        let saved = std::fs::read_to_string(dir.path().join("config.yaml")).unwrap();
        assert!(saved.contains("matching:"));
        assert!(saved.contains("api_key_env: OPENAI_API_KEY"));
    }

    #[test]
    fn test_malformed_yaml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.yaml"), "matching: [1, 2").unwrap();

        assert!(matches!(Config::load_with(dir.path()), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_remote_requires_valid_endpoint() {
        let mut config = Config::default();
        config.vectoriser.framework = Framework::Remote;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "vectoriser.endpoint", .. })
        ));

        config.vectoriser.endpoint = Some("ftp://example.com".to_string());
        assert!(config.validate().is_err());

        config.vectoriser.endpoint = Some("https://api.openai.com/v1".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_precomputed_requires_path() {
        let mut config = Config::default();
        config.vectoriser.framework = Framework::Precomputed;
        assert!(config.validate().is_err());

        config.vectoriser.precomputed_path = Some(PathBuf::from("vectors.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_matching_values() {
        let mut config = Config::default();
        config.matching.top_k = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "matching.top_k", .. })
        ));

        let mut config = Config::default();
        config.matching.min_score = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "matching.min_score", .. })
        ));

        let mut config = Config::default();
        config.matching.cluster_threshold = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_file_is_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.yaml"), "matching:\n  top_k: 0\n").unwrap();

        assert!(matches!(
            Config::load_with(dir.path()),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_default_request_uses_matching_section() {
        let mut config = Config::default();
        config.matching.top_k = 3;
        config.matching.min_score = 0.4;
        config.matching.negate_polarity = true;

        let request = config.default_request();
        assert_eq!(request.top_k, 3);
        assert_eq!(request.min_score, 0.4);
        assert!(request.negate_polarity);
        assert!(request.cluster.is_none());
    }
}
