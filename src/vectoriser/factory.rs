use std::path::Path;
use std::time::Duration;

use super::{CachedVectoriser, Precomputed, RemoteApi, Vectoriser, VectoriserError};
use crate::config::{Framework, VectoriserConfig};

/// Build the vectoriser selected by `config`.
///
/// `base_path` is where local models are downloaded to. The result is
/// wrapped in a [`CachedVectoriser`] when `config.cache` is set.
pub fn build_vectoriser(
    config: &VectoriserConfig,
    base_path: &Path,
) -> Result<Box<dyn Vectoriser>, VectoriserError> {
    let backend: Box<dyn Vectoriser> = match config.framework {
        Framework::Fastembed => create_local(config, base_path)?,
        Framework::Remote => Box::new(create_remote(config)?),
        Framework::Precomputed => {
            let path = config
                .precomputed_path
                .as_deref()
                .ok_or(VectoriserError::MissingConfig("vectoriser.precomputed_path"))?;
            Box::new(Precomputed::from_json_file(path)?)
        }
    };

    log::info!(
        "Using vectoriser {}/{}",
        backend.framework(),
        backend.model()
    );

    if config.cache {
        Ok(Box::new(CachedVectoriser::new(backend)))
    } else {
        Ok(backend)
    }
}

#[cfg(feature = "fastembed")]
fn create_local(
    config: &VectoriserConfig,
    base_path: &Path,
) -> Result<Box<dyn Vectoriser>, VectoriserError> {
    let model = super::LocalModel::new(&config.model, base_path.to_path_buf(), config.batch_size)?;
    Ok(Box::new(model))
}

#[cfg(not(feature = "fastembed"))]
fn create_local(
    _config: &VectoriserConfig,
    _base_path: &Path,
) -> Result<Box<dyn Vectoriser>, VectoriserError> {
    Err(VectoriserError::FeatureDisabled("fastembed"))
}

fn create_remote(config: &VectoriserConfig) -> Result<RemoteApi, VectoriserError> {
    let endpoint = config
        .endpoint
        .as_deref()
        .ok_or(VectoriserError::MissingConfig("vectoriser.endpoint"))?;

    let api_key = read_api_key(&config.api_key_env);
    if api_key.is_none() {
        log::warn!(
            "{} is not set, sending embedding requests without authorization",
            config.api_key_env
        );
    }

    Ok(RemoteApi::new(
        endpoint,
        &config.model,
        api_key,
        Duration::from_secs(config.request_timeout_secs),
    )?
    .with_batch_size(config.batch_size))
}

fn read_api_key(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}
