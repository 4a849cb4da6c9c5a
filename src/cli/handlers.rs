use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use harmonise::{
    build_vectoriser, load_instruments, match_instruments, match_query, supported_models, Config,
    Framework, MatchRequest,
};

use super::types::{ClusterArgs, CrosswalkArgs};

/// Options of the `match` command, as parsed from the command line.
pub struct MatchArgs {
    pub input: PathBuf,
    pub query: Option<String>,
    pub top_k: Option<usize>,
    pub min_score: Option<f32>,
    pub negate: bool,
    pub directional: bool,
    pub vectors: Option<PathBuf>,
    pub cluster: ClusterArgs,
    pub crosswalk: CrosswalkArgs,
}

pub fn handle_match(args: MatchArgs, config: &Config) -> Result<()> {
    let instruments = load_instruments(&args.input)
        .with_context(|| format!("Failed to read instruments from {}", args.input.display()))?;

    let request = build_request(&args, config)?;

    let mut vectoriser_config = config.vectoriser.clone();
    if let Some(path) = args.vectors {
        vectoriser_config.framework = Framework::Precomputed;
        vectoriser_config.precomputed_path = Some(path);
    }

    let vectoriser = build_vectoriser(&vectoriser_config, config.base_path())
        .context("Failed to initialize vectoriser")?;

    let result = match &args.query {
        Some(query) => match_query(&instruments, query, &request, vectoriser.as_ref()),
        None => match_instruments(&instruments, &request, vectoriser.as_ref()),
    }
    .context("Matching failed")?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}

fn build_request(args: &MatchArgs, config: &Config) -> Result<MatchRequest> {
    let mut request = config.default_request();

    if let Some(top_k) = args.top_k {
        request.top_k = top_k;
    }
    if let Some(min_score) = args.min_score {
        request.min_score = min_score;
    }
    request.negate_polarity |= args.negate;
    request.directional = args.directional;
    request.cluster = args.cluster.method(config.matching.cluster_threshold)?;
    request.crosswalk = args.crosswalk.options();

    Ok(request)
}

pub fn handle_models() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(supported_models())?);
    Ok(())
}

pub fn handle_config(config: &Config) -> Result<()> {
    println!("# {}", config.path().display());
    print!("{}", serde_yml::to_string(config)?);
    Ok(())
}

pub fn load_config(base_path: Option<&Path>) -> Result<Config> {
    let base_path = match base_path {
        Some(path) => path.to_path_buf(),
        None => Config::default_base_path()?,
    };

    Config::load_with(&base_path)
        .with_context(|| format!("Failed to load config from {}", base_path.display()))
}
