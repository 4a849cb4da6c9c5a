use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod handlers;
mod types;

pub use handlers::*;
pub use types::*;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Directory holding config.yaml and downloaded models
    /// (defaults to $HARMONISE_BASE_PATH or ~/.local/share/harmonise)
    #[clap(long, global = true)]
    pub base_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate api docs in markdown format
    #[cfg(feature = "markdown-docs")]
    #[clap(hide = true)]
    MarkdownDocs {},

    /// Match items across instruments and print the result as JSON
    Match {
        /// Instruments file (.json or .csv)
        input: PathBuf,

        /// Match this text against every item instead of all pairs
        #[clap(short, long)]
        query: Option<String>,

        /// Candidates kept per item
        #[clap(short = 'k', long)]
        top_k: Option<usize>,

        /// Drop matches scoring below this
        #[clap(short = 's', long, allow_hyphen_values = true)]
        min_score: Option<f32>,

        /// Apply item polarity to scores (reverse-scored items)
        #[clap(long, default_value = "false")]
        negate: bool,

        /// Keep both directions of every pair
        #[clap(long, default_value = "false")]
        directional: bool,

        /// Use vectors from this JSON file instead of the configured vectoriser
        #[clap(long)]
        vectors: Option<PathBuf>,

        #[clap(flatten)]
        cluster: ClusterArgs,

        #[clap(flatten)]
        crosswalk: CrosswalkArgs,
    },

    /// List models the local vectoriser can load
    Models {},

    /// Print the configuration file location and contents
    Config {},
}
