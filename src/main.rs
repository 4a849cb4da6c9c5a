use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();
    tracing::debug!(?args, "parsed arguments");

    match args.command {
        #[cfg(feature = "markdown-docs")]
        cli::Command::MarkdownDocs {} => {
            clap_markdown::print_help_markdown::<cli::Args>();
            Ok(())
        }

        cli::Command::Models {} => cli::handle_models(),

        cli::Command::Config {} => {
            let config = cli::load_config(args.base_path.as_deref())?;
            cli::handle_config(&config)
        }

        cli::Command::Match {
            input,
            query,
            top_k,
            min_score,
            negate,
            directional,
            vectors,
            cluster,
            crosswalk,
        } => {
            let config = cli::load_config(args.base_path.as_deref())?;
            let match_args = cli::MatchArgs {
                input,
                query,
                top_k,
                min_score,
                negate,
                directional,
                vectors,
                cluster,
                crosswalk,
            };
            cli::handle_match(match_args, &config)
        }
    }
}
