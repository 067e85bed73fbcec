use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod domain;
mod services;

use cli::{Cli, Commands};
use domain::models::{ErrBody, JsonErr};
use services::PipelineError;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        if cli.json {
            let out = JsonErr {
                ok: false,
                error: ErrBody {
                    code: error_code(&e).to_string(),
                    message: format!("{e:#}"),
                },
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{\"ok\":false}".to_string())
            );
        } else {
            eprintln!("error: {e:#}");
        }
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let cfg = config::load_config(cli.config.as_deref())?;
    let mut rng: StdRng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    match &cli.command {
        Commands::Run { .. } | Commands::Discover | Commands::Compose { .. } => {
            commands::handle_pipeline_commands(cli, &cfg, &mut rng)
        }
        Commands::Gate { .. } | Commands::Select { .. } | Commands::Library { .. } => {
            commands::handle_inspect_commands(cli, &cfg, &mut rng)
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env("ERRPRESS_LOG")
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn error_code(e: &anyhow::Error) -> &'static str {
    match e.downcast_ref::<PipelineError>() {
        Some(PipelineError::ArticleNotFound(_)) => "ARTICLE_NOT_FOUND",
        Some(PipelineError::SynthesisKeyMissing) => "SYNTHESIS_KEY_MISSING",
        Some(PipelineError::PublisherNotConfigured) => "PUBLISHER_NOT_CONFIGURED",
        None => "RUNTIME",
    }
}
