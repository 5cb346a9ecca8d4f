//! Pipewright CLI tool.

use clap::{Parser, Subcommand};
use pipewright_config::pipeline::DEFAULT_PIPELINE_FILE;
use pipewright_core::PipelineKind;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::run::RunArgs;

#[derive(Parser)]
#[command(name = "pipewright")]
#[command(about = "Run build and deploy pipelines in Docker", long_about = None)]
struct Cli {
    /// Pipeline file
    #[arg(long, global = true, env = "PIPEWRIGHT_PIPELINE_FILE", default_value = DEFAULT_PIPELINE_FILE)]
    pipeline_file: PathBuf,

    /// Agent configuration file
    #[arg(long, global = true, env = "PIPEWRIGHT_AGENT_CONFIG")]
    agent_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the build pipeline
    Build(RunArgs),
    /// Run the deploy pipeline
    Deploy(RunArgs),
    /// Validate the pipeline file
    Validate,
    /// Check that Docker is reachable
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the run summary
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build(args) => {
            commands::run::run(
                PipelineKind::Build,
                &cli.pipeline_file,
                cli.agent_config.as_deref(),
                args,
            )
            .await?;
        }
        Commands::Deploy(args) => {
            commands::run::run(
                PipelineKind::Deploy,
                &cli.pipeline_file,
                cli.agent_config.as_deref(),
                args,
            )
            .await?;
        }
        Commands::Validate => {
            commands::validate(&cli.pipeline_file)?;
        }
        Commands::Ping => {
            commands::ping().await?;
        }
    }

    Ok(())
}
