use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

mod commands;

#[derive(Parser)]
#[command(name = "hoist")]
#[command(about = "Build, tag and publish container images for a cluster", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PipelineArgs {
    /// Path to the pipeline file
    #[arg(short, long, default_value = hoist_core::config::DEFAULT_PIPELINE_FILE)]
    file: PathBuf,

    /// Cluster context images are built for (overrides kubeContext)
    #[arg(long, env = "HOIST_KUBE_CONTEXT")]
    kube_context: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every artifact in the pipeline
    Build {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Never push images, even to remote clusters
        #[arg(long, conflicts_with = "push")]
        skip_push: bool,

        /// Always push images, even to local clusters
        #[arg(long)]
        push: bool,

        /// Path to the docker binary
        #[arg(long)]
        docker: Option<PathBuf>,

        /// Print results as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show the labels the builder attaches to deployed resources
    Labels {
        /// Path to the docker binary
        #[arg(long)]
        docker: Option<PathBuf>,
    },

    /// Validate the pipeline and show what a build would do
    Check {
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
}

fn log_level(verbose: u8) -> tracing::Level {
    match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    hoist_core::init_observability(log_level(cli.verbose))
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Build { pipeline, skip_push, push, docker, json } => {
            let skip_push = match (skip_push, push) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            let opts = commands::build::BuildOptions {
                file: pipeline.file,
                kube_context: pipeline.kube_context,
                skip_push,
                docker,
                json,
            };
            commands::build(&cancel, opts).await?;
        }

        Commands::Labels { docker } => {
            commands::labels(&cancel, docker).await?;
        }

        Commands::Check { pipeline } => {
            commands::check(&pipeline.file, pipeline.kube_context.as_deref())?;
        }
    }

    Ok(())
}
