//! Build command implementation for hoist CLI.
//!
//! Loads the pipeline file, builds every artifact and reports the final tags.

use anyhow::{Context, Result};
use colored::Colorize;
use hoist_core::{Build, DockerConnector, LocalBuilder, PipelineConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{settings::Style, Table, Tabled};
use tokio_util::sync::CancellationToken;

/// Options for `hoist build`.
pub struct BuildOptions {
    pub file: PathBuf,
    pub kube_context: Option<String>,
    /// Explicit push setting; derived from the cluster when unset
    pub skip_push: Option<bool>,
    pub docker: Option<PathBuf>,
    pub json: bool,
}

#[derive(Tabled)]
struct BuildRow {
    #[tabled(rename = "IMAGE")]
    image: String,
    #[tabled(rename = "TAG")]
    tag: String,
    #[tabled(rename = "PUSHED")]
    pushed: String,
}

pub async fn build(cancel: &CancellationToken, opts: BuildOptions) -> Result<()> {
    let pipeline = PipelineConfig::load(&opts.file)
        .with_context(|| format!("Failed to load pipeline {}", opts.file.display()))?;
    let tagger = pipeline.tag_policy.tagger().context("Invalid tag policy")?;
    let config = pipeline.build_config(opts.kube_context.as_deref(), opts.skip_push)?;

    let connector = Arc::new(DockerConnector { binary_path: opts.docker });
    let builder = LocalBuilder::new(config, connector);

    let mut stdout = tokio::io::stdout();
    let builds = builder
        .build(cancel, &mut stdout, tagger.as_ref(), &pipeline.artifacts)
        .await
        .context("Build failed")?;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&builds)?);
        return Ok(());
    }

    println!();
    print_builds(&builds, !builder.skip_push());
    if builder.skip_push() {
        println!(
            "{} Images were not pushed; [{}] uses the local image store.",
            "note:".cyan(),
            builder.config().cluster_context
        );
    }

    Ok(())
}

fn print_builds(builds: &[Build], pushed: bool) {
    let rows: Vec<BuildRow> = builds
        .iter()
        .map(|b| BuildRow {
            image: b.image_name.clone(),
            tag: b.tag.clone(),
            pushed: if pushed { "yes".green().to_string() } else { "no".yellow().to_string() },
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
    println!("{} {} artifact(s) built", "✓".green(), builds.len());
}
