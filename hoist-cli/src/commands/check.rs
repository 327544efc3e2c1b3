//! Check command implementation for hoist CLI.
//!
//! Validates a pipeline file without contacting the build backend.

use anyhow::{Context, Result};
use colored::Colorize;
use hoist_core::{BuildKind, DockerConnector, LocalBuilder, PipelineConfig};
use std::path::Path;
use std::sync::Arc;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct ArtifactRow {
    #[tabled(rename = "IMAGE")]
    image: String,
    #[tabled(rename = "KIND")]
    kind: String,
    #[tabled(rename = "SOURCE")]
    source: String,
    #[tabled(rename = "WORKSPACE")]
    workspace: String,
}

pub fn check(file: &Path, kube_context: Option<&str>) -> Result<()> {
    let pipeline = PipelineConfig::load(file)
        .with_context(|| format!("Failed to load pipeline {}", file.display()))?;
    pipeline.tag_policy.tagger().context("Invalid tag policy")?;

    let rows: Vec<ArtifactRow> = pipeline
        .artifacts
        .iter()
        .map(|a| ArtifactRow {
            image: a.image_name.clone(),
            kind: a.kind.name().to_string(),
            source: match &a.kind {
                BuildKind::Docker(docker) => docker.dockerfile_path.clone(),
                BuildKind::Bazel(bazel) => bazel.target.clone(),
            },
            workspace: a.workspace.display().to_string(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);

    match pipeline.build_config(kube_context, None) {
        Ok(config) => {
            // Connecting is deferred to build time, so no backend is needed here.
            let builder = LocalBuilder::new(config, Arc::new(DockerConnector::default()));
            println!(
                "Context: {} ({})",
                builder.config().cluster_context.bold(),
                if builder.is_local_cluster() { "local" } else { "remote" }
            );
            let push = if builder.skip_push() { "skipped".yellow() } else { "enabled".green() };
            println!("Push:    {}", push);
        }
        Err(e) => println!("{} {}", "warning:".yellow(), e),
    }

    println!("{} {} is valid", "✓".green(), file.display());
    Ok(())
}
