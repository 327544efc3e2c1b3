//! Labels command implementation for hoist CLI.

use anyhow::Result;
use hoist_core::builder::DOCKER_API_VERSION_LABEL;
use hoist_core::{BuildConfig, DockerConnector, LocalBuilder};
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{Table, Tabled};
use tokio_util::sync::CancellationToken;

#[derive(Tabled)]
struct LabelRow {
    #[tabled(rename = "LABEL")]
    key: String,
    #[tabled(rename = "VALUE")]
    value: String,
}

/// Print the labels the local builder contributes.
pub async fn labels(cancel: &CancellationToken, docker: Option<PathBuf>) -> Result<()> {
    // Labels do not depend on the target cluster.
    let builder = LocalBuilder::new(
        BuildConfig::default(),
        Arc::new(DockerConnector { binary_path: docker }),
    );
    let labels = builder.labels(cancel).await;

    if !labels.contains_key(DOCKER_API_VERSION_LABEL) {
        eprintln!("Docker daemon unavailable; API version label omitted");
    }

    let rows: Vec<LabelRow> =
        labels.into_iter().map(|(key, value)| LabelRow { key, value }).collect();
    println!("{}", Table::new(rows));

    Ok(())
}
