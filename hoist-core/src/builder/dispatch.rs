//! Build strategy dispatch.

use crate::backend::{BackendClient, BackendResult, ImageBuildOptions, OutputSink};
use crate::builder::bazel::{build_bazel, BazelRunner};
use crate::error::{HoistError, Result, Stage};
use crate::types::{ArtifactSpec, BuildKind, DockerArtifact};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Fresh 32 character hex identifier for transient image tags.
pub fn random_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Build one artifact with the strategy its kind selects.
///
/// Returns the initial tag produced by the backend, verbatim.
#[instrument(skip_all, fields(image = %artifact.image_name, kind = artifact.kind.name()))]
pub async fn run_build_for_artifact(
    client: &dyn BackendClient,
    bazel: &BazelRunner,
    cancel: &CancellationToken,
    out: OutputSink<'_>,
    artifact: &ArtifactSpec,
) -> Result<String> {
    let built = match &artifact.kind {
        BuildKind::Docker(spec) => build_docker(client, cancel, out, &artifact.workspace, spec).await,
        BuildKind::Bazel(spec) => {
            build_bazel(client, bazel, cancel, out, &artifact.workspace, spec).await
        }
    };
    built.map_err(|e| HoistError::from_backend(Stage::Build, &artifact.image_name, e))
}

/// Build a Dockerfile artifact on the daemon.
///
/// The image is tagged `<random id>:latest`; the tag carries no content
/// information and is replaced by a digest-derived tag afterwards.
pub async fn build_docker(
    client: &dyn BackendClient,
    cancel: &CancellationToken,
    out: OutputSink<'_>,
    workspace: &Path,
    spec: &DockerArtifact,
) -> BackendResult<String> {
    let initial_tag = random_id();
    debug!(tag = %initial_tag, dockerfile = %spec.dockerfile_path, "Requesting docker build");

    let options = ImageBuildOptions {
        context_path: workspace.to_path_buf(),
        dockerfile: spec.dockerfile_path.clone(),
        tags: vec![initial_tag.clone()],
        build_args: spec.build_args.clone(),
        cache_from: spec.cache_from.clone(),
    };
    client.build(cancel, &options, out).await?;

    Ok(format!("{}:latest", initial_tag))
}
