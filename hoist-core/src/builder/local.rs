//! Local builder.
//!
//! Builds artifacts with the host's build backend and tags each resulting
//! image with a name derived from its content digest. Images are pushed
//! unless the target cluster shares the host's image store.

use crate::backend::{BackendConnector, BackendError, ClientLease, OutputSink};
use crate::builder::bazel::BazelRunner;
use crate::builder::dispatch::run_build_for_artifact;
use crate::cluster::is_local_cluster;
use crate::config::BuildConfig;
use crate::error::{HoistError, Result, Stage};
use crate::tag::{TagError, TagOptions, Tagger};
use crate::types::{ArtifactSpec, ArtifactState, Build};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Label naming the builder that produced an image.
pub const BUILDER_LABEL: &str = "hoist.dev/builder";

/// Label carrying the backend's API version.
pub const DOCKER_API_VERSION_LABEL: &str = "hoist.dev/docker-api-version";

/// Builds artifacts on the host's build backend.
pub struct LocalBuilder {
    /// Settings as supplied by the caller; never modified
    config: BuildConfig,

    /// Effective push setting
    skip_push: bool,

    /// Whether the cluster shares the host's image store
    local_cluster: bool,

    connector: Arc<dyn BackendConnector>,
    bazel: BazelRunner,
}

impl LocalBuilder {
    /// Create a builder for `config`.
    ///
    /// When `config.skip_push` is unset, pushing is skipped exactly when the
    /// cluster is local. The derived value is kept here; `config` is stored as given.
    pub fn new(config: BuildConfig, connector: Arc<dyn BackendConnector>) -> Self {
        let local_cluster = is_local_cluster(&config.cluster_context);
        let skip_push = match config.skip_push {
            Some(skip_push) => skip_push,
            None => {
                debug!(
                    context = %config.cluster_context,
                    skip_push = local_cluster,
                    "skipPush not set, using cluster default (local clusters skip)"
                );
                local_cluster
            }
        };

        Self { config, skip_push, local_cluster, connector, bazel: BazelRunner::new() }
    }

    /// Use a specific bazel runner for hermetic artifacts.
    pub fn with_bazel(mut self, bazel: BazelRunner) -> Self {
        self.bazel = bazel;
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn skip_push(&self) -> bool {
        self.skip_push
    }

    pub fn is_local_cluster(&self) -> bool {
        self.local_cluster
    }

    /// Labels describing this builder.
    ///
    /// The version label is best effort: if the backend cannot be reached or
    /// cannot report its version, the label is left out.
    pub async fn labels(&self, cancel: &CancellationToken) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert(BUILDER_LABEL.to_string(), "local".to_string());

        match self.connector.connect().await {
            Ok(client) => {
                let client = ClientLease::new(client);
                match client.server_version(cancel).await {
                    Ok(version) => {
                        labels.insert(DOCKER_API_VERSION_LABEL.to_string(), version.api_version);
                    }
                    Err(e) => debug!("Omitting version label: {}", e),
                }
            }
            Err(e) => debug!("Omitting version label, backend unavailable: {}", e),
        }

        labels
    }

    /// Build, tag and (unless skipped) push every artifact, in order.
    ///
    /// Progress is written to `out`. The first failure aborts the run; images
    /// completed before it are left as they are.
    #[instrument(skip_all, fields(context = %self.config.cluster_context, artifacts = artifacts.len()))]
    pub async fn build(
        &self,
        cancel: &CancellationToken,
        out: OutputSink<'_>,
        tagger: &dyn Tagger,
        artifacts: &[ArtifactSpec],
    ) -> Result<Vec<Build>> {
        let client = ClientLease::new(
            self.connector.connect().await.map_err(|source| HoistError::ClientInit { source })?,
        );

        if self.local_cluster {
            let banner = format!(
                "Found [{}] context, using local docker daemon.\n",
                self.config.cluster_context
            );
            write_status(&mut *out, &banner, "status").await?;
        }

        let mut builds = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            if cancel.is_cancelled() {
                return Err(HoistError::Cancelled {
                    stage: Stage::Build,
                    image: artifact.image_name.clone(),
                });
            }

            match self.build_artifact(&client, cancel, &mut *out, tagger, artifact).await {
                Ok(build) => builds.push(build),
                Err(e) => {
                    warn!(image = %artifact.image_name, state = %ArtifactState::Failed, "{}", e);
                    return Err(e);
                }
            }
        }

        info!(built = builds.len(), skip_push = self.skip_push, "All artifacts built");
        Ok(builds)
    }

    async fn build_artifact(
        &self,
        client: &ClientLease,
        cancel: &CancellationToken,
        out: OutputSink<'_>,
        tagger: &dyn Tagger,
        artifact: &ArtifactSpec,
    ) -> Result<Build> {
        let image = artifact.image_name.as_str();
        let progress = |state: ArtifactState| debug!(image, state = %state, "Artifact progress");
        progress(ArtifactState::Pending);

        write_status(&mut *out, &format!("Building [{}]...\n", image), "build status").await?;

        let initial_tag = guarded(
            cancel,
            HoistError::Cancelled { stage: Stage::Build, image: image.to_string() },
            run_build_for_artifact(&**client, &self.bazel, cancel, &mut *out, artifact),
        )
        .await?;
        progress(ArtifactState::Built);

        let digest = guarded(cancel, BackendError::Cancelled, client.digest(cancel, &initial_tag))
            .await
            .map_err(|e| HoistError::from_backend(Stage::Digest, image, e))?;
        if digest.is_empty() {
            return Err(HoistError::from_backend(
                Stage::Digest,
                image,
                BackendError::EmptyDigest { tag: initial_tag },
            ));
        }
        debug!(image, digest = %digest, "Resolved digest");
        progress(ArtifactState::Digested);

        let options = TagOptions { image_name: image.to_string(), digest };
        let tag = guarded(
            cancel,
            TagError::Cancelled,
            tagger.generate_fully_qualified_image_name(cancel, &artifact.workspace, &options),
        )
        .await
        .map_err(|e| HoistError::from_tagger(image, e))?;

        guarded(cancel, BackendError::Cancelled, client.tag(cancel, &initial_tag, &tag))
            .await
            .map_err(|e| HoistError::from_backend(Stage::Tag, image, e))?;
        write_status(&mut *out, &format!("Successfully tagged {}\n", tag), "tag status").await?;
        progress(ArtifactState::Tagged);

        if self.skip_push {
            progress(ArtifactState::Skipped);
        } else {
            guarded(cancel, BackendError::Cancelled, client.push(cancel, &tag, &mut *out))
                .await
                .map_err(|e| HoistError::from_backend(Stage::Push, image, e))?;
            progress(ArtifactState::Pushed);
        }

        progress(ArtifactState::Complete);
        Ok(Build { image_name: image.to_string(), tag })
    }
}

/// Race `fut` against cancellation so a collaborator that ignores the token
/// still stops the pipeline promptly.
async fn guarded<T, E, F>(cancel: &CancellationToken, cancelled: E, fut: F) -> std::result::Result<T, E>
where
    F: Future<Output = std::result::Result<T, E>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(cancelled),
        result = fut => result,
    }
}

/// Write a status line; the sink may be a remote log stream, so failures surface.
async fn write_status(out: OutputSink<'_>, line: &str, what: &'static str) -> Result<()> {
    out.write_all(line.as_bytes()).await.map_err(|source| HoistError::Io { what, source })?;
    out.flush().await.map_err(|source| HoistError::Io { what, source })
}
