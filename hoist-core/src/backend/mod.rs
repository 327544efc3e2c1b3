//! Build backend abstraction.
//!
//! Image builds, digest lookups, retagging and pushes all go through the
//! `BackendClient` trait. A `BackendConnector` hands out one client per
//! pipeline run; the client is released through a `ClientLease`.
//!
//! Implementations:
//! - `DockerCli`: drives the local `docker` binary

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub mod docker;
pub(crate) mod process;

pub use docker::{DockerCli, DockerConnector};

/// Append-only progress stream shared by the whole pipeline.
pub type OutputSink<'a> = &'a mut (dyn AsyncWrite + Unpin + Send);

/// Result type for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Error type for backend operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{binary} not found on PATH. {hint}")]
    BinaryNotFound { binary: String, hint: String },

    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} failed: {reason}")]
    CommandFailed { command: String, reason: String },

    #[error("unexpected output from {command}: {reason}")]
    InvalidOutput { command: String, reason: String },

    #[error("digest not found for {tag}")]
    EmptyDigest { tag: String },

    #[error("writing progress: {0}")]
    Output(#[source] std::io::Error),

    #[error("operation cancelled")]
    Cancelled,
}

/// Options for a single image build request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuildOptions {
    /// Build context directory
    pub context_path: PathBuf,
    /// Dockerfile path, relative to the context
    pub dockerfile: String,
    /// Tags applied to the resulting image
    pub tags: Vec<String>,
    /// Build arguments; `None` forwards the value from the build environment
    pub build_args: BTreeMap<String, Option<String>>,
    /// Images consulted as layer cache sources, in order
    pub cache_from: Vec<String>,
}

/// Version information reported by the backend server.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct ServerVersion {
    #[serde(rename = "Version", default)]
    pub version: String,

    #[serde(rename = "ApiVersion", default)]
    pub api_version: String,
}

/// Build backend client.
///
/// Every call may block on process or network I/O and must return
/// `BackendError::Cancelled` promptly once `cancel` fires.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Build an image, streaming progress to `out`.
    async fn build(
        &self,
        cancel: &CancellationToken,
        options: &ImageBuildOptions,
        out: OutputSink<'_>,
    ) -> BackendResult<()>;

    /// Content digest of a local image. An empty string means "unknown".
    async fn digest(&self, cancel: &CancellationToken, tag: &str) -> BackendResult<String>;

    /// Apply `target` as an additional tag of `source`.
    async fn tag(&self, cancel: &CancellationToken, source: &str, target: &str)
        -> BackendResult<()>;

    /// Push a tag to its registry, streaming progress to `out`.
    async fn push(
        &self,
        cancel: &CancellationToken,
        tag: &str,
        out: OutputSink<'_>,
    ) -> BackendResult<()>;

    /// Load an image tarball into the backend's image store.
    async fn load_image(
        &self,
        cancel: &CancellationToken,
        tarball: &Path,
        out: OutputSink<'_>,
    ) -> BackendResult<()>;

    /// Version of the backend server.
    async fn server_version(&self, cancel: &CancellationToken) -> BackendResult<ServerVersion>;

    /// Release client resources. Idempotent; never fails the caller.
    fn close(&self);
}

/// Acquires backend clients.
#[async_trait]
pub trait BackendConnector: Send + Sync {
    async fn connect(&self) -> BackendResult<Box<dyn BackendClient>>;
}

/// Scoped ownership of a backend client.
///
/// The client is closed exactly once, when the lease is dropped, whatever
/// path the holder leaves through.
pub struct ClientLease {
    client: Box<dyn BackendClient>,
}

impl ClientLease {
    pub fn new(client: Box<dyn BackendClient>) -> Self {
        Self { client }
    }
}

impl Deref for ClientLease {
    type Target = dyn BackendClient;

    fn deref(&self) -> &Self::Target {
        self.client.as_ref()
    }
}

impl Drop for ClientLease {
    fn drop(&mut self) {
        debug!("Releasing backend client");
        self.client.close();
    }
}
