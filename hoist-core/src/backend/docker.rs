//! Docker CLI backend.
//!
//! Drives the host `docker` binary. Builds, pushes and loads stream their
//! progress to the pipeline's output sink; queries capture stdout.

use super::process::{self, find_binary, search_path};
use super::{
    BackendClient, BackendConnector, BackendError, BackendResult, ImageBuildOptions, OutputSink,
    ServerVersion,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Environment variable overriding the docker binary location.
pub const DOCKER_BINARY_ENV: &str = "HOIST_DOCKER";

/// Backend client driving the `docker` command line.
pub struct DockerCli {
    binary_path: PathBuf,
    closed: AtomicBool,
}

impl DockerCli {
    /// Create a client, auto-detecting the docker binary.
    pub fn new() -> BackendResult<Self> {
        let binary_path =
            find_binary("docker", DOCKER_BINARY_ENV).ok_or_else(|| BackendError::BinaryNotFound {
                binary: "docker".to_string(),
                hint: format!("Install Docker or set {} to its path", DOCKER_BINARY_ENV),
            })?;
        Ok(Self::with_path(binary_path))
    }

    /// Create a client using a specific docker binary.
    pub fn with_path(binary_path: PathBuf) -> Self {
        Self { binary_path, closed: AtomicBool::new(false) }
    }

    fn command(&self) -> Command {
        Command::new(&self.binary_path)
    }

    /// Arguments for `docker build`.
    pub fn build_args(options: &ImageBuildOptions) -> Vec<String> {
        let mut args = vec!["build".to_string()];
        for tag in &options.tags {
            args.push("--tag".to_string());
            args.push(tag.clone());
        }
        // A relative Dockerfile path is resolved against the context, not the cwd.
        args.push("--file".to_string());
        args.push(options.context_path.join(&options.dockerfile).to_string_lossy().to_string());
        for (name, value) in &options.build_args {
            args.push("--build-arg".to_string());
            match value {
                Some(value) => args.push(format!("{}={}", name, value)),
                None => args.push(name.clone()),
            }
        }
        for image in &options.cache_from {
            args.push("--cache-from".to_string());
            args.push(image.clone());
        }
        args.push(options.context_path.to_string_lossy().to_string());
        args
    }
}

#[async_trait]
impl BackendClient for DockerCli {
    #[instrument(skip_all, fields(tags = ?options.tags))]
    async fn build(
        &self,
        cancel: &CancellationToken,
        options: &ImageBuildOptions,
        out: OutputSink<'_>,
    ) -> BackendResult<()> {
        let mut command = self.command();
        command.args(Self::build_args(options));
        process::run(command, cancel, Some(out)).await?;
        Ok(())
    }

    #[instrument(skip(self, cancel))]
    async fn digest(&self, cancel: &CancellationToken, tag: &str) -> BackendResult<String> {
        let mut command = self.command();
        command.args(["image", "inspect", "--format", "{{.Id}}", tag]);
        let output = process::run(command, cancel, None).await?;
        let digest = output.lines().next().unwrap_or_default().trim().to_string();
        debug!(digest = %digest, "Resolved image digest");
        Ok(digest)
    }

    #[instrument(skip(self, cancel))]
    async fn tag(
        &self,
        cancel: &CancellationToken,
        source: &str,
        target: &str,
    ) -> BackendResult<()> {
        let mut command = self.command();
        command.args(["tag", source, target]);
        process::run(command, cancel, None).await?;
        Ok(())
    }

    #[instrument(skip(self, cancel, out))]
    async fn push(
        &self,
        cancel: &CancellationToken,
        tag: &str,
        out: OutputSink<'_>,
    ) -> BackendResult<()> {
        let mut command = self.command();
        command.args(["push", tag]);
        process::run(command, cancel, Some(out)).await?;
        Ok(())
    }

    #[instrument(skip(self, cancel, out))]
    async fn load_image(
        &self,
        cancel: &CancellationToken,
        tarball: &Path,
        out: OutputSink<'_>,
    ) -> BackendResult<()> {
        let mut command = self.command();
        command.arg("load").arg("--input").arg(tarball);
        process::run(command, cancel, Some(out)).await?;
        Ok(())
    }

    async fn server_version(&self, cancel: &CancellationToken) -> BackendResult<ServerVersion> {
        let mut command = self.command();
        command.args(["version", "--format", "{{json .Server}}"]);
        let output = process::run(command, cancel, None).await?;
        serde_json::from_str(output.trim()).map_err(|e| BackendError::InvalidOutput {
            command: "docker version".to_string(),
            reason: e.to_string(),
        })
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(binary = %self.binary_path.display(), "Docker client closed");
        }
    }
}

/// Connector producing `DockerCli` clients.
#[derive(Debug, Clone, Default)]
pub struct DockerConnector {
    /// Explicit docker binary; auto-detected when unset
    pub binary_path: Option<PathBuf>,
}

#[async_trait]
impl BackendConnector for DockerConnector {
    async fn connect(&self) -> BackendResult<Box<dyn BackendClient>> {
        let client = match &self.binary_path {
            Some(path) => DockerCli::with_path(resolve(path)?),
            None => DockerCli::new()?,
        };
        info!(binary = %client.binary_path.display(), "Using docker CLI backend");
        Ok(Box::new(client))
    }
}

/// Accept either a path to the binary or a bare name looked up on `PATH`.
fn resolve(path: &Path) -> BackendResult<PathBuf> {
    let bare = path.components().count() == 1 && path.parent() == Some(Path::new(""));
    let resolved = if bare { search_path(path) } else { path.is_file().then(|| path.to_path_buf()) };
    resolved.ok_or_else(|| BackendError::BinaryNotFound {
        binary: path.display().to_string(),
        hint: "Check the configured docker path".to_string(),
    })
}
