//! Hermetic build strategy.
//!
//! Runs `bazel build` for an image tarball target and loads the tarball into
//! the daemon. The loaded image carries the repository tag rules_docker
//! derives from the target label.

use crate::backend::process::{self, find_binary};
use crate::backend::{BackendClient, BackendError, BackendResult, OutputSink};
use crate::types::BazelArtifact;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Environment variable overriding the bazel binary location.
pub const BAZEL_BINARY_ENV: &str = "HOIST_BAZEL";

/// Invokes the bazel binary.
#[derive(Debug, Clone, Default)]
pub struct BazelRunner {
    /// Explicit binary; looked up on first use when unset
    binary_path: Option<PathBuf>,
}

impl BazelRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific bazel binary.
    pub fn with_path(binary_path: PathBuf) -> Self {
        Self { binary_path: Some(binary_path) }
    }

    fn binary(&self) -> BackendResult<PathBuf> {
        match &self.binary_path {
            Some(path) => Ok(path.clone()),
            None => find_binary("bazel", BAZEL_BINARY_ENV).ok_or_else(|| {
                BackendError::BinaryNotFound {
                    binary: "bazel".to_string(),
                    hint: format!("Install bazel or set {} to its path", BAZEL_BINARY_ENV),
                }
            }),
        }
    }

    /// Run `bazel build <args> <target>` inside `workspace`.
    #[instrument(skip(self, cancel, out, spec), fields(target = %spec.target))]
    pub async fn build(
        &self,
        cancel: &CancellationToken,
        out: OutputSink<'_>,
        workspace: &Path,
        spec: &BazelArtifact,
    ) -> BackendResult<()> {
        let mut command = Command::new(self.binary()?);
        command.current_dir(workspace).arg("build").args(&spec.args).arg(&spec.target);
        process::run(command, cancel, Some(out)).await?;
        Ok(())
    }
}

/// Split a target label into package and target name.
///
/// `//app/web:image.tar` gives `("app/web", "image.tar")`. A label without
/// `:` names the file directly, so `//app/web.tar` gives `("app", "web.tar")`.
fn split_label(target: &str) -> (&str, &str) {
    let label = target.trim_start_matches("//");
    match label.split_once(':') {
        Some((package, name)) => (package, name),
        None => label.rsplit_once('/').unwrap_or(("", label)),
    }
}

/// Location of the tarball bazel writes for `target`, relative to the workspace.
pub fn tar_path(target: &str) -> PathBuf {
    let (package, name) = split_label(target);
    let mut path = PathBuf::from("bazel-bin");
    if !package.is_empty() {
        path.push(package);
    }
    path.push(name);
    path
}

/// Image reference a loaded tarball carries.
pub fn image_tag(target: &str) -> String {
    let (package, name) = split_label(target);
    let name = name.trim_end_matches(".tar");
    if package.is_empty() {
        format!("bazel:{}", name)
    } else {
        format!("bazel/{}:{}", package, name)
    }
}

/// Build a bazel artifact and load it into the daemon.
pub async fn build_bazel(
    client: &dyn BackendClient,
    runner: &BazelRunner,
    cancel: &CancellationToken,
    out: OutputSink<'_>,
    workspace: &Path,
    spec: &BazelArtifact,
) -> BackendResult<String> {
    runner.build(cancel, &mut *out, workspace, spec).await?;

    let tarball = workspace.join(tar_path(&spec.target));
    info!(tarball = %tarball.display(), "Loading bazel image");
    client.load_image(cancel, &tarball, out).await?;

    Ok(image_tag(&spec.target))
}
