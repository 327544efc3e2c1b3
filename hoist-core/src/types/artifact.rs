//! Artifact types.
//!
//! An artifact is one buildable description yielding exactly one image.
//! The build kind is a sum type: the raw, deserialized form may carry zero or
//! several kind payloads and is rejected on conversion.

use crate::error::HoistError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A validated artifact.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawArtifact")]
pub struct ArtifactSpec {
    /// Image name (e.g., "app" or "gcr.io/team/app")
    pub image_name: String,

    /// Workspace the build runs in
    pub workspace: PathBuf,

    /// How the image is produced
    pub kind: BuildKind,
}

/// Build strategy of an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildKind {
    /// Dockerfile build on the container daemon
    Docker(DockerArtifact),
    /// Hermetic build through bazel, loaded into the daemon afterwards
    Bazel(BazelArtifact),
}

impl BuildKind {
    pub fn name(&self) -> &'static str {
        match self {
            BuildKind::Docker(_) => "docker",
            BuildKind::Bazel(_) => "bazel",
        }
    }
}

/// Dockerfile build parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DockerArtifact {
    /// Path to the Dockerfile, relative to the workspace
    #[serde(default = "default_dockerfile")]
    pub dockerfile_path: String,

    /// Build arguments; a `null` value forwards the variable from the build environment
    #[serde(default)]
    pub build_args: BTreeMap<String, Option<String>>,

    /// Images used as cache sources, in priority order
    #[serde(default)]
    pub cache_from: Vec<String>,
}

impl Default for DockerArtifact {
    fn default() -> Self {
        Self {
            dockerfile_path: default_dockerfile(),
            build_args: BTreeMap::new(),
            cache_from: Vec::new(),
        }
    }
}

fn default_dockerfile() -> String {
    "Dockerfile".to_string()
}

/// Bazel build parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BazelArtifact {
    /// Image tarball target, e.g. "//app:image.tar"
    pub target: String,

    /// Extra arguments passed to `bazel build`
    #[serde(default)]
    pub args: Vec<String>,
}

/// Artifact as written in a pipeline file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawArtifact {
    pub image_name: String,

    #[serde(default)]
    pub workspace: Option<PathBuf>,

    #[serde(default)]
    pub docker: Option<DockerArtifact>,

    #[serde(default)]
    pub bazel: Option<BazelArtifact>,
}

impl TryFrom<RawArtifact> for ArtifactSpec {
    type Error = HoistError;

    fn try_from(raw: RawArtifact) -> Result<Self, Self::Error> {
        let image_name = raw.image_name.trim().to_string();
        let invalid = |reason: &str| HoistError::Configuration {
            image: if image_name.is_empty() { "<unnamed>".to_string() } else { image_name.clone() },
            reason: reason.to_string(),
        };

        if image_name.is_empty() {
            return Err(invalid("imageName is required"));
        }

        let kind = match (raw.docker, raw.bazel) {
            (Some(docker), None) => BuildKind::Docker(docker),
            (None, Some(bazel)) => {
                if !bazel.target.ends_with(".tar") {
                    return Err(invalid(&format!(
                        "bazel target {} must name an image tarball (*.tar)",
                        bazel.target
                    )));
                }
                BuildKind::Bazel(bazel)
            }
            (None, None) => return Err(invalid("undefined artifact type: set docker or bazel")),
            (Some(_), Some(_)) => {
                return Err(invalid("conflicting artifact types: set only one of docker or bazel"))
            }
        };

        Ok(ArtifactSpec {
            image_name,
            workspace: raw.workspace.unwrap_or_else(|| PathBuf::from(".")),
            kind,
        })
    }
}

impl ArtifactSpec {
    /// Dockerfile artifact with default settings.
    pub fn docker(image_name: impl Into<String>, workspace: impl Into<PathBuf>) -> Self {
        Self {
            image_name: image_name.into(),
            workspace: workspace.into(),
            kind: BuildKind::Docker(DockerArtifact::default()),
        }
    }
}
