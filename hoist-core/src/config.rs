//! Configuration management.
//!
//! `BuildConfig` holds the process-scoped build settings. `PipelineConfig` is
//! the parsed form of a `hoist.yaml` pipeline file.

use crate::error::{HoistError, Result};
use crate::tag::TagPolicy;
use crate::types::{ArtifactSpec, RawArtifact};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Default pipeline file name.
pub const DEFAULT_PIPELINE_FILE: &str = "hoist.yaml";

/// Process-scoped build settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildConfig {
    /// Name of the cluster context images are built for
    pub cluster_context: String,

    /// Skip publishing; derived from the cluster's locality when unset
    pub skip_push: Option<bool>,
}

impl BuildConfig {
    pub fn new(cluster_context: impl Into<String>) -> Self {
        Self { cluster_context: cluster_context.into(), skip_push: None }
    }

    pub fn with_skip_push(mut self, skip_push: bool) -> Self {
        self.skip_push = Some(skip_push);
        self
    }
}

/// Parsed and validated pipeline file.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Cluster context declared in the file
    pub kube_context: Option<String>,

    /// Tag policy applied to every artifact
    pub tag_policy: TagPolicy,

    /// Explicit push setting from `build.local.skipPush`
    pub skip_push: Option<bool>,

    /// Artifacts in build order, workspaces resolved against the file's directory
    pub artifacts: Vec<ArtifactSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PipelineFile {
    #[serde(default)]
    kube_context: Option<String>,

    #[serde(default)]
    tag_policy: TagPolicy,

    build: BuildSection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct BuildSection {
    #[serde(default)]
    local: LocalSection,

    artifacts: Vec<RawArtifact>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct LocalSection {
    #[serde(default)]
    skip_push: Option<bool>,
}

impl PipelineConfig {
    /// Parse a pipeline from YAML. Relative workspaces are resolved against `base_dir`.
    #[instrument(skip(content))]
    pub fn parse(content: &str, base_dir: &Path) -> Result<Self> {
        let file: PipelineFile = serde_yaml::from_str(content)
            .map_err(|e| HoistError::InvalidConfig { reason: e.to_string() })?;

        if file.build.artifacts.is_empty() {
            return Err(HoistError::InvalidConfig {
                reason: "build.artifacts must list at least one artifact".to_string(),
            });
        }

        let mut seen = HashSet::new();
        let mut artifacts = Vec::with_capacity(file.build.artifacts.len());
        for raw in file.build.artifacts {
            let mut artifact = ArtifactSpec::try_from(raw)?;
            if !seen.insert(artifact.image_name.clone()) {
                return Err(HoistError::Configuration {
                    image: artifact.image_name,
                    reason: "image name declared more than once".to_string(),
                });
            }
            if artifact.workspace.is_relative() {
                artifact.workspace = normalize(&base_dir.join(&artifact.workspace));
            }
            debug!(image = %artifact.image_name, kind = artifact.kind.name(), "Loaded artifact");
            artifacts.push(artifact);
        }

        Ok(Self {
            kube_context: file.kube_context.filter(|c| !c.trim().is_empty()),
            tag_policy: file.tag_policy,
            skip_push: file.build.local.skip_push,
            artifacts,
        })
    }

    /// Load a pipeline file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| HoistError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        let config = Self::parse(&content, &base_dir)?;
        info!(path = %path.display(), artifacts = config.artifacts.len(), "Loaded pipeline");
        Ok(config)
    }

    /// Build settings for this pipeline. `kube_context` overrides the file's context
    /// and `skip_push` overrides `build.local.skipPush`.
    pub fn build_config(
        &self,
        kube_context: Option<&str>,
        skip_push: Option<bool>,
    ) -> Result<BuildConfig> {
        let context = kube_context
            .map(str::to_string)
            .or_else(|| self.kube_context.clone())
            .ok_or_else(|| HoistError::InvalidConfig {
                reason: "no cluster context: set kubeContext or pass --kube-context".to_string(),
            })?;
        Ok(BuildConfig { cluster_context: context, skip_push: skip_push.or(self.skip_push) })
    }
}

/// Drop `.` components so resolved workspaces read cleanly in logs.
fn normalize(path: &Path) -> PathBuf {
    let normalized: PathBuf =
        path.components().filter(|c| !matches!(c, std::path::Component::CurDir)).collect();
    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BuildKind;

    const PIPELINE: &str = r#"
kubeContext: minikube
tagPolicy:
  envTemplate:
    template: "{{.IMAGE_NAME}}:{{.DIGEST_HEX}}"
build:
  local:
    skipPush: false
  artifacts:
    - imageName: app
      docker:
        dockerfilePath: Dockerfile
    - imageName: svc
      workspace: services/svc
      bazel:
        target: //svc:image.tar
"#;

    #[test]
    fn test_parse_pipeline() {
        let config = PipelineConfig::parse(PIPELINE, Path::new("/work")).unwrap();
        assert_eq!(config.kube_context.as_deref(), Some("minikube"));
        assert_eq!(config.skip_push, Some(false));
        assert!(matches!(config.tag_policy, TagPolicy::EnvTemplate { .. }));
        assert_eq!(config.artifacts.len(), 2);
        assert_eq!(config.artifacts[0].image_name, "app");
        assert_eq!(config.artifacts[0].workspace, PathBuf::from("/work"));
        assert_eq!(config.artifacts[1].workspace, PathBuf::from("/work/services/svc"));
        assert!(matches!(config.artifacts[1].kind, BuildKind::Bazel(_)));
    }

    #[test]
    fn test_defaults() {
        let yaml = "build:\n  artifacts:\n    - imageName: app\n      docker: {}\n";
        let config = PipelineConfig::parse(yaml, Path::new("/work")).unwrap();
        assert_eq!(config.kube_context, None);
        assert_eq!(config.skip_push, None);
        assert_eq!(config.tag_policy, TagPolicy::Sha256 {});
    }

    #[test]
    fn test_artifact_without_kind_is_configuration_error() {
        let yaml = "build:\n  artifacts:\n    - imageName: app\n";
        let err = PipelineConfig::parse(yaml, Path::new(".")).unwrap_err();
        assert!(matches!(err, HoistError::Configuration { ref image, .. } if image == "app"));
    }

    #[test]
    fn test_tag_policy_must_name_one_kind() {
        let yaml = "tagPolicy:\n  sha256: {}\n  dateTime: {}\nbuild:\n  artifacts:\n    - imageName: app\n      docker: {}\n";
        let err = PipelineConfig::parse(yaml, Path::new(".")).unwrap_err();
        assert!(matches!(err, HoistError::InvalidConfig { .. }));

        let yaml = "tagPolicy:\n  dateTime:\n    utc: true\nbuild:\n  artifacts:\n    - imageName: app\n      docker: {}\n";
        let config = PipelineConfig::parse(yaml, Path::new(".")).unwrap();
        assert_eq!(config.tag_policy, TagPolicy::DateTime { format: None, utc: true });
    }

    #[test]
    fn test_duplicate_image_names_are_rejected() {
        let yaml = "build:\n  artifacts:\n    - imageName: app\n      docker: {}\n    - imageName: app\n      docker: {}\n";
        let err = PipelineConfig::parse(yaml, Path::new(".")).unwrap_err();
        assert!(matches!(err, HoistError::Configuration { .. }));
    }

    #[test]
    fn test_empty_artifact_list_is_rejected() {
        let err = PipelineConfig::parse("build:\n  artifacts: []\n", Path::new(".")).unwrap_err();
        assert!(matches!(err, HoistError::InvalidConfig { .. }));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let yaml = "build:\n  artifacts:\n    - imageName: app\n      docker: {}\n      kaniko: {}\n";
        assert!(PipelineConfig::parse(yaml, Path::new(".")).is_err());
    }

    #[test]
    fn test_build_config_overrides() {
        let config = PipelineConfig::parse(PIPELINE, Path::new("/work")).unwrap();

        let from_file = config.build_config(None, None).unwrap();
        assert_eq!(from_file, BuildConfig { cluster_context: "minikube".into(), skip_push: Some(false) });

        let overridden = config.build_config(Some("gke_prod"), Some(true)).unwrap();
        assert_eq!(overridden, BuildConfig::new("gke_prod").with_skip_push(true));
    }

    #[test]
    fn test_build_config_requires_a_context() {
        let yaml = "build:\n  artifacts:\n    - imageName: app\n      docker: {}\n";
        let config = PipelineConfig::parse(yaml, Path::new(".")).unwrap();
        assert!(matches!(config.build_config(None, None), Err(HoistError::InvalidConfig { .. })));
    }

    #[test]
    fn test_relative_base_keeps_a_usable_workspace() {
        let yaml = "build:\n  artifacts:\n    - imageName: app\n      docker: {}\n";
        let config = PipelineConfig::parse(yaml, Path::new(".")).unwrap();
        assert_eq!(config.artifacts[0].workspace, PathBuf::from("."));
    }

    #[test]
    fn test_load_missing_file() {
        let err = PipelineConfig::load(Path::new("/nonexistent/hoist.yaml")).unwrap_err();
        assert!(matches!(err, HoistError::FileReadError { .. }));
    }
}
