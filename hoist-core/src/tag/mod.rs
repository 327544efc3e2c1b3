//! Tag policies.
//!
//! A `Tagger` turns an image name and its content digest into the final,
//! fully-qualified reference an artifact is published under.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tokio_util::sync::CancellationToken;

mod checksum;
mod datetime;
mod env_template;

pub use checksum::ChecksumTagger;
pub use datetime::DateTimeTagger;
pub use env_template::EnvTemplateTagger;

/// Error type for tag generation.
#[derive(Debug, thiserror::Error)]
pub enum TagError {
    #[error("image name is empty")]
    EmptyImageName,

    #[error("digest is empty for image {image}")]
    EmptyDigest { image: String },

    #[error("template references undefined variable {name}")]
    MissingVariable { name: String },

    #[error("invalid tag policy: {reason}")]
    InvalidPolicy { reason: String },

    #[error("tag generation cancelled")]
    Cancelled,
}

/// Input to a tag policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagOptions {
    pub image_name: String,
    pub digest: String,
}

impl TagOptions {
    /// Reject requests a policy cannot produce a reference for.
    pub fn validate(&self) -> Result<(), TagError> {
        if self.image_name.trim().is_empty() {
            return Err(TagError::EmptyImageName);
        }
        if self.digest.trim().is_empty() {
            return Err(TagError::EmptyDigest { image: self.image_name.clone() });
        }
        Ok(())
    }

    /// Digest algorithm ("sha256" for "sha256:abc..."), empty when absent.
    pub fn digest_algorithm(&self) -> &str {
        self.digest.split_once(':').map(|(algo, _)| algo).unwrap_or_default()
    }

    /// Digest without its algorithm prefix.
    pub fn digest_hex(&self) -> &str {
        self.digest.split_once(':').map(|(_, hex)| hex).unwrap_or(&self.digest)
    }
}

/// Tag generation policy.
#[async_trait]
pub trait Tagger: Send + Sync {
    /// Compute the final reference for an artifact built from `workspace`.
    async fn generate_fully_qualified_image_name(
        &self,
        cancel: &CancellationToken,
        workspace: &Path,
        options: &TagOptions,
    ) -> Result<String, TagError>;
}

/// Declarative tag policy selection.
///
/// Written as a single-key map, e.g. `sha256: {}` or
/// `envTemplate: {template: "{{.IMAGE_NAME}}:dev"}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawTagPolicy")]
pub enum TagPolicy {
    Sha256 {},
    DateTime { format: Option<String>, utc: bool },
    EnvTemplate { template: String },
}

/// Tag policy as written in a pipeline file; exactly one field must be set.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawTagPolicy {
    #[serde(default)]
    sha256: Option<Sha256Policy>,

    #[serde(default)]
    date_time: Option<DateTimePolicy>,

    #[serde(default)]
    env_template: Option<EnvTemplatePolicy>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Sha256Policy {}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DateTimePolicy {
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    utc: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnvTemplatePolicy {
    template: String,
}

impl TryFrom<RawTagPolicy> for TagPolicy {
    type Error = TagError;

    fn try_from(raw: RawTagPolicy) -> Result<Self, Self::Error> {
        let mut selected = Vec::with_capacity(1);
        if let Some(Sha256Policy {}) = raw.sha256 {
            selected.push(TagPolicy::Sha256 {});
        }
        if let Some(DateTimePolicy { format, utc }) = raw.date_time {
            selected.push(TagPolicy::DateTime { format, utc });
        }
        if let Some(EnvTemplatePolicy { template }) = raw.env_template {
            selected.push(TagPolicy::EnvTemplate { template });
        }

        match selected.len() {
            1 => Ok(selected.remove(0)),
            0 => Err(TagError::InvalidPolicy {
                reason: "set one of sha256, dateTime or envTemplate".to_string(),
            }),
            _ => Err(TagError::InvalidPolicy {
                reason: "only one of sha256, dateTime or envTemplate may be set".to_string(),
            }),
        }
    }
}

impl Default for TagPolicy {
    fn default() -> Self {
        TagPolicy::Sha256 {}
    }
}

impl TagPolicy {
    /// Instantiate the tagger this policy describes.
    pub fn tagger(&self) -> Result<Box<dyn Tagger>, TagError> {
        Ok(match self {
            TagPolicy::Sha256 {} => Box::new(ChecksumTagger),
            TagPolicy::DateTime { format, utc } => {
                let mut tagger = DateTimeTagger::new(format.clone());
                if *utc {
                    tagger = tagger.utc();
                }
                Box::new(tagger)
            }
            TagPolicy::EnvTemplate { template } => Box::new(EnvTemplateTagger::new(template)?),
        })
    }
}

/// Repository part of an image name, dropping any tag or digest it already carries.
pub(crate) fn repository(image_name: &str) -> &str {
    let name = image_name.split_once('@').map_or(image_name, |(name, _)| name);
    match name.rsplit_once(':') {
        // A colon before the last slash belongs to a registry port.
        Some((repo, tag)) if !tag.contains('/') => repo,
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_parts() {
        let opts = TagOptions { image_name: "app".into(), digest: "sha256:deadbeef".into() };
        assert_eq!(opts.digest_algorithm(), "sha256");
        assert_eq!(opts.digest_hex(), "deadbeef");

        let bare = TagOptions { image_name: "app".into(), digest: "deadbeef".into() };
        assert_eq!(bare.digest_algorithm(), "");
        assert_eq!(bare.digest_hex(), "deadbeef");
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        let opts = TagOptions { image_name: " ".into(), digest: "sha256:1".into() };
        assert!(matches!(opts.validate(), Err(TagError::EmptyImageName)));

        let opts = TagOptions { image_name: "app".into(), digest: String::new() };
        assert!(matches!(opts.validate(), Err(TagError::EmptyDigest { .. })));
    }

    #[test]
    fn test_repository_strips_existing_tag() {
        assert_eq!(repository("app"), "app");
        assert_eq!(repository("app:v1"), "app");
        assert_eq!(repository("localhost:5000/app"), "localhost:5000/app");
        assert_eq!(repository("localhost:5000/app:v1"), "localhost:5000/app");
    }

    #[test]
    fn test_repository_strips_existing_digest() {
        assert_eq!(repository("app@sha256:abc"), "app");
        assert_eq!(repository("app:v1@sha256:abc"), "app");
        assert_eq!(repository("localhost:5000/app@sha256:abc"), "localhost:5000/app");
    }

    #[test]
    fn test_policy_deserializes_from_yaml() {
        let policy: TagPolicy = serde_yaml::from_str("sha256: {}").unwrap();
        assert_eq!(policy, TagPolicy::Sha256 {});

        let policy: TagPolicy =
            serde_yaml::from_str("dateTime:\n  format: \"%Y%m%d\"\n  utc: true").unwrap();
        assert_eq!(policy, TagPolicy::DateTime { format: Some("%Y%m%d".into()), utc: true });

        let policy: TagPolicy =
            serde_yaml::from_str("envTemplate:\n  template: \"{{.IMAGE_NAME}}:dev\"").unwrap();
        assert!(policy.tagger().is_ok());

        let policy: TagPolicy = serde_yaml::from_str("dateTime: {}").unwrap();
        assert_eq!(policy, TagPolicy::DateTime { format: None, utc: false });
    }

    #[test]
    fn test_policy_requires_exactly_one_kind() {
        assert!(serde_yaml::from_str::<TagPolicy>("{}").is_err());
        assert!(serde_yaml::from_str::<TagPolicy>("sha256: {}\ndateTime: {}").is_err());
        assert!(serde_yaml::from_str::<TagPolicy>("gitCommit: {}").is_err());
    }

    #[test]
    fn test_default_policy_is_checksum() {
        assert_eq!(TagPolicy::default(), TagPolicy::Sha256 {});
    }
}
