//! Content checksum tag policy.

use super::{repository, TagError, TagOptions, Tagger};
use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Tags an image with the hex part of its content digest.
///
/// `app` with digest `sha256:deadbeef` becomes `app:deadbeef`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumTagger;

#[async_trait]
impl Tagger for ChecksumTagger {
    async fn generate_fully_qualified_image_name(
        &self,
        _cancel: &CancellationToken,
        _workspace: &Path,
        options: &TagOptions,
    ) -> Result<String, TagError> {
        options.validate()?;
        Ok(format!("{}:{}", repository(&options.image_name), options.digest_hex()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn tag(image: &str, digest: &str) -> Result<String, TagError> {
        let options = TagOptions { image_name: image.to_string(), digest: digest.to_string() };
        ChecksumTagger
            .generate_fully_qualified_image_name(&CancellationToken::new(), Path::new("."), &options)
            .await
    }

    #[tokio::test]
    async fn test_checksum_tag() {
        assert_eq!(tag("app", "sha256:deadbeef").await.unwrap(), "app:deadbeef");
        assert_eq!(
            tag("gcr.io/team/app", "sha256:0123abcd").await.unwrap(),
            "gcr.io/team/app:0123abcd"
        );
    }

    #[tokio::test]
    async fn test_checksum_replaces_existing_tag() {
        assert_eq!(tag("localhost:5000/app:v1", "sha256:ff").await.unwrap(), "localhost:5000/app:ff");
    }

    #[tokio::test]
    async fn test_checksum_rejects_empty_digest() {
        assert!(matches!(tag("app", "").await, Err(TagError::EmptyDigest { .. })));
    }
}
