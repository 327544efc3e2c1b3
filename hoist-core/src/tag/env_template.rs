//! Environment template tag policy.

use super::{TagError, TagOptions, Tagger};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::Path;
use tokio_util::sync::CancellationToken;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid regex"));

/// Expands `{{.NAME}}` placeholders into a tag.
///
/// `IMAGE_NAME`, `DIGEST`, `DIGEST_ALGO` and `DIGEST_HEX` come from the tag
/// request; any other name is read from the process environment.
#[derive(Debug, Clone)]
pub struct EnvTemplateTagger {
    template: String,
    /// Variables consulted before the process environment
    overrides: HashMap<String, String>,
}

impl EnvTemplateTagger {
    pub fn new(template: &str) -> Result<Self, TagError> {
        if template.trim().is_empty() {
            return Err(TagError::InvalidPolicy { reason: "template is empty".to_string() });
        }
        Ok(Self { template: template.to_string(), overrides: HashMap::new() })
    }

    /// Provide a variable without touching the process environment.
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(name.into(), value.into());
        self
    }

    fn lookup(&self, name: &str, options: &TagOptions) -> Option<String> {
        match name {
            "IMAGE_NAME" => Some(options.image_name.clone()),
            "DIGEST" => Some(options.digest.clone()),
            "DIGEST_ALGO" => Some(options.digest_algorithm().to_string()),
            "DIGEST_HEX" => Some(options.digest_hex().to_string()),
            _ => self.overrides.get(name).cloned().or_else(|| std::env::var(name).ok()),
        }
    }

    fn expand(&self, options: &TagOptions) -> Result<String, TagError> {
        let mut missing: Option<String> = None;
        let expanded = PLACEHOLDER.replace_all(&self.template, |caps: &Captures| {
            let name = &caps[1];
            self.lookup(name, options).unwrap_or_else(|| {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            })
        });

        match missing {
            Some(name) => Err(TagError::MissingVariable { name }),
            None => Ok(expanded.into_owned()),
        }
    }
}

#[async_trait]
impl Tagger for EnvTemplateTagger {
    async fn generate_fully_qualified_image_name(
        &self,
        _cancel: &CancellationToken,
        _workspace: &Path,
        options: &TagOptions,
    ) -> Result<String, TagError> {
        options.validate()?;
        self.expand(options)
    }
}
