//! Build time tag policy.

use super::{repository, TagError, TagOptions, Tagger};
use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use std::fmt::Write;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Default timestamp layout, e.g. `2024-03-09_14-05-11.042_+01:00`.
pub const DEFAULT_FORMAT: &str = "%Y-%m-%d_%H-%M-%S%.3f_%:z";

/// Tags an image with the time it was tagged.
#[derive(Debug, Clone)]
pub struct DateTimeTagger {
    format: String,
    utc: bool,
    /// Fixed clock for reproducible output
    now: Option<DateTime<Utc>>,
}

impl DateTimeTagger {
    pub fn new(format: Option<String>) -> Self {
        Self { format: format.unwrap_or_else(|| DEFAULT_FORMAT.to_string()), utc: false, now: None }
    }

    /// Render timestamps in UTC instead of local time.
    pub fn utc(mut self) -> Self {
        self.utc = true;
        self
    }

    /// Pin the clock.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    fn timestamp(&self) -> Result<String, TagError> {
        let now = self.now.unwrap_or_else(Utc::now);
        let mut rendered = String::new();
        let written = if self.utc {
            write!(rendered, "{}", now.format(&self.format))
        } else {
            write!(rendered, "{}", now.with_timezone(&Local).format(&self.format))
        };
        written.map_err(|_| TagError::InvalidPolicy {
            reason: format!("format {:?} is not a valid timestamp layout", self.format),
        })?;
        // Docker tags cannot contain ':' or '+'.
        Ok(rendered.replace([':', '+'], ""))
    }
}

#[async_trait]
impl Tagger for DateTimeTagger {
    async fn generate_fully_qualified_image_name(
        &self,
        _cancel: &CancellationToken,
        _workspace: &Path,
        options: &TagOptions,
    ) -> Result<String, TagError> {
        options.validate()?;
        let timestamp = self.timestamp()?;
        if timestamp.is_empty() {
            return Err(TagError::InvalidPolicy {
                reason: format!("format {:?} renders an empty tag", self.format),
            });
        }
        Ok(format!("{}:{}", repository(&options.image_name), timestamp))
    }
}
