//! Error types for hoist.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.
//! Pipeline errors always name the stage and the artifact that failed.

use crate::backend::BackendError;
use crate::tag::TagError;
use std::fmt;
use thiserror::Error;

/// Result type alias for hoist operations.
pub type Result<T> = std::result::Result<T, HoistError>;

/// Pipeline step that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Build,
    Digest,
    GenerateTag,
    Tag,
    Push,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phrase = match self {
            Stage::Build => "building",
            Stage::Digest => "fetching digest for",
            Stage::GenerateTag => "generating tag for",
            Stage::Tag => "tagging",
            Stage::Push => "pushing",
        };
        f.write_str(phrase)
    }
}

/// Main error type for hoist.
#[derive(Error, Debug)]
pub enum HoistError {
    // Backend acquisition
    #[error("getting backend client: {source}")]
    ClientInit {
        #[source]
        source: BackendError,
    },

    // Artifact errors
    #[error("invalid artifact [{image}]: {reason}")]
    Configuration { image: String, reason: String },

    #[error("{stage} [{image}]: {source}")]
    Backend {
        stage: Stage,
        image: String,
        #[source]
        source: BackendError,
    },

    #[error("{stage} [{image}]: {source}")]
    Registry {
        stage: Stage,
        image: String,
        #[source]
        source: BackendError,
    },

    #[error("{stage} [{image}]: {source}")]
    Tagging {
        stage: Stage,
        image: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("cancelled while {stage} [{image}]")]
    Cancelled { stage: Stage, image: String },

    // Output sink errors
    #[error("writing {what}: {source}")]
    Io {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    // Pipeline file errors
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("file read error: {path}: {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl HoistError {
    /// Classify a backend failure raised while `image` was at `stage`.
    pub fn from_backend(stage: Stage, image: &str, err: BackendError) -> Self {
        let image = image.to_string();
        match (stage, err) {
            (stage, BackendError::Cancelled) => Self::Cancelled { stage, image },
            // The sink failed, not the backend.
            (stage, BackendError::Output(source)) => {
                let what = match stage {
                    Stage::Build => "build progress",
                    Stage::Push => "push progress",
                    _ => "progress",
                };
                Self::Io { what, source }
            }
            (Stage::Build, source) => Self::Backend { stage, image, source },
            (Stage::Digest | Stage::Push, source) => Self::Registry { stage, image, source },
            (Stage::GenerateTag | Stage::Tag, source) => {
                Self::Tagging { stage, image, source: Box::new(source) }
            }
        }
    }

    /// Classify a tag policy failure for `image`.
    pub fn from_tagger(image: &str, err: TagError) -> Self {
        let image = image.to_string();
        match err {
            TagError::Cancelled => Self::Cancelled { stage: Stage::GenerateTag, image },
            source => Self::Tagging { stage: Stage::GenerateTag, image, source: Box::new(source) },
        }
    }

    /// Image name of the artifact this error belongs to, if any.
    pub fn image(&self) -> Option<&str> {
        match self {
            Self::Configuration { image, .. }
            | Self::Backend { image, .. }
            | Self::Registry { image, .. }
            | Self::Tagging { image, .. }
            | Self::Cancelled { image, .. } => Some(image),
            _ => None,
        }
    }
}
