//! Core types for hoist.

pub mod artifact;

use serde::Serialize;
use std::fmt;

pub use artifact::{ArtifactSpec, BazelArtifact, BuildKind, DockerArtifact, RawArtifact};

/// A completed artifact: the image name and the tag it was published under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub image_name: String,
    pub tag: String,
}

/// Progress of a single artifact through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    Pending,
    Built,
    Digested,
    Tagged,
    Pushed,
    Skipped,
    Complete,
    Failed,
}

impl fmt::Display for ArtifactState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArtifactState::Pending => "pending",
            ArtifactState::Built => "built",
            ArtifactState::Digested => "digested",
            ArtifactState::Tagged => "tagged",
            ArtifactState::Pushed => "pushed",
            ArtifactState::Skipped => "skipped",
            ArtifactState::Complete => "complete",
            ArtifactState::Failed => "failed",
        };
        f.write_str(s)
    }
}
