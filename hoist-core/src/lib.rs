//! Hoist Core Library
//!
//! Builds container images on the host, tags them by content and publishes
//! them for a target cluster.

pub mod backend;
pub mod builder;
pub mod cluster;
pub mod config;
pub mod error;
pub mod observability;
pub mod tag;
pub mod types;

// Re-export commonly used items
pub use backend::{BackendClient, BackendConnector, DockerConnector, OutputSink};
pub use builder::LocalBuilder;
pub use config::{BuildConfig, PipelineConfig};
pub use error::{HoistError, Result};
pub use observability::init as init_observability;
pub use tag::{TagPolicy, Tagger};
pub use types::{ArtifactSpec, Build, BuildKind};
