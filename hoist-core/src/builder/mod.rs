//! Image build orchestration.
//!
//! `LocalBuilder` drives artifacts through build, digest, tag and push.
//! `dispatch` picks the build strategy for each artifact; `bazel` holds the
//! hermetic build strategy.

pub mod bazel;
pub mod dispatch;
pub mod local;

pub use bazel::BazelRunner;
pub use dispatch::{build_docker, random_id, run_build_for_artifact};
pub use local::{LocalBuilder, BUILDER_LABEL, DOCKER_API_VERSION_LABEL};
