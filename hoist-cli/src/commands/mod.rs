//! CLI command implementations

pub mod build;
pub mod check;
pub mod labels;

pub use build::build;
pub use check::check;
pub use labels::labels;
