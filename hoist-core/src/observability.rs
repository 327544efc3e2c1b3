//! Logging setup.
//!
//! Diagnostics go to stderr through `tracing`. Stdout is left to the
//! pipeline's progress output.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter, e.g. `hoist_core=debug`.
pub const LOG_ENV: &str = "RUST_LOG";

/// Install the global subscriber.
///
/// `default_level` applies when `RUST_LOG` is unset. Fails if a global
/// subscriber is already installed.
pub fn init(default_level: tracing::Level) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::default().add_directive(default_level.into()));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .try_init()?;

    tracing::debug!("Observability initialized");
    Ok(())
}
