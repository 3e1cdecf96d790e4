//! Log subscriber setup for hosts embedding a console session.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::errors::{ConsoleError, ConsoleResult};

/// Install a `fmt` subscriber filtered by `RUST_LOG`, falling back to `level`.
///
/// Returns `false` when the host already installed a global subscriber.
pub fn init_logging(level: &str, debug: bool) -> ConsoleResult<bool> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level
            .parse()
            .map_err(|_| ConsoleError::InvalidLogLevel(level.to_string()))?
    };

    let installed = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok();

    Ok(installed)
}
