//! Tracing subscriber setup
//!
//! The level comes from `RUST_LOG` when set (e.g. `RUST_LOG=authlab_core=debug`)
//! and defaults to `info` otherwise.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, compact, to stderr
    #[default]
    Compact,
    /// One JSON object per line, to stderr
    Json,
}

/// Install the global subscriber
///
/// Safe to call more than once; returns whether this call installed it.
pub fn init_tracing(format: LogFormat) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = match format {
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .compact(),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .json(),
            )
            .try_init(),
    };

    match installed {
        Ok(()) => {
            tracing::debug!(?format, "Logging initialized");
            true
        }
        Err(err) => {
            tracing::debug!(error = %err, "Global subscriber already set, keeping it");
            false
        }
    }
}
