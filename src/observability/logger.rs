//! Tracing subscriber setup for the warehousedb binary
//!
//! Events go to stderr through a `fmt` layer. `RUST_LOG` takes precedence
//! over the configured level.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use super::{ObservabilityError, ObservabilityResult};

const DEFAULT_LEVEL: &str = "info";

/// Logging configuration for the binary.
#[derive(Debug, Clone, Copy)]
pub struct LogConfig<'a> {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info` or
    /// `warehousedb=debug,tower_http=info`.
    pub level: &'a str,
    /// Colored output.
    pub ansi: bool,
}

impl Default for LogConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
            ansi: true,
        }
    }
}

/// Builds the event filter for `level`, letting `RUST_LOG` override it.
pub fn build_filter(level: &str) -> ObservabilityResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level)
        .map_err(|e| ObservabilityError::new(format!("invalid log level '{}': {}", level, e)))
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging(config: LogConfig<'_>) -> ObservabilityResult<()> {
    let filter = build_filter(config.level)?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(config.ansi)
                .with_target(true)
                .with_filter(filter),
        )
        .try_init()
        .map_err(|e| ObservabilityError::new(format!("failed to install subscriber: {}", e)))
}
