//! Observability subsystem for warehousedb
//!
//! Code logs through `tracing` macros; this module only installs the
//! subscriber that renders them.

mod logger;

pub use logger::{build_filter, init_logging, LogConfig};

use thiserror::Error;

/// Logging setup failure
#[derive(Debug, Clone, Error)]
#[error("observability error: {message}")]
pub struct ObservabilityError {
    message: String,
}

impl ObservabilityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type for observability operations
pub type ObservabilityResult<T> = Result<T, ObservabilityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ObservabilityError::new("bad filter");
        assert_eq!(err.to_string(), "observability error: bad filter");
        assert_eq!(err.message(), "bad filter");
    }
}
