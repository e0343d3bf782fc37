//! Error types shared across the Kinetext crates

use thiserror::Error;

/// Errors surfaced by the Kinetext engine
///
/// The engine performs no I/O after construction, so the taxonomy is small:
/// configuration problems are caught synchronously at creation time, and the
/// one optional platform capability (viewport observation) degrades instead
/// of failing. Everything else is absorbed as a no-op.
#[derive(Error, Debug)]
pub enum KinetextError {
    /// Invalid configuration, rejected before an instance is created
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An optional platform capability is missing in this execution context
    #[error("viewport observation is unavailable in this environment")]
    EnvironmentUnavailable,
}

impl KinetextError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type for Kinetext operations
pub type Result<T> = std::result::Result<T, KinetextError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes_are_stable() {
        assert!(KinetextError::config("items must not be empty")
            .to_string()
            .contains("invalid configuration:"));
        assert!(KinetextError::EnvironmentUnavailable
            .to_string()
            .contains("unavailable"));
    }
}
