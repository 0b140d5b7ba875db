//! Tracing subscriber setup for the binary
//!
//! `RUST_LOG` wins when set; otherwise the configured [`LogLevel`] applies
//! to this crate and `warn` to dependencies. Output goes to stderr so the
//! chat transcript on stdout stays clean.

use crate::agent::LogLevel;
use crate::error::{AgentError, Result};
use tracing_subscriber::EnvFilter;

/// Filter directive used when `RUST_LOG` is absent
pub fn default_directive(level: LogLevel) -> String {
    format!("warn,flyagent={level}")
}

/// Install the global subscriber; fails if one is already installed
pub fn init(level: LogLevel) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(level)))
        .map_err(|e| AgentError::Configuration(format!("invalid log filter: {e}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| AgentError::Configuration(format!("failed to set subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_parses() {
        for level in [LogLevel::Trace, LogLevel::Debug, LogLevel::Info, LogLevel::Warn, LogLevel::Error] {
            let directive = default_directive(level);
            assert!(EnvFilter::try_new(&directive).is_ok(), "{directive}");
        }
        assert_eq!(default_directive(LogLevel::Debug), "warn,flyagent=debug");
    }
}
