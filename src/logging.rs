//! Tracing subscriber setup for hosts that do not install their own.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{Result, StudioError};

/// Environment variable holding an `EnvFilter` directive, e.g. `shotforge=debug`.
pub const LOG_ENV: &str = "SHOTFORGE_LOG";

/// Build the filter: `SHOTFORGE_LOG` wins, otherwise `shotforge=<level>`.
pub fn build_env_filter(level: Option<&str>) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return Ok(filter);
    }
    let level = level.unwrap_or("info");
    if level == "off" {
        return Ok(EnvFilter::new("off"));
    }
    EnvFilter::try_new(format!("shotforge={level}"))
        .map_err(|e| StudioError::Other(format!("Invalid log level '{}': {}", level, e)))
}

/// Install a global fmt subscriber writing to stderr.
///
/// Fails if a global subscriber is already set.
pub fn init_logging(level: Option<&str>) -> Result<()> {
    let filter = build_env_filter(level)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|e| StudioError::Other(format!("Failed to install tracing subscriber: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_levels() {
        if std::env::var(LOG_ENV).is_ok() {
            return;
        }
        assert!(build_env_filter(None).is_ok());
        assert!(build_env_filter(Some("debug")).is_ok());
        assert!(build_env_filter(Some("off")).is_ok());
    }

    #[test]
    fn test_bad_level_rejected() {
        if std::env::var(LOG_ENV).is_ok() {
            return;
        }
        assert!(build_env_filter(Some("not a level!!")).is_err());
    }
}
