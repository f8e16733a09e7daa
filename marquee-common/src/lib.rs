//! Common types and utilities shared across Marquee crates.
//!
//! This crate holds the service-level error type and the observability
//! helpers every binary and integration test initialises. It stays
//! dependency-light so that all crates can depend on it.
//!
//! # Overview
//!
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`fs::write_atomic`]: write-temp-then-rename replacement of a file
//! - [`MarqueeError`] and [`Result`]: Service-level error handling
//!
//! # Examples
//!
//! ```rust
//! use marquee_common::MarqueeError;
//!
//! let err = MarqueeError::Setup("destination directory is a file".into());
//! assert_eq!(err.to_string(), "Setup error: destination directory is a file");
//! ```
use std::path::PathBuf;

pub mod fs;
pub mod observability;

/// Error types surfaced at the service boundary.
///
/// Failures inside a single request (network, extraction, download) never
/// reach this type: the listener turns them into error frames. What remains
/// is what stops the service from serving at all.
#[derive(thiserror::Error, Debug)]
pub enum MarqueeError {
    /// One-time startup work (shared record, destination directory) failed.
    #[error("Setup error: {0}")]
    Setup(String),

    /// The shared record could not be read or replaced.
    #[error("Channel I/O error on {path}: {source}")]
    Channel {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] marquee_config::ConfigError),
}

impl MarqueeError {
    pub fn channel(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Channel {
            path: path.into(),
            source,
        }
    }
}

/// Convenient alias for results that use [`MarqueeError`].
pub type Result<T> = std::result::Result<T, MarqueeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_config::{ConfigError, MarqueeConfig};

    #[test]
    fn config_errors_convert_with_question_mark() {
        fn check(cfg: &MarqueeConfig) -> Result<()> {
            cfg.validate()?;
            Ok(())
        }
        let cfg = MarqueeConfig {
            relevance_bias: "imdb".into(),
            ..MarqueeConfig::default()
        };
        let err = check(&cfg).unwrap_err();
        assert!(matches!(err, MarqueeError::Config(ConfigError::InvalidBias(_))));
        assert!(err.to_string().starts_with("Configuration error: "));
    }
}
