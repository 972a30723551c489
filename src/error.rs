//! Error types for section-dl
//!
//! This module provides the error taxonomy of the harvester:
//! - Run-fatal errors (session launch, readiness timeout)
//! - Collection-fatal errors (invalid locator, corrupt progress record, progress write failures)
//! - Unit failures (item extraction, image fetch, navigation) that are recorded and skipped
//!
//! No layer of the crate retries on its own. Re-running a batch with resume enabled is the
//! retry mechanism: only incomplete items are attempted again.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for section-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for section-dl
#[derive(Debug, Error)]
pub enum Error {
    /// The browser session could not be launched
    #[error("failed to launch browser session: {0}")]
    Launch(String),

    /// The launched browser never exposed its debugging endpoint
    #[error(
        "browser on port {port} not ready after {}s (close other browser windows using the same profile and retry)",
        timeout.as_secs()
    )]
    ReadinessTimeout {
        /// Debugging port that was probed
        port: u16,
        /// How long readiness was awaited
        timeout: Duration,
    },

    /// Malformed collection URL
    #[error("invalid collection URL {url}: {reason}")]
    InvalidLocator {
        /// The URL as supplied by the caller
        url: String,
        /// What is missing or malformed
        reason: String,
    },

    /// The progress record exists but cannot be parsed
    ///
    /// The file is never deleted automatically; a human can inspect or remove it.
    #[error("progress record {} is corrupt ({source}); inspect or delete it and retry", path.display())]
    CorruptProgress {
        /// Location of the record
        path: PathBuf,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },

    /// Item page yielded no record or no title
    #[error("could not extract item {item_id}: {reason}")]
    Extraction {
        /// The item that failed
        item_id: String,
        /// Why extraction failed
        reason: String,
    },

    /// Processing one item took longer than the configured item timeout
    #[error("item {item_id} exceeded the {}s item timeout", timeout.as_secs())]
    ItemTimeout {
        /// The item that was abandoned
        item_id: String,
        /// The configured deadline
        timeout: Duration,
    },

    /// A single image could not be fetched
    #[error("failed to fetch image {url}: {reason}")]
    ImageFetch {
        /// Image URL
        url: String,
        /// Transport error or HTTP status
        reason: String,
    },

    /// Browser navigation to a collection or item failed
    #[error("navigation to {url} failed: {reason}")]
    Navigation {
        /// Target URL
        url: String,
        /// Collaborator-reported reason
        reason: String,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "pacing.item_delay")
        key: Option<String>,
    },

    /// Malformed image selection expression
    #[error("invalid image selection '{expr}': {reason}")]
    InvalidSelection {
        /// The offending part of the expression
        expr: String,
        /// What is wrong with it
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error aborts the whole run rather than a single collection or item
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, Error::Launch(_) | Error::ReadinessTimeout { .. })
    }

    /// Whether this error aborts the current collection (the batch moves on to the next one)
    pub fn is_collection_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidLocator { .. }
                | Error::CorruptProgress { .. }
                | Error::Navigation { .. }
                | Error::Io(_)
                | Error::Serialization(_)
        )
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn corrupt() -> Error {
        let source = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        Error::CorruptProgress {
            path: PathBuf::from("/out/Canvas/.progress.json"),
            source,
        }
    }

    #[test]
    fn corrupt_progress_message_names_the_file() {
        let msg = corrupt().to_string();
        assert!(
            msg.contains("/out/Canvas/.progress.json"),
            "message must carry the record location, got: {msg}"
        );
        assert!(msg.contains("inspect or delete"));
    }

    #[test]
    fn corrupt_progress_exposes_parse_error_as_source() {
        let err = corrupt();
        assert!(
            std::error::Error::source(&err).is_some(),
            "parse error must be reachable through source()"
        );
    }

    #[test]
    fn readiness_timeout_reports_port_and_seconds() {
        let err = Error::ReadinessTimeout {
            port: 9222,
            timeout: Duration::from_secs(30),
        };
        let msg = err.to_string();
        assert!(msg.contains("9222"));
        assert!(msg.contains("30s"));
    }

    #[test]
    fn run_fatal_classification() {
        assert!(Error::Launch("no browser".into()).is_run_fatal());
        assert!(
            Error::ReadinessTimeout {
                port: 1,
                timeout: Duration::from_secs(1)
            }
            .is_run_fatal()
        );
        assert!(!corrupt().is_run_fatal());
        assert!(
            !Error::Navigation {
                url: "u".into(),
                reason: "reset".into()
            }
            .is_run_fatal()
        );
        assert!(
            !Error::ImageFetch {
                url: "u".into(),
                reason: "404".into()
            }
            .is_run_fatal()
        );
    }

    #[test]
    fn collection_fatal_classification() {
        assert!(corrupt().is_collection_fatal());
        assert!(
            Error::InvalidLocator {
                url: "x".into(),
                reason: "no shop".into()
            }
            .is_collection_fatal()
        );
        assert!(
            !Error::Extraction {
                item_id: "1".into(),
                reason: "no title".into()
            }
            .is_collection_fatal(),
            "item failures never abort the collection"
        );
    }
}
