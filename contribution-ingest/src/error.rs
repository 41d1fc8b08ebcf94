//! Error types for the ingestion engine.
//!
//! Validation failures are not errors here: they end a pipeline run as a
//! `Rejected` outcome. These types cover everything that stops the engine
//! from reaching a decision at all.

use crate::fingerprint::Fingerprint;

/// Failures reported by a dedup index collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    /// The fingerprint is already indexed
    #[error("Duplicate fingerprint: {0}")]
    Conflict(Fingerprint),

    /// The index could not be reached
    #[error("Index unavailable: {0}")]
    Unavailable(String),
}

/// Invalid configuration values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors that prevent the pipeline from producing an outcome.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The dedup index failed; the record may be valid
    #[error("Dedup index unavailable: {0}")]
    IndexUnavailable(String),

    /// A batch envelope that is neither a batch nor a single record
    #[error("Malformed submission: {0}")]
    MalformedSubmission(String),

    /// A spawned pipeline task panicked or was aborted
    #[error("Pipeline task failed: {0}")]
    TaskFailed(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl IngestError {
    /// Whether the caller should retry the same submission with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::IndexUnavailable(_) | Self::TaskFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(IngestError::IndexUnavailable("timeout".to_string()).is_retryable());
        assert!(!IngestError::MalformedSubmission("not an object".to_string()).is_retryable());

        let config = ConfigError::Invalid {
            field: "pipeline.max_concurrent",
            reason: "must be at least 1".to_string(),
        };
        assert!(!IngestError::from(config).is_retryable());
    }
}
