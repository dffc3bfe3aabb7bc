//! Error types for the insight refresh cycle

use std::time::Duration;

/// Result alias used throughout the service
pub type Result<T> = std::result::Result<T, InsightError>;

/// Insight service error types
///
/// The first five variants are per-key failures raised while refreshing a
/// single record. The rest are infrastructure failures of the cycle itself.
#[derive(Debug, thiserror::Error)]
pub enum InsightError {
    #[error("malformed generation output for {key}: {reason}")]
    MalformedGenerationOutput { key: String, reason: String },

    #[error("generation failed: {reason}")]
    GenerationFailure { reason: String },

    #[error("generation timed out after {}s", .0.as_secs())]
    GenerationTimeout(Duration),

    #[error("no insight record for industry {0}")]
    RecordNotFound(String),

    #[error("failed to persist insights for {key}: {reason}")]
    PersistenceFailure { key: String, reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cycle lock error: {0}")]
    Lock(String),

    #[error("invalid schedule: {0}")]
    Schedule(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl InsightError {
    /// Stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            InsightError::MalformedGenerationOutput { .. } => "malformed_output",
            InsightError::GenerationFailure { .. } => "generation_failure",
            InsightError::GenerationTimeout(_) => "generation_timeout",
            InsightError::RecordNotFound(_) => "record_not_found",
            InsightError::PersistenceFailure { .. } => "persistence_failure",
            InsightError::Database(_) => "database",
            InsightError::Lock(_) => "lock",
            InsightError::Schedule(_) => "schedule",
            InsightError::Config(_) => "config",
        }
    }

    /// Per-industry failure as opposed to a cycle-level one
    pub fn is_key_failure(&self) -> bool {
        matches!(
            self,
            InsightError::MalformedGenerationOutput { .. }
                | InsightError::GenerationFailure { .. }
                | InsightError::GenerationTimeout(_)
                | InsightError::RecordNotFound(_)
                | InsightError::PersistenceFailure { .. }
        )
    }

    pub(crate) fn malformed(key: &str, reason: impl Into<String>) -> Self {
        InsightError::MalformedGenerationOutput {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn generation(reason: impl Into<String>) -> Self {
        InsightError::GenerationFailure {
            reason: reason.into(),
        }
    }
}

impl From<redis::RedisError> for InsightError {
    fn from(err: redis::RedisError) -> Self {
        InsightError::Lock(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            InsightError::malformed("tech", "eof").kind(),
            "malformed_output"
        );
        assert_eq!(
            InsightError::RecordNotFound("tech".into()).kind(),
            "record_not_found"
        );
        assert_eq!(
            InsightError::GenerationTimeout(Duration::from_secs(5)).kind(),
            "generation_timeout"
        );
    }

    #[test]
    fn test_key_failures() {
        assert!(InsightError::generation("boom").is_key_failure());
        assert!(!InsightError::Lock("down".into()).is_key_failure());
        assert!(!InsightError::Database(sqlx::Error::PoolTimedOut).is_key_failure());
    }

    #[test]
    fn test_timeout_message() {
        let err = InsightError::GenerationTimeout(Duration::from_secs(120));
        assert_eq!(err.to_string(), "generation timed out after 120s");
    }
}
