//! Domain-specific error types for cluster-lens

use thiserror::Error;

/// Main error type for the cluster-lens pipeline.
///
/// Only run-level failures surface through this type. Per-article failures are
/// absorbed by the orchestrator and recorded as [`crate::pipeline::ArticleOutcome`]s.
#[derive(Error, Debug)]
pub enum ClusterLensError {
    #[error("Article retrieval failed: {message}")]
    Retrieval { message: String },

    #[error("Query transformation failed: {message}")]
    QueryTransform { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Report storage error: {message}")]
    Storage { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl ClusterLensError {
    /// True for errors that abort a whole run rather than a single article.
    pub fn is_run_level(&self) -> bool {
        matches!(
            self,
            ClusterLensError::Retrieval { .. } | ClusterLensError::QueryTransform { .. }
        )
    }
}

impl From<serde_json::Error> for ClusterLensError {
    fn from(err: serde_json::Error) -> Self {
        ClusterLensError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ClusterLensError {
    fn from(err: std::io::Error) -> Self {
        ClusterLensError::Storage {
            message: err.to_string(),
        }
    }
}

/// Result type alias for cluster-lens operations
pub type Result<T> = std::result::Result<T, ClusterLensError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_level_classification() {
        let retrieval = ClusterLensError::Retrieval {
            message: "search down".into(),
        };
        assert!(retrieval.is_run_level());
        assert_eq!(
            retrieval.to_string(),
            "Article retrieval failed: search down"
        );

        let storage = ClusterLensError::Storage {
            message: "disk full".into(),
        };
        assert!(!storage.is_run_level());
    }

    #[test]
    fn io_errors_map_to_storage() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let mapped: ClusterLensError = err.into();
        assert!(matches!(mapped, ClusterLensError::Storage { .. }));
        assert_eq!(mapped.to_string(), "Report storage error: read-only");
    }

    #[test]
    fn serde_errors_map_to_serialization() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let mapped: ClusterLensError = err.into();
        assert!(matches!(mapped, ClusterLensError::Serialization { .. }));
    }
}
