//! Error types for lexgraph.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using lexgraph's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for lexgraph operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Case not found
    #[error("Case not found: {0}")]
    CaseNotFound(Uuid),

    /// Task not found
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    /// Task's user does not own the case it targets
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Text extraction collaborator failed
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Entity recognition collaborator failed
    #[error("NER error: {0}")]
    Ner(String),

    /// Retry requested beyond the maximum retry count
    #[error("Retry exhausted for task {task_id} (retry_count {retry_count})")]
    RetryExhausted { task_id: Uuid, retry_count: i32 },

    /// Transport-level failure to append to or claim from the task stream
    #[error("Queue error: {0}")]
    Queue(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Ner(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("entity".to_string());
        assert_eq!(err.to_string(), "Not found: entity");
    }

    #[test]
    fn test_error_display_case_not_found() {
        let id = Uuid::nil();
        let err = Error::CaseNotFound(id);
        assert_eq!(err.to_string(), format!("Case not found: {}", id));
    }

    #[test]
    fn test_error_display_task_not_found() {
        let id = Uuid::new_v4();
        let err = Error::TaskNotFound(id);
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_error_display_unauthorized() {
        let err = Error::Unauthorized("user does not own this case".to_string());
        assert_eq!(err.to_string(), "Unauthorized: user does not own this case");
    }

    #[test]
    fn test_error_display_invalid_input() {
        let err = Error::InvalidInput("no file path for case".to_string());
        assert_eq!(err.to_string(), "Invalid input: no file path for case");
    }

    #[test]
    fn test_error_display_extraction() {
        let err = Error::Extraction("pdftotext exited nonzero".to_string());
        assert_eq!(err.to_string(), "Extraction error: pdftotext exited nonzero");
    }

    #[test]
    fn test_error_display_ner() {
        let err = Error::Ner("sidecar unreachable".to_string());
        assert_eq!(err.to_string(), "NER error: sidecar unreachable");
    }

    #[test]
    fn test_error_display_retry_exhausted() {
        let id = Uuid::new_v4();
        let err = Error::RetryExhausted {
            task_id: id,
            retry_count: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains(&id.to_string()));
        assert!(msg.contains('3'));
    }

    #[test]
    fn test_error_display_queue() {
        let err = Error::Queue("append failed".to_string());
        assert_eq!(err.to_string(), "Queue error: append failed");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing pdf");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("missing pdf"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
