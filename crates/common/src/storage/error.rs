//! Storage error types

use thiserror::Error;

use crate::error::{ErrorClassification, ErrorSeverity};

/// Storage error type
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend cannot be reached or is disabled
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Persisted data could not be read back
    #[error("Storage data corrupt: {0}")]
    Corrupt(String),

    /// Quota or size limit hit
    #[error("Storage quota exceeded for key {0}")]
    QuotaExceeded(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

/// Storage result type
pub type StorageResult<T> = Result<T, StorageError>;

impl ErrorClassification for StorageError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Unavailable(_) | Self::QuotaExceeded(_) => ErrorSeverity::Warning,
            Self::Corrupt(_) | Self::SerdeJson(_) => ErrorSeverity::Error,
            Self::Io(_) => ErrorSeverity::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_retryable() {
        let err = StorageError::from(std::io::Error::other("disk busy"));
        assert!(err.is_retryable());
        assert_eq!(err.severity(), ErrorSeverity::Error);
    }

    #[test]
    fn corrupt_data_is_not_retryable() {
        let err = StorageError::Corrupt("truncated".into());
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Storage data corrupt: truncated");
    }
}
