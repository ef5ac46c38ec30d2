//! Error classification shared by every AuthLab error type
//!
//! Layer-specific errors (`StorageError`, `CodecError`, the domain's
//! `AuthLabError`) stay concrete `thiserror` enums. They all implement
//! [`ErrorClassification`] so callers can make retry and logging decisions
//! without matching on variants from another crate.
//!
//! ```rust,ignore
//! #[derive(Debug, Error)]
//! pub enum LockError {
//!     #[error("lock held by another tab")]
//!     Contended,
//! }
//!
//! impl ErrorClassification for LockError {
//!     fn is_retryable(&self) -> bool {
//!         false
//!     }
//!
//!     fn severity(&self) -> ErrorSeverity {
//!         ErrorSeverity::Warning
//!     }
//! }
//! ```

use std::fmt;
use std::time::Duration;

/// Standard interface for classifying errors by their characteristics
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Session-level failures in this workspace are generally not retried
    /// automatically; the trait still lets a caller ask.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    ///
    /// Used for logging decisions.
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Get the suggested retry delay if applicable
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}
