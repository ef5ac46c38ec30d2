//! Failure logging keyed on error classification

use std::fmt::Display;

use authlab_common::error::{ErrorClassification, ErrorSeverity};
use tracing::{error, info, warn};

/// Log `err` at the level its severity calls for and return that severity
pub(crate) fn log_failure<E>(context: &str, err: &E) -> ErrorSeverity
where
    E: ErrorClassification + Display,
{
    let severity = err.severity();
    let retryable = err.is_retryable();
    match severity {
        ErrorSeverity::Info => info!(error = %err, retryable, "{}", context),
        ErrorSeverity::Warning => warn!(error = %err, retryable, "{}", context),
        ErrorSeverity::Error | ErrorSeverity::Critical => {
            error!(error = %err, retryable, critical = err.is_critical(), "{}", context);
        }
    }
    severity
}
