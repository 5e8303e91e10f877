use std::path::PathBuf;
use std::time::Duration;

use certkeeper_core::RequestId;
use thiserror::Error;

/// Error surface of a single daemon operation. Nothing here is retried.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("cert daemon is not running (socket unavailable: {socket})")]
    Unreachable { socket: PathBuf },

    #[error("cert daemon rejected {operation}: {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
        code: Option<String>,
    },

    #[error("cert daemon has no request with id {request_id}")]
    NotFound { request_id: RequestId },

    #[error("cert daemon did not answer {operation} within {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("daemon protocol error: {0}")]
    Protocol(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Response code the daemon uses when another request already owns the slot.
pub const DUPLICATE_CODE: &str = "duplicate";

/// Response code for lookups of an unknown request id.
pub const NOT_FOUND_CODE: &str = "not_found";

impl DaemonError {
    /// Whether this is a rejection caused by a concurrent request for the same
    /// storage location.
    pub fn is_concurrent_duplicate(&self) -> bool {
        match self {
            DaemonError::Rejected { reason, code, .. } => {
                code.as_deref() == Some(DUPLICATE_CODE)
                    || reason.contains("already used by request")
                    || reason.contains("already being tracked")
            }
            _ => false,
        }
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
