//! Error types for certkeeper-reconcile.

use std::time::Duration;

use thiserror::Error;

use certkeeper_core::{Action, RequestId, RequestStatus, StorageLocation, ValidationError};
use certkeeper_daemon::DaemonError;

/// All errors a reconciliation run can end with.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Desired state was contradictory; the daemon was never contacted.
    #[error("invalid certificate request: {0}")]
    Validation(#[from] ValidationError),

    /// A daemon operation failed. `action` is what this run had already
    /// done before the failure (a status read after a submit, for example).
    #[error("{operation}{} failed{}: {source}", for_request(.request_id), after_action(.action))]
    Daemon {
        operation: &'static str,
        request_id: Option<RequestId>,
        action: Action,
        #[source]
        source: DaemonError,
    },

    /// Several tracked requests claim the same storage location.
    #[error(
        "daemon tracks {} requests for {location} ({}); refusing to guess",
        .request_ids.len(),
        join_ids(.request_ids)
    )]
    AmbiguousMatch {
        location: StorageLocation,
        request_ids: Vec<RequestId>,
    },

    #[error("nothing to resubmit: no tracked request for {location}")]
    NoMatchToResubmit { location: StorageLocation },

    /// Issuance did not finish in time. The request stays tracked and the
    /// daemon keeps working on it.
    #[error(
        "request {request_id}{} not issued after {waited:?} (last status: {}); it remains tracked",
        after_action(.action),
        status_or_unknown(.last_status)
    )]
    Timeout {
        request_id: RequestId,
        last_status: Option<RequestStatus>,
        waited: Duration,
        action: Action,
    },

    /// The daemon reached a terminal failure state for the request.
    #[error(
        "request {request_id}{} ended in {status}{}",
        after_action(.action),
        detail_suffix(.last_error)
    )]
    IssuanceFailed {
        request_id: RequestId,
        status: RequestStatus,
        last_error: Option<String>,
        action: Action,
    },
}

impl ReconcileError {
    /// Request id involved in the failure, when one is known.
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            ReconcileError::Daemon { request_id, .. } => request_id.as_ref(),
            ReconcileError::Timeout { request_id, .. }
            | ReconcileError::IssuanceFailed { request_id, .. } => Some(request_id),
            _ => None,
        }
    }

    /// Daemon operation this run completed before failing. Anything other
    /// than [`Action::None`] means daemon state was changed.
    pub fn action(&self) -> Action {
        match self {
            ReconcileError::Daemon { action, .. }
            | ReconcileError::Timeout { action, .. }
            | ReconcileError::IssuanceFailed { action, .. } => *action,
            _ => Action::None,
        }
    }

    pub fn changed(&self) -> bool {
        self.action() != Action::None
    }
}

/// Wrap a [`DaemonError`] with the operation that produced it.
pub(crate) fn daemon_err(
    operation: &'static str,
    request_id: Option<&RequestId>,
) -> impl FnOnce(DaemonError) -> ReconcileError {
    let request_id = request_id.cloned();
    move |source| ReconcileError::Daemon {
        operation,
        request_id,
        action: Action::None,
        source,
    }
}

fn after_action(action: &Action) -> String {
    match action {
        Action::None => String::new(),
        done => format!(" ({done})"),
    }
}

fn for_request(request_id: &Option<RequestId>) -> String {
    request_id
        .as_ref()
        .map(|id| format!(" of request {id}"))
        .unwrap_or_default()
}

fn status_or_unknown(status: &Option<RequestStatus>) -> String {
    status
        .as_ref()
        .map_or_else(|| "unknown".to_string(), ToString::to_string)
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!(": {d}"))
        .unwrap_or_default()
}

fn join_ids(ids: &[RequestId]) -> String {
    ids.iter()
        .map(|id| id.0.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
