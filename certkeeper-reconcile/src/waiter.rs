//! Issuance waiter: poll a tracked request until the daemon stops working on it.
//!
//! Polling sleeps on tokio timers between requests, and every poll is bounded
//! by the overall deadline, so a hung daemon cannot stretch the wait past
//! `timeout`. Timing out leaves the request tracked.

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use certkeeper_core::{RequestId, RequestStatus, Settings, TrackedRequest};
use certkeeper_daemon::{DaemonClient, DaemonError};

/// Poll cadence and overall bound for one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSettings {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl From<&Settings> for WaitSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            poll_interval: settings.poll_interval,
            timeout: settings.wait_timeout,
        }
    }
}

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("gave up on request {request_id} after {waited:?}")]
    Timeout {
        request_id: RequestId,
        last_status: Option<RequestStatus>,
        waited: Duration,
    },

    #[error(transparent)]
    Daemon(#[from] DaemonError),
}

/// Stand-in deadline when `timeout` is too large to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Poll `id` until its status is terminal (issued or failed) or `settings.timeout`
/// elapses. Terminal failures are returned as `Ok`; classifying them is the
/// caller's job.
pub async fn wait_for_terminal<C: DaemonClient>(
    client: &C,
    id: &RequestId,
    settings: &WaitSettings,
) -> Result<TrackedRequest, WaitError> {
    poll_until_terminal(client, id, settings, None).await
}

/// [`wait_for_terminal`] for a request that was just resubmitted while in
/// `previous`. The daemon may still report `previous` on the first poll, so a
/// terminal `previous` seen there does not end the wait.
pub async fn wait_for_resubmission<C: DaemonClient>(
    client: &C,
    id: &RequestId,
    settings: &WaitSettings,
    previous: &RequestStatus,
) -> Result<TrackedRequest, WaitError> {
    let stale = previous.is_terminal().then_some(previous);
    poll_until_terminal(client, id, settings, stale).await
}

async fn poll_until_terminal<C: DaemonClient>(
    client: &C,
    id: &RequestId,
    settings: &WaitSettings,
    mut stale: Option<&RequestStatus>,
) -> Result<TrackedRequest, WaitError> {
    let started = Instant::now();
    let deadline = started
        .checked_add(settings.timeout)
        .unwrap_or_else(|| started + FAR_FUTURE);
    let mut last_status = None;

    loop {
        let polled = match tokio::time::timeout_at(deadline, client.get_request(id)).await {
            Ok(result) => result?,
            Err(_) => break,
        };
        tracing::debug!(request_id = %id, status = %polled.status, "polled request status");

        let ignored = stale.take();
        if polled.status.is_terminal() {
            if ignored != Some(&polled.status) {
                return Ok(polled);
            }
            tracing::debug!(request_id = %id, "status not yet updated after resubmit");
        }
        last_status = Some(polled.status);

        let now = Instant::now();
        if now >= deadline {
            break;
        }
        let next = now
            .checked_add(settings.poll_interval)
            .map_or(deadline, |next| next.min(deadline));
        tokio::time::sleep_until(next).await;
    }

    tracing::warn!(
        request_id = %id,
        waited_ms = started.elapsed().as_millis() as u64,
        "gave up waiting for issuance"
    );
    Err(WaitError::Timeout {
        request_id: id.clone(),
        last_status,
        waited: started.elapsed(),
    })
}
