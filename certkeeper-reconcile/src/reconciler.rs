//! Decision table and its execution against the daemon.
//!
//! | state       | match                 | plan                         |
//! |-------------|-----------------------|------------------------------|
//! | present     | none                  | submit                       |
//! | present     | issued                | nothing                      |
//! | present     | failed                | resubmit                     |
//! | present     | in progress           | wait if requested, else none |
//! | resubmitted | some                  | resubmit                     |
//! | resubmitted | none                  | `NoMatchToResubmit`          |
//! | absent      | some                  | stop tracking                |
//! | absent      | none                  | nothing                      |
//!
//! Every run re-reads the daemon's request list; nothing is cached between
//! runs, so repeating a run after it converged is a no-op.

use certkeeper_core::{
    Action, DesiredCertRequest, Phase, ReconciliationResult, RequestId, RequestStatus,
    TargetState, TrackedRequest, ValidationError,
};
use certkeeper_daemon::{DaemonClient, ResubmitParams, SubmitParams};

use crate::error::{daemon_err, ReconcileError};
use crate::matcher::find_match;
use crate::waiter::{wait_for_resubmission, wait_for_terminal, WaitError, WaitSettings};

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Daemon operation required to reach the desired state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Submit,
    Resubmit(RequestId),
    Stop(RequestId),
    /// Nothing to change, but the matched request is still being issued and
    /// the caller asked to wait for it.
    AwaitIssuance(RequestId),
    /// Already in the desired state.
    Satisfied(Option<RequestId>),
}

impl Plan {
    /// Whether executing the plan mutates daemon state.
    pub fn changes(&self) -> bool {
        matches!(self, Plan::Submit | Plan::Resubmit(_) | Plan::Stop(_))
    }

    pub fn action(&self) -> Action {
        match self {
            Plan::Submit => Action::Submitted,
            Plan::Resubmit(_) => Action::Resubmitted,
            Plan::Stop(_) => Action::Stopped,
            Plan::AwaitIssuance(_) | Plan::Satisfied(_) => Action::None,
        }
    }

    fn request_id(&self) -> Option<&RequestId> {
        match self {
            Plan::Submit => None,
            Plan::Resubmit(id) | Plan::Stop(id) | Plan::AwaitIssuance(id) => Some(id),
            Plan::Satisfied(id) => id.as_ref(),
        }
    }
}

/// Map desired state and match result onto a [`Plan`].
pub fn plan(
    desired: &DesiredCertRequest,
    matched: Option<&TrackedRequest>,
) -> Result<Plan, ReconcileError> {
    let plan = match (desired.target_state(), matched) {
        (TargetState::Present, None) => Plan::Submit,
        (TargetState::Present, Some(tracked)) => match tracked.status.phase() {
            Phase::Issued => Plan::Satisfied(Some(tracked.id.clone())),
            Phase::Failed => Plan::Resubmit(tracked.id.clone()),
            Phase::InProgress if desired.wait() => Plan::AwaitIssuance(tracked.id.clone()),
            Phase::InProgress => Plan::Satisfied(Some(tracked.id.clone())),
        },
        (TargetState::Resubmitted, Some(tracked)) => Plan::Resubmit(tracked.id.clone()),
        (TargetState::Resubmitted, None) => {
            return Err(ReconcileError::NoMatchToResubmit {
                location: desired.storage().clone(),
            })
        }
        (TargetState::Absent, Some(tracked)) => Plan::Stop(tracked.id.clone()),
        (TargetState::Absent, None) => Plan::Satisfied(None),
    };
    Ok(plan)
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Drives one desired request to its target state through a [`DaemonClient`].
pub struct Reconciler<'a, C> {
    client: &'a C,
    wait: WaitSettings,
    check_mode: bool,
}

impl<'a, C: DaemonClient> Reconciler<'a, C> {
    pub fn new(client: &'a C, wait: WaitSettings) -> Self {
        Self {
            client,
            wait,
            check_mode: false,
        }
    }

    /// In check mode matching and planning run as usual but no mutating
    /// operation is sent and nothing is awaited.
    pub fn check_mode(mut self, enabled: bool) -> Self {
        self.check_mode = enabled;
        self
    }

    /// Reconcile one desired request.
    ///
    /// A submit rejected as a concurrent duplicate (another agent claimed the
    /// slot first) triggers one fresh match-and-plan pass before giving up.
    pub async fn reconcile(
        &self,
        desired: &DesiredCertRequest,
    ) -> Result<ReconciliationResult, ReconcileError> {
        let mut retried = false;
        loop {
            let existing = self
                .client
                .list_requests()
                .await
                .map_err(daemon_err("list", None))?;
            let matched = find_match(desired, &existing)?;
            let plan = plan(desired, matched)?;
            let current = matched.map(|tracked| tracked.status.clone());

            tracing::debug!(
                storage = %desired.storage(),
                state = %desired.target_state(),
                plan = ?plan,
                "planned reconciliation",
            );

            if self.check_mode {
                return Ok(check_result(desired, &plan, current));
            }

            match self.execute(desired, &plan, current).await {
                Err(ReconcileError::Daemon { ref source, .. })
                    if plan == Plan::Submit && !retried && source.is_concurrent_duplicate() =>
                {
                    tracing::warn!(
                        storage = %desired.storage(),
                        error = %source,
                        "submit raced with another request for the same location; re-checking",
                    );
                    retried = true;
                }
                outcome => return outcome,
            }
        }
    }

    /// Reconcile several independent requests in order. A failure in one entry
    /// does not stop the others.
    pub async fn reconcile_all<I>(
        &self,
        desired: I,
    ) -> Vec<Result<ReconciliationResult, ReconcileError>>
    where
        I: IntoIterator<Item = Result<DesiredCertRequest, ValidationError>>,
    {
        let mut results = Vec::new();
        for entry in desired {
            let outcome = match entry {
                Ok(desired) => self.reconcile(&desired).await,
                Err(invalid) => Err(ReconcileError::Validation(invalid)),
            };
            results.push(outcome);
        }
        results
    }

    async fn execute(
        &self,
        desired: &DesiredCertRequest,
        plan: &Plan,
        current: Option<RequestStatus>,
    ) -> Result<ReconciliationResult, ReconcileError> {
        match plan {
            Plan::Submit => {
                let id = self
                    .client
                    .submit_request(&SubmitParams::from(desired))
                    .await
                    .map_err(daemon_err("submit", None))?;
                tracing::info!(request_id = %id, storage = %desired.storage(), "submitted new request");
                self.settle(desired, Action::Submitted, id, None, None)
                    .await
            }
            Plan::Resubmit(id) => {
                self.client
                    .resubmit_request(id, &ResubmitParams::from(desired))
                    .await
                    .map_err(daemon_err("resubmit", Some(id)))?;
                tracing::info!(request_id = %id, previous = ?current, "resubmitted request");
                self.settle(
                    desired,
                    Action::Resubmitted,
                    id.clone(),
                    None,
                    current.as_ref(),
                )
                .await
            }
            Plan::Stop(id) => {
                self.client
                    .stop_tracking(id)
                    .await
                    .map_err(daemon_err("stop", Some(id)))?;
                tracing::info!(request_id = %id, "stopped tracking request");
                Ok(ReconciliationResult {
                    changed: true,
                    action: Action::Stopped,
                    request_id: Some(id.clone()),
                    final_status: None,
                    check_mode: false,
                    message: format!(
                        "stopped tracking request {id}; files at {} were left in place",
                        desired.storage()
                    ),
                })
            }
            Plan::AwaitIssuance(id) => {
                tracing::info!(request_id = %id, status = ?current, "request already in progress; waiting");
                self.settle(desired, Action::None, id.clone(), current, None)
                    .await
            }
            Plan::Satisfied(id) => Ok(ReconciliationResult {
                changed: false,
                action: Action::None,
                request_id: id.clone(),
                message: match (&current, id) {
                    (Some(status), Some(id)) => format!("request {id} already {status}"),
                    _ => format!("no request tracked for {}", desired.storage()),
                },
                final_status: current,
                check_mode: false,
            }),
        }
    }

    /// After a submit/resubmit (or for an in-progress match), wait for issuance
    /// when requested and build the result. Errors from here on carry
    /// `action`, since the daemon may already have been changed.
    ///
    /// `previous` is the status a resubmitted request had before this run.
    async fn settle(
        &self,
        desired: &DesiredCertRequest,
        action: Action,
        id: RequestId,
        current: Option<RequestStatus>,
        previous: Option<&RequestStatus>,
    ) -> Result<ReconciliationResult, ReconcileError> {
        let changed = action != Action::None;

        if !desired.wait() {
            let status = match current {
                Some(status) => Some(status),
                None => self.peek_status(&id).await,
            };
            return Ok(ReconciliationResult {
                changed,
                action,
                message: format!("request {id} {action}; not waiting for issuance"),
                request_id: Some(id),
                final_status: status,
                check_mode: false,
            });
        }

        let waited = match previous {
            Some(previous) => {
                wait_for_resubmission(self.client, &id, &self.wait, previous).await
            }
            None => wait_for_terminal(self.client, &id, &self.wait).await,
        };
        let tracked = match waited {
            Ok(tracked) => tracked,
            Err(WaitError::Timeout {
                request_id,
                last_status,
                waited,
            }) => {
                return Err(ReconcileError::Timeout {
                    request_id,
                    last_status,
                    waited,
                    action,
                })
            }
            Err(WaitError::Daemon(source)) => {
                return Err(ReconcileError::Daemon {
                    operation: "get",
                    request_id: Some(id),
                    action,
                    source,
                })
            }
        };

        if tracked.status.phase() == Phase::Failed {
            return Err(ReconcileError::IssuanceFailed {
                request_id: tracked.id,
                status: tracked.status,
                last_error: tracked.last_error,
                action,
            });
        }

        Ok(ReconciliationResult {
            changed,
            action,
            message: format!("request {id} {action}; certificate issued"),
            request_id: Some(id),
            final_status: Some(tracked.status),
            check_mode: false,
        })
    }

    /// Best-effort status read after a mutation that is not awaited. The
    /// mutation already succeeded, so a failed read is logged, not returned.
    async fn peek_status(&self, id: &RequestId) -> Option<RequestStatus> {
        match self.client.get_request(id).await {
            Ok(tracked) => Some(tracked.status),
            Err(err) => {
                tracing::warn!(request_id = %id, error = %err, "could not read request status");
                None
            }
        }
    }
}

fn check_result(
    desired: &DesiredCertRequest,
    plan: &Plan,
    current: Option<RequestStatus>,
) -> ReconciliationResult {
    let message = match plan {
        Plan::Submit => format!("would submit a new request for {}", desired.storage()),
        Plan::Resubmit(id) => format!("would resubmit request {id}"),
        Plan::Stop(id) => format!("would stop tracking request {id}"),
        Plan::AwaitIssuance(id) => format!("request {id} is still being issued"),
        Plan::Satisfied(Some(id)) => format!("request {id} needs no change"),
        Plan::Satisfied(None) => format!("no request tracked for {}", desired.storage()),
    };
    ReconciliationResult {
        changed: plan.changes(),
        action: plan.action(),
        request_id: plan.request_id().cloned(),
        final_status: current,
        check_mode: true,
        message,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use certkeeper_core::{CertRequestSpec, StorageLocation};
    use rstest::rstest;

    fn desired(state: TargetState, wait: bool) -> DesiredCertRequest {
        DesiredCertRequest::from_spec(
            CertRequestSpec {
                key: Some("/k.pem".into()),
                cert: Some("/c.pem".into()),
                state: Some(state),
                wait: Some(wait),
                ..Default::default()
            },
            || Ok("host".to_string()),
        )
        .expect("valid spec")
    }

    fn tracked(status: RequestStatus) -> TrackedRequest {
        TrackedRequest {
            id: RequestId::from("7"),
            storage: StorageLocation::Files {
                key: "/k.pem".into(),
                cert: "/c.pem".into(),
            },
            authority: "local".into(),
            subject: None,
            principal: None,
            status,
            last_error: None,
            auto_renew: true,
            expires_at: None,
        }
    }

    fn id() -> RequestId {
        RequestId::from("7")
    }

    #[rstest]
    #[case(TargetState::Present, true, None, Plan::Submit)]
    #[case(TargetState::Present, true, Some(RequestStatus::Monitoring), Plan::Satisfied(Some(id())))]
    #[case(TargetState::Present, true, Some(RequestStatus::CaRejected), Plan::Resubmit(id()))]
    #[case(TargetState::Present, true, Some(RequestStatus::CaUnreachable), Plan::Resubmit(id()))]
    #[case(TargetState::Present, true, Some(RequestStatus::NeedKeyinfo), Plan::Resubmit(id()))]
    #[case(TargetState::Present, true, Some(RequestStatus::CaWorking), Plan::AwaitIssuance(id()))]
    #[case(TargetState::Present, false, Some(RequestStatus::CaWorking), Plan::Satisfied(Some(id())))]
    #[case(TargetState::Present, true, Some(RequestStatus::Unknown("X".into())), Plan::AwaitIssuance(id()))]
    #[case(TargetState::Resubmitted, true, Some(RequestStatus::Monitoring), Plan::Resubmit(id()))]
    #[case(TargetState::Resubmitted, false, Some(RequestStatus::CaWorking), Plan::Resubmit(id()))]
    #[case(TargetState::Absent, true, Some(RequestStatus::Monitoring), Plan::Stop(id()))]
    #[case(TargetState::Absent, true, Some(RequestStatus::CaRejected), Plan::Stop(id()))]
    #[case(TargetState::Absent, true, None, Plan::Satisfied(None))]
    fn decision_table(
        #[case] state: TargetState,
        #[case] wait: bool,
        #[case] status: Option<RequestStatus>,
        #[case] expected: Plan,
    ) {
        let matched = status.map(tracked);
        let got = plan(&desired(state, wait), matched.as_ref()).expect("plan");
        assert_eq!(got, expected);
    }

    #[test]
    fn resubmit_without_match_fails() {
        let err = plan(&desired(TargetState::Resubmitted, true), None).unwrap_err();
        assert!(matches!(err, ReconcileError::NoMatchToResubmit { .. }), "got: {err}");
    }

    #[test]
    fn only_mutating_plans_report_change() {
        assert!(Plan::Submit.changes());
        assert!(Plan::Stop(id()).changes());
        assert!(!Plan::AwaitIssuance(id()).changes());
        assert!(!Plan::Satisfied(None).changes());
    }

    #[test]
    fn check_result_describes_would_be_action() {
        let result = check_result(&desired(TargetState::Present, true), &Plan::Submit, None);
        assert!(result.changed);
        assert!(result.check_mode);
        assert_eq!(result.action, Action::Submitted);
        assert!(result.message.starts_with("would submit"));
    }
}
