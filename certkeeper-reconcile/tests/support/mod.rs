//! Scripted in-memory cert daemon shared by the reconcile integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;

use certkeeper_core::{
    CertRequestSpec, DesiredCertRequest, RequestId, RequestStatus, StorageLocation,
    TrackedRequest,
};
use certkeeper_daemon::{DaemonClient, DaemonError, ResubmitParams, SubmitParams, DUPLICATE_CODE};

/// One recorded client call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Get(RequestId),
    Submit,
    Resubmit(RequestId),
    Stop(RequestId),
}

impl Call {
    pub fn is_mutating(&self) -> bool {
        matches!(self, Call::Submit | Call::Resubmit(_) | Call::Stop(_))
    }
}

#[derive(Default)]
struct State {
    requests: Vec<TrackedRequest>,
    next_id: u64,
    calls: Vec<Call>,
    /// Statuses handed out by successive `get` calls after a submit/resubmit.
    /// The last one sticks.
    progression: Vec<RequestStatus>,
    progress: HashMap<RequestId, usize>,
    history: HashMap<RequestId, Vec<RequestStatus>>,
    /// Requests a competing agent slips in right before our next submit.
    racers: VecDeque<TrackedRequest>,
    unreachable: bool,
}

/// Fake daemon. All state sits behind a mutex that is never held across an
/// await point.
#[derive(Default)]
pub struct FakeDaemon {
    state: Mutex<State>,
}

impl FakeDaemon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statuses reported by successive polls of a freshly (re)submitted request.
    pub fn with_progression(self, statuses: &[RequestStatus]) -> Self {
        self.state.lock().unwrap().progression = statuses.to_vec();
        self
    }

    pub fn with_request(self, request: TrackedRequest) -> Self {
        self.state.lock().unwrap().requests.push(request);
        self
    }

    /// Next submit is rejected as a duplicate after `racer` appears.
    pub fn with_racing_submit(self, racer: TrackedRequest) -> Self {
        self.state.lock().unwrap().racers.push_back(racer);
        self
    }

    pub fn unreachable() -> Self {
        let daemon = Self::default();
        daemon.state.lock().unwrap().unreachable = true;
        daemon
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutating_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutating).collect()
    }

    pub fn count(&self, wanted: fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| wanted(c)).count()
    }

    pub fn requests(&self) -> Vec<TrackedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Every status a request has shown, starting with `NEWLY_ADDED`.
    pub fn history(&self, id: &RequestId) -> Vec<RequestStatus> {
        self.state
            .lock()
            .unwrap()
            .history
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    fn enter(&self, call: Call) -> Result<std::sync::MutexGuard<'_, State>, DaemonError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.unreachable {
            return Err(DaemonError::Unreachable {
                socket: PathBuf::from("/run/certkeeper/certd.sock"),
            });
        }
        Ok(state)
    }
}

impl DaemonClient for FakeDaemon {
    async fn submit_request(&self, params: &SubmitParams) -> Result<RequestId, DaemonError> {
        let mut state = self.enter(Call::Submit)?;

        if let Some(racer) = state.racers.pop_front() {
            state.requests.push(racer);
            return Err(DaemonError::Rejected {
                operation: "submit",
                reason: "location already tracked".into(),
                code: Some(DUPLICATE_CODE.into()),
            });
        }
        if state.requests.iter().any(|r| r.storage == params.storage) {
            return Err(DaemonError::Rejected {
                operation: "submit",
                reason: "location already tracked".into(),
                code: Some(DUPLICATE_CODE.into()),
            });
        }

        state.next_id += 1;
        let id = RequestId::from(format!("20261016{:06}", state.next_id));
        state.requests.push(TrackedRequest {
            id: id.clone(),
            storage: params.storage.clone(),
            authority: params.ca.clone(),
            subject: Some(params.subject.clone()),
            principal: params.principal.clone(),
            status: RequestStatus::NewlyAdded,
            last_error: None,
            auto_renew: params.auto_renew,
            expires_at: None,
        });
        state.progress.insert(id.clone(), 0);
        state
            .history
            .insert(id.clone(), vec![RequestStatus::NewlyAdded]);
        Ok(id)
    }

    async fn list_requests(&self) -> Result<Vec<TrackedRequest>, DaemonError> {
        let state = self.enter(Call::List)?;
        Ok(state.requests.clone())
    }

    async fn get_request(&self, id: &RequestId) -> Result<TrackedRequest, DaemonError> {
        let mut state = self.enter(Call::Get(id.clone()))?;
        let State {
            requests,
            progression,
            progress,
            history,
            ..
        } = &mut *state;

        let request = requests
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| DaemonError::NotFound {
                request_id: id.clone(),
            })?;
        if let Some(step) = progress.get_mut(id) {
            if let Some(status) = progression.get(*step) {
                request.status = status.clone();
                *step += 1;
                let seen = history.entry(id.clone()).or_default();
                if seen.last() != Some(status) {
                    seen.push(status.clone());
                }
            }
        }
        Ok(request.clone())
    }

    async fn resubmit_request(
        &self,
        id: &RequestId,
        params: &ResubmitParams,
    ) -> Result<(), DaemonError> {
        let mut state = self.enter(Call::Resubmit(id.clone()))?;
        let request = state
            .requests
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| DaemonError::NotFound {
                request_id: id.clone(),
            })?;
        if let Some(ca) = &params.ca {
            request.authority = ca.clone();
        }
        request.status = RequestStatus::Submitting;
        request.last_error = None;
        state.progress.insert(id.clone(), 0);
        state
            .history
            .insert(id.clone(), vec![RequestStatus::Submitting]);
        Ok(())
    }

    async fn stop_tracking(&self, id: &RequestId) -> Result<(), DaemonError> {
        let mut state = self.enter(Call::Stop(id.clone()))?;
        let before = state.requests.len();
        state.requests.retain(|r| &r.id != id);
        if state.requests.len() == before {
            return Err(DaemonError::NotFound {
                request_id: id.clone(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn files_storage(key: &str, cert: &str) -> StorageLocation {
    StorageLocation::Files {
        key: PathBuf::from(key),
        cert: PathBuf::from(cert),
    }
}

pub fn tracked(id: &str, storage: StorageLocation, status: RequestStatus) -> TrackedRequest {
    TrackedRequest {
        id: RequestId::from(id),
        storage,
        authority: "local".into(),
        subject: Some("CN=srv.example.test".into()),
        principal: None,
        status,
        last_error: None,
        auto_renew: true,
        expires_at: None,
    }
}

/// `{key: /k.pem, cert: /c.pem, ca: local, nickname: srv}` plus overrides.
pub fn srv_spec() -> CertRequestSpec {
    CertRequestSpec {
        key: Some("/k.pem".into()),
        cert: Some("/c.pem".into()),
        ca: Some("local".into()),
        nickname: Some("srv".into()),
        ..Default::default()
    }
}

pub fn desired(spec: CertRequestSpec) -> DesiredCertRequest {
    DesiredCertRequest::from_spec(spec, || Ok("srv.example.test".to_string()))
        .expect("valid desired request")
}
