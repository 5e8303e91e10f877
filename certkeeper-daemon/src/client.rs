//! Daemon operations and the Unix-socket transport that carries them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use certkeeper_core::{RequestId, Settings, TrackedRequest};

use crate::error::{io_err, DaemonError, NOT_FOUND_CODE};
use crate::protocol::{DaemonRequest, DaemonResponse, ResubmitParams, SubmitParams, Submitted};

/// Operations the cert daemon exposes. Every call is one request/response
/// round trip; implementations never retry.
#[allow(async_fn_in_trait)]
pub trait DaemonClient {
    /// Start tracking a new request. Returns the id the daemon assigned.
    async fn submit_request(&self, params: &SubmitParams) -> Result<RequestId, DaemonError>;

    /// Every request the daemon currently tracks.
    async fn list_requests(&self) -> Result<Vec<TrackedRequest>, DaemonError>;

    /// One tracked request; `DaemonError::NotFound` if the id is unknown.
    async fn get_request(&self, id: &RequestId) -> Result<TrackedRequest, DaemonError>;

    /// Ask the daemon to submit an existing request to its authority again.
    async fn resubmit_request(
        &self,
        id: &RequestId,
        params: &ResubmitParams,
    ) -> Result<(), DaemonError>;

    /// Remove a request from the watch list. Key and cert files are left alone.
    async fn stop_tracking(&self, id: &RequestId) -> Result<(), DaemonError>;
}

/// [`DaemonClient`] speaking JSON lines over the daemon's Unix socket.
#[derive(Debug, Clone)]
pub struct SocketClient {
    socket: PathBuf,
    io_timeout: Duration,
}

impl SocketClient {
    pub fn new(socket: impl Into<PathBuf>, io_timeout: Duration) -> Self {
        Self {
            socket: socket.into(),
            io_timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.socket, settings.io_timeout)
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// Send one request and return the raw response, bounded by the I/O timeout.
    pub async fn send_request(&self, request: &DaemonRequest) -> Result<DaemonResponse, DaemonError> {
        let operation = request.operation();
        tracing::debug!(operation, socket = %self.socket.display(), "daemon round trip");
        tokio::time::timeout(self.io_timeout, self.round_trip(request))
            .await
            .map_err(|_| DaemonError::Timeout {
                operation,
                after: self.io_timeout,
            })?
    }

    async fn round_trip(&self, request: &DaemonRequest) -> Result<DaemonResponse, DaemonError> {
        let socket = &self.socket;
        if !socket.exists() {
            return Err(DaemonError::Unreachable {
                socket: socket.clone(),
            });
        }

        let stream = UnixStream::connect(socket).await.map_err(|err| {
            if matches!(
                err.kind(),
                std::io::ErrorKind::NotFound
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
            ) {
                DaemonError::Unreachable {
                    socket: socket.clone(),
                }
            } else {
                io_err(socket, err)
            }
        })?;

        let (reader, mut writer) = stream.into_split();
        let payload = serde_json::to_string(request)?;
        writer
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| io_err(socket, e))?;
        writer.write_all(b"\n").await.map_err(|e| io_err(socket, e))?;
        writer.flush().await.map_err(|e| io_err(socket, e))?;

        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        let read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| io_err(socket, e))?;
        if read == 0 {
            return Err(DaemonError::Protocol(format!(
                "daemon closed connection before answering {}",
                request.operation()
            )));
        }

        let response: DaemonResponse = serde_json::from_str(line.trim_end())?;
        Ok(response)
    }

    async fn call<T: DeserializeOwned>(&self, request: DaemonRequest) -> Result<T, DaemonError> {
        let response = self.send_request(&request).await?;
        let data = response_into_data(&request, response)?;
        Ok(serde_json::from_value(data)?)
    }

    async fn call_unit(&self, request: DaemonRequest) -> Result<(), DaemonError> {
        let response = self.send_request(&request).await?;
        response_into_data(&request, response).map(|_| ())
    }
}

impl DaemonClient for SocketClient {
    async fn submit_request(&self, params: &SubmitParams) -> Result<RequestId, DaemonError> {
        let submitted: Submitted = self.call(DaemonRequest::Submit(params.clone())).await?;
        tracing::info!(request_id = %submitted.id, storage = %params.storage, "daemon accepted new request");
        Ok(submitted.id)
    }

    async fn list_requests(&self) -> Result<Vec<TrackedRequest>, DaemonError> {
        self.call(DaemonRequest::List).await
    }

    async fn get_request(&self, id: &RequestId) -> Result<TrackedRequest, DaemonError> {
        self.call(DaemonRequest::Get { id: id.clone() }).await
    }

    async fn resubmit_request(
        &self,
        id: &RequestId,
        params: &ResubmitParams,
    ) -> Result<(), DaemonError> {
        self.call_unit(DaemonRequest::Resubmit {
            id: id.clone(),
            params: params.clone(),
        })
        .await
    }

    async fn stop_tracking(&self, id: &RequestId) -> Result<(), DaemonError> {
        self.call_unit(DaemonRequest::Stop { id: id.clone() }).await
    }
}

fn response_into_data(request: &DaemonRequest, response: DaemonResponse) -> Result<Value, DaemonError> {
    if response.ok {
        return Ok(response.data.unwrap_or(Value::Null));
    }

    if response.code.as_deref() == Some(NOT_FOUND_CODE) {
        let id = match request {
            DaemonRequest::Get { id }
            | DaemonRequest::Resubmit { id, .. }
            | DaemonRequest::Stop { id } => Some(id.clone()),
            _ => None,
        };
        if let Some(request_id) = id {
            return Err(DaemonError::NotFound { request_id });
        }
    }

    Err(DaemonError::Rejected {
        operation: request.operation(),
        reason: response
            .error
            .unwrap_or_else(|| "unknown daemon error".to_string()),
        code: response.code,
    })
}
