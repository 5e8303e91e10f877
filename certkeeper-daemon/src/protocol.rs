//! JSON newline-delimited wire types for the cert daemon socket.
//!
//! One request line, one response line, one connection per operation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use certkeeper_core::{DesiredCertRequest, KeyPin, RequestId, StorageLocation};

/// Parameters for a new tracked request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitParams {
    pub storage: StorageLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_pin: Option<KeyPin>,
    pub ca: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    pub auto_renew: bool,
}

impl From<&DesiredCertRequest> for SubmitParams {
    fn from(desired: &DesiredCertRequest) -> Self {
        Self {
            storage: desired.storage().clone(),
            key_pin: desired.pin().cloned(),
            ca: desired.authority().to_string(),
            nickname: desired.nickname().map(str::to_string),
            subject: desired.subject().to_string(),
            principal: desired.principal().map(str::to_string),
            auto_renew: desired.renew(),
        }
    }
}

/// Optional retargeting applied when resubmitting an existing request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResubmitParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
}

impl From<&DesiredCertRequest> for ResubmitParams {
    fn from(desired: &DesiredCertRequest) -> Self {
        Self {
            ca: Some(desired.authority().to_string()),
            subject: Some(desired.subject().to_string()),
            principal: desired.principal().map(str::to_string),
        }
    }
}

/// JSON newline-delimited request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum DaemonRequest {
    List,
    Get {
        id: RequestId,
    },
    Submit(SubmitParams),
    Resubmit {
        id: RequestId,
        #[serde(flatten)]
        params: ResubmitParams,
    },
    Stop {
        id: RequestId,
    },
}

impl DaemonRequest {
    pub fn operation(&self) -> &'static str {
        match self {
            DaemonRequest::List => "list",
            DaemonRequest::Get { .. } => "get",
            DaemonRequest::Submit(_) => "submit",
            DaemonRequest::Resubmit { .. } => "resubmit",
            DaemonRequest::Stop { .. } => "stop",
        }
    }
}

/// JSON newline-delimited response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl DaemonResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Payload of a successful submit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submitted {
    pub id: RequestId,
}
