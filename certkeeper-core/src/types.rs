//! Domain types shared by the daemon client, the reconciler and the CLI.
//!
//! All filesystem locations use `PathBuf`; they are opaque to certkeeper and
//! only ever compared or handed to the daemon, never opened.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Identifier the daemon assigns to a tracked request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Declared end state for a certificate slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetState {
    #[default]
    Present,
    Absent,
    Resubmitted,
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetState::Present => write!(f, "present"),
            TargetState::Absent => write!(f, "absent"),
            TargetState::Resubmitted => write!(f, "resubmitted"),
        }
    }
}

impl std::str::FromStr for TargetState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "present" => Ok(TargetState::Present),
            "absent" => Ok(TargetState::Absent),
            "resubmitted" => Ok(TargetState::Resubmitted),
            other => Err(format!(
                "unknown state '{other}'; expected: present, absent, resubmitted"
            )),
        }
    }
}

/// Coarse classification of a [`RequestStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The daemon is still working towards issuance.
    InProgress,
    /// Certificate issued and being monitored for renewal.
    Issued,
    /// The daemon stopped progressing; external intervention is needed.
    Failed,
}

/// Lifecycle state of a tracked request as reported by the daemon.
///
/// Raw daemon strings are mapped here once; anything unrecognised is kept
/// verbatim in [`RequestStatus::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequestStatus {
    NewlyAdded,
    GeneratingKeyPair,
    GeneratingCsr,
    NeedToSubmit,
    Submitting,
    CaWorking,
    NeedToSaveCert,
    SavingCert,
    Monitoring,
    CaRejected,
    CaUnreachable,
    NeedCa,
    NeedKeyinfo,
    NeedGuidance,
    Unknown(String),
}

impl RequestStatus {
    /// Parse a daemon status string. Case-insensitive; `-` and spaces count as `_`.
    pub fn from_wire(raw: &str) -> Self {
        let key: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();
        match key.as_str() {
            "NEWLY_ADDED" => Self::NewlyAdded,
            "GENERATING_KEY_PAIR" => Self::GeneratingKeyPair,
            "GENERATING_CSR" => Self::GeneratingCsr,
            "NEED_TO_SUBMIT" => Self::NeedToSubmit,
            "SUBMITTING" => Self::Submitting,
            "CA_WORKING" => Self::CaWorking,
            "NEED_TO_SAVE_CERT" => Self::NeedToSaveCert,
            "SAVING_CERT" => Self::SavingCert,
            "MONITORING" => Self::Monitoring,
            "CA_REJECTED" => Self::CaRejected,
            "CA_UNREACHABLE" => Self::CaUnreachable,
            "NEED_CA" => Self::NeedCa,
            "NEED_KEYINFO" => Self::NeedKeyinfo,
            "NEED_GUIDANCE" => Self::NeedGuidance,
            _ => Self::Unknown(raw.to_string()),
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            Self::Monitoring => Phase::Issued,
            Self::CaRejected
            | Self::CaUnreachable
            | Self::NeedCa
            | Self::NeedKeyinfo
            | Self::NeedGuidance => Phase::Failed,
            _ => Phase::InProgress,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase() != Phase::InProgress
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NewlyAdded => "NEWLY_ADDED",
            Self::GeneratingKeyPair => "GENERATING_KEY_PAIR",
            Self::GeneratingCsr => "GENERATING_CSR",
            Self::NeedToSubmit => "NEED_TO_SUBMIT",
            Self::Submitting => "SUBMITTING",
            Self::CaWorking => "CA_WORKING",
            Self::NeedToSaveCert => "NEED_TO_SAVE_CERT",
            Self::SavingCert => "SAVING_CERT",
            Self::Monitoring => "MONITORING",
            Self::CaRejected => "CA_REJECTED",
            Self::CaUnreachable => "CA_UNREACHABLE",
            Self::NeedCa => "NEED_CA",
            Self::NeedKeyinfo => "NEED_KEYINFO",
            Self::NeedGuidance => "NEED_GUIDANCE",
            Self::Unknown(raw) => raw,
        };
        f.write_str(s)
    }
}

impl From<String> for RequestStatus {
    fn from(s: String) -> Self {
        Self::from_wire(&s)
    }
}

impl From<RequestStatus> for String {
    fn from(s: RequestStatus) -> Self {
        s.to_string()
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Where the key and certificate live. Identifies a certificate slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageLocation {
    Files {
        key: PathBuf,
        cert: PathBuf,
    },
    Nss {
        database: PathBuf,
        nickname: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
}

impl StorageLocation {
    /// Same location with every path lexically normalized.
    pub fn normalized(&self) -> Self {
        match self {
            Self::Files { key, cert } => Self::Files {
                key: normalize_path(key),
                cert: normalize_path(cert),
            },
            Self::Nss {
                database,
                nickname,
                token,
            } => Self::Nss {
                database: normalize_path(database),
                nickname: nickname.clone(),
                token: token.clone(),
            },
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Files { key, cert } => {
                write!(f, "key={} cert={}", key.display(), cert.display())
            }
            Self::Nss {
                database,
                nickname,
                token: Some(token),
            } => write!(
                f,
                "nssdb={} nickname={nickname} token={token}",
                database.display()
            ),
            Self::Nss {
                database, nickname, ..
            } => write!(f, "nssdb={} nickname={nickname}", database.display()),
        }
    }
}

/// Lexical path normalization: drops `.`, resolves `..` against earlier
/// components, and collapses separators. Never touches the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Key encryption PIN, either literal or read by the daemon from a file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPin {
    Pin(String),
    PinFile(PathBuf),
}

impl fmt::Debug for KeyPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPin::Pin(_) => f.write_str("Pin(<redacted>)"),
            KeyPin::PinFile(path) => f.debug_tuple("PinFile").field(path).finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// Daemon-side entity
// ---------------------------------------------------------------------------

/// A certificate the daemon is tracking. Owned by the daemon; certkeeper only
/// reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedRequest {
    pub id: RequestId,
    pub storage: StorageLocation,
    pub authority: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    pub status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default = "default_true")]
    pub auto_renew: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Reconciliation output
// ---------------------------------------------------------------------------

/// The daemon operation a reconciliation performed (or would perform).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Submitted,
    Resubmitted,
    Stopped,
    None,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Submitted => write!(f, "submitted"),
            Action::Resubmitted => write!(f, "resubmitted"),
            Action::Stopped => write!(f, "stopped"),
            Action::None => write!(f, "none"),
        }
    }
}

/// Outcome of one reconciliation run. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    pub changed: bool,
    pub action: Action,
    pub request_id: Option<RequestId>,
    pub final_status: Option<RequestStatus>,
    pub check_mode: bool,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
