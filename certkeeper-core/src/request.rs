//! Desired certificate state: the raw parameter set and its validated form.
//!
//! [`CertRequestSpec`] is what the CLI flags and manifest entries produce.
//! [`DesiredCertRequest`] can only be obtained by validating one, so every
//! value that reaches the reconciler already satisfies the storage, PIN and
//! principal rules.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{KeyPin, StorageLocation, TargetState};

/// Authority used when none is given: the daemon's self-signed local CA.
pub const DEFAULT_AUTHORITY: &str = "local";

/// Authority name that requires a Kerberos principal.
pub const IPA_AUTHORITY: &str = "IPA";

/// Unvalidated request parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CertRequestSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nss_db: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nss_nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nss_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renew: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<TargetState>,
}

/// Validated desired state for one certificate slot.
///
/// Fields are private: the only way in is [`DesiredCertRequest::from_spec`]
/// (or `TryFrom`), so storage paths are always normalized and the IPA
/// authority always has a principal.
///
/// ```compile_fail
/// fn bypass(desired: &mut certkeeper_core::DesiredCertRequest) {
///     desired.principal = None;
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredCertRequest {
    storage: StorageLocation,
    pin: Option<KeyPin>,
    authority: String,
    nickname: Option<String>,
    subject: String,
    principal: Option<String>,
    renew: bool,
    wait: bool,
    target_state: TargetState,
}

impl DesiredCertRequest {
    /// Validate `spec`. `hostname` is only called when no subject was given.
    pub fn from_spec<F>(spec: CertRequestSpec, hostname: F) -> Result<Self, ValidationError>
    where
        F: FnOnce() -> Result<String, ValidationError>,
    {
        check_not_empty(&spec)?;

        let storage = match (spec.key, spec.cert, spec.nss_db, spec.nss_nickname) {
            (Some(_), _, Some(_), _) => return Err(ValidationError::StorageConflict),
            (Some(key), Some(cert), None, None) if spec.nss_token.is_none() => {
                StorageLocation::Files { key, cert }
            }
            (Some(_), Some(_), None, _) => return Err(ValidationError::NssIncomplete),
            (Some(_), None, _, _) | (None, Some(_), _, _) => {
                return Err(ValidationError::KeyCertNotTogether)
            }
            (None, None, Some(database), Some(nickname)) => StorageLocation::Nss {
                database,
                nickname,
                token: spec.nss_token,
            },
            (None, None, Some(_), None) | (None, None, None, Some(_)) => {
                return Err(ValidationError::NssIncomplete)
            }
            (None, None, None, None) if spec.nss_token.is_some() => {
                return Err(ValidationError::NssIncomplete)
            }
            (None, None, None, None) => return Err(ValidationError::MissingStorage),
        };

        let pin = match (spec.password, spec.password_file) {
            (Some(_), Some(_)) => return Err(ValidationError::PinConflict),
            (Some(pin), None) => Some(KeyPin::Pin(pin)),
            (None, Some(file)) => Some(KeyPin::PinFile(file)),
            (None, None) => None,
        };

        let authority = spec.ca.unwrap_or_else(|| DEFAULT_AUTHORITY.to_string());
        if authority == IPA_AUTHORITY && spec.principal.is_none() {
            return Err(ValidationError::MissingPrincipal);
        }

        let subject = match spec.subject {
            Some(subject) => subject,
            None => format!("CN={}", hostname()?),
        };

        Ok(Self {
            storage: storage.normalized(),
            pin,
            authority,
            nickname: spec.nickname,
            subject,
            principal: spec.principal,
            renew: spec.renew.unwrap_or(true),
            wait: spec.wait.unwrap_or(true),
            target_state: spec.state.unwrap_or_default(),
        })
    }
}

impl DesiredCertRequest {
    /// Normalized storage location; the match key against tracked requests.
    pub fn storage(&self) -> &StorageLocation {
        &self.storage
    }

    pub fn pin(&self) -> Option<&KeyPin> {
        self.pin.as_ref()
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn nickname(&self) -> Option<&str> {
        self.nickname.as_deref()
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    /// Whether the daemon should renew automatically before expiry.
    pub fn renew(&self) -> bool {
        self.renew
    }

    /// Whether reconciliation waits for issuance after a change.
    pub fn wait(&self) -> bool {
        self.wait
    }

    pub fn target_state(&self) -> TargetState {
        self.target_state
    }
}

impl TryFrom<CertRequestSpec> for DesiredCertRequest {
    type Error = ValidationError;

    fn try_from(spec: CertRequestSpec) -> Result<Self, Self::Error> {
        Self::from_spec(spec, local_hostname)
    }
}

/// Host name of this machine, used for the default `CN=<hostname>` subject.
pub fn local_hostname() -> Result<String, ValidationError> {
    hostname::get()
        .map_err(|e| ValidationError::Hostname(e.to_string()))?
        .into_string()
        .map_err(|raw| ValidationError::Hostname(format!("not valid UTF-8: {raw:?}")))
}

fn check_not_empty(spec: &CertRequestSpec) -> Result<(), ValidationError> {
    let strings = [
        ("nss_nickname", spec.nss_nickname.as_deref()),
        ("nss_token", spec.nss_token.as_deref()),
        ("ca", spec.ca.as_deref()),
        ("nickname", spec.nickname.as_deref()),
        ("subject", spec.subject.as_deref()),
        ("principal", spec.principal.as_deref()),
    ];
    let paths = [
        ("key", spec.key.as_ref()),
        ("cert", spec.cert.as_ref()),
        ("nss_db", spec.nss_db.as_ref()),
        ("password_file", spec.password_file.as_ref()),
    ];

    for (field, value) in strings {
        if value.is_some_and(|v| v.trim().is_empty()) {
            return Err(ValidationError::Empty { field });
        }
    }
    for (field, value) in paths {
        if value.is_some_and(|p| p.as_os_str().is_empty()) {
            return Err(ValidationError::Empty { field });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
