//! Settings and manifest loading.
//!
//! # Layout
//!
//! ```text
//! ~/.certkeeper/
//!   config.yaml     (optional settings overrides)
//! ```
//!
//! Manifests are standalone YAML files passed on the command line:
//!
//! ```yaml
//! settings:
//!   wait_timeout_secs: 300
//! certificates:
//!   - key: /etc/pki/tls/private/web.key
//!     cert: /etc/pki/tls/certs/web.crt
//!     nickname: web
//! ```
//!
//! # API pattern
//!
//! Functions that read from the home directory come in two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::request::CertRequestSpec;

pub const DEFAULT_SOCKET: &str = "/run/certkeeper/certd.sock";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable overriding the daemon socket.
pub const SOCKET_ENV: &str = "CERTKEEPER_SOCKET";

// ---------------------------------------------------------------------------
// 1. Settings
// ---------------------------------------------------------------------------

/// Effective runtime settings after all layers are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Daemon IPC endpoint.
    pub socket: PathBuf,
    /// Delay between status polls while waiting for issuance.
    pub poll_interval: Duration,
    /// Upper bound on waiting for issuance.
    pub wait_timeout: Duration,
    /// Upper bound on a single daemon round trip.
    pub io_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            socket: PathBuf::from(DEFAULT_SOCKET),
            poll_interval: DEFAULT_POLL_INTERVAL,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }
}

/// Partial settings as written in `config.yaml` or a manifest's `settings:`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io_timeout_secs: Option<u64>,
}

impl Settings {
    /// Layer `overrides` on top of `self`; absent fields keep their value.
    pub fn apply(&mut self, overrides: &SettingsOverrides) {
        if let Some(socket) = &overrides.socket {
            self.socket = socket.clone();
        }
        if let Some(ms) = overrides.poll_interval_ms {
            // A zero interval would turn the waiter into a busy loop.
            self.poll_interval = Duration::from_millis(ms.max(1));
        }
        if let Some(secs) = overrides.wait_timeout_secs {
            self.wait_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = overrides.io_timeout_secs {
            self.io_timeout = Duration::from_secs(secs.max(1));
        }
    }

    /// Apply `CERTKEEPER_SOCKET` if set and non-empty.
    pub fn apply_env(&mut self) {
        if let Some(socket) = std::env::var_os(SOCKET_ENV).filter(|v| !v.is_empty()) {
            self.socket = PathBuf::from(socket);
        }
    }
}

/// `<home>/.certkeeper/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".certkeeper").join("config.yaml")
}

/// Defaults layered with `<home>/.certkeeper/config.yaml` when present.
pub fn load_settings_at(home: &Path) -> Result<Settings, ConfigError> {
    let mut settings = Settings::default();
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(settings);
    }
    let overrides: SettingsOverrides = read_yaml(&path)?;
    settings.apply(&overrides);
    Ok(settings)
}

/// `load_settings_at` convenience wrapper.
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_at(&home()?)
}

// ---------------------------------------------------------------------------
// 2. Manifest
// ---------------------------------------------------------------------------

/// A batch of desired certificates. Entries stay unvalidated here so each can
/// be validated and reconciled on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<SettingsOverrides>,
    #[serde(default)]
    pub certificates: Vec<CertRequestSpec>,
}

/// Load a manifest file.
///
/// Returns `ConfigError::NotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_manifest(path: &Path) -> Result<Manifest, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    read_yaml(path)
}

// ---------------------------------------------------------------------------
// 3. Internal helpers
// ---------------------------------------------------------------------------

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
