//! certkeeper core library: domain types, input validation, settings.
//!
//! - [`types`]: request ids, statuses, storage locations, results
//! - [`request`]: [`CertRequestSpec`] and its validated [`DesiredCertRequest`]
//! - [`config`]: [`Settings`] layering and manifest loading
//! - [`error`]: [`ValidationError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod request;
pub mod types;

pub use config::{Manifest, Settings, SettingsOverrides};
pub use error::{ConfigError, ValidationError};
pub use request::{CertRequestSpec, DesiredCertRequest};
pub use types::{
    Action, KeyPin, Phase, ReconciliationResult, RequestId, RequestStatus, StorageLocation,
    TargetState, TrackedRequest,
};
