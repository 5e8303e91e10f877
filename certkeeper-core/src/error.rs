//! Error types for certkeeper-core.

use std::path::PathBuf;

use thiserror::Error;

/// Contradictory or incomplete desired state. Raised before the daemon is
/// ever contacted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("`key` and `nss_db` are mutually exclusive; choose file or NSS database storage")]
    StorageConflict,

    #[error("one of `key` or `nss_db` is required")]
    MissingStorage,

    #[error("`key` and `cert` must be given together")]
    KeyCertNotTogether,

    #[error("`nss_db` and `nss_nickname` must be given together")]
    NssIncomplete,

    #[error("`password` and `password_file` are mutually exclusive")]
    PinConflict,

    #[error("`principal` is required when requesting from the IPA authority")]
    MissingPrincipal,

    #[error("`{field}` must not be empty")]
    Empty { field: &'static str },

    /// The default subject needs the host name and it could not be read.
    #[error("cannot determine host name for the default subject: {0}")]
    Hostname(String),
}

/// Errors from loading settings and manifest files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, annotated with the file involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error, includes file path and serde_yaml's line context.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("manifest not found at {path}")]
    NotFound { path: PathBuf },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
