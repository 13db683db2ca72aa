// src/error.rs
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::record::Status;

/// Failures raised by a registry session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The target view never showed its readiness marker.
    #[error("navigation to {target} timed out after {waited:?}")]
    NavigationTimeout { target: String, waited: Duration },

    /// An unexpected blocking dialog is in the way. Dismiss it before
    /// anything else can be done on this session.
    #[error("interstitial dialog open: {0}")]
    Interstitial(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Login did not complete. Fatal for the run.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{registry}: login form not found within {waited:?}")]
    FormNotFound { registry: String, waited: Duration },

    #[error("{registry}: still unauthenticated after login")]
    Rejected { registry: String },

    #[error("{registry}: no credentials configured")]
    MissingCredentials { registry: String },

    #[error("{registry}: {source}")]
    Session {
        registry: String,
        #[source]
        source: SessionError,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("could not persist {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },

    #[error("table has no key column (looked for {candidates:?})")]
    MissingKey { candidates: Vec<String> },

    #[error("unknown record {0}")]
    UnknownRecord(String),

    /// An attempt to replace a non-null value. Indicates a resolver bug;
    /// the merge is rejected as a whole.
    #[error("merge conflict on {record_id}.{field}: existing {existing:?}, proposed {proposed:?}")]
    MergeConflict {
        record_id: String,
        field: String,
        existing: String,
        proposed: String,
    },

    #[error("status of {record_id} cannot move from {from} to {to}")]
    StatusRegression {
        record_id: String,
        from: Status,
        to: Status,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors that end a whole run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),
}
