//! Error taxonomy shared across the harness.
//!
//! | Type          | Raised by                    | Effect                              |
//! |---------------|------------------------------|-------------------------------------|
//! | `StateError`  | gate / orchestrator commands | rejected locally, no side effects   |
//! | `ConfigError` | config load, profile lookup  | rejected before a session exists    |
//! | `ExportError` | result exporters             | logged, session state unaffected    |
//!
//! Emergency, timeout and workload faults are not errors at this level; they
//! are [`AbortReason`](crate::types::AbortReason)s that end a session.

use std::path::PathBuf;
use thiserror::Error;

/// A command was issued against a state that does not accept it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("a benchmark is already running")]
    SessionActive,

    #[error("a benchmark is already waiting for confirmation")]
    ConfirmationPending,

    #[error("a confirmed benchmark is about to start")]
    StartArmed,

    #[error("there is no benchmark waiting for confirmation")]
    NothingPending,

    #[error("no benchmark is running or pending")]
    NotRunning,
}

/// Configuration could not be loaded or does not describe a usable profile.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown profile '{name}' (available: {})", available.join(", "))]
    UnknownProfile {
        name: String,
        available: Vec<String>,
    },

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Writing a finished result somewhere failed.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),
}
