use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Oracle error: {0}")]
    Oracle(String),

    #[error("Oracle binary not found")]
    OracleBinaryNotFound,

    #[error("Oracle response for task '{task}' could not be parsed")]
    OracleResponseInvalid { task: String, raw: String },

    #[error("Malformed decomposition from task '{task}': {reason}")]
    MalformedDecomposition {
        task: String,
        reason: String,
        payload: String,
    },

    #[error("Task '{task}' references unknown node '{node}'")]
    UnknownNodeReference { task: String, node: String },

    #[error("Task '{task}' picked '{choice}', expected exactly one of {candidates:?}")]
    AmbiguousBranchSelection {
        task: String,
        choice: String,
        candidates: Vec<String>,
    },

    #[error("Oracle call for task '{task}' timed out after {after:?}")]
    OracleTimeout { task: String, after: Duration },

    #[error("Task '{task}' would nest graphs deeper than {limit}")]
    DepthLimitExceeded { task: String, limit: usize },

    #[error("Traversal exceeded {limit} node visits")]
    VisitLimitExceeded { limit: usize },

    #[error("Run cancelled")]
    Cancelled,

    #[error("Traversal stalled with no pending oracle calls")]
    Stalled,
}

impl Error {
    /// Name of the task whose oracle output caused the failure, if any.
    pub fn task(&self) -> Option<&str> {
        match self {
            Error::OracleResponseInvalid { task, .. }
            | Error::MalformedDecomposition { task, .. }
            | Error::UnknownNodeReference { task, .. }
            | Error::AmbiguousBranchSelection { task, .. }
            | Error::OracleTimeout { task, .. }
            | Error::DepthLimitExceeded { task, .. } => Some(task),
            _ => None,
        }
    }

    /// Raw oracle payload attached to the failure, if any.
    pub fn payload(&self) -> Option<&str> {
        match self {
            Error::OracleResponseInvalid { raw, .. } => Some(raw),
            Error::MalformedDecomposition { payload, .. } => Some(payload),
            Error::AmbiguousBranchSelection { choice, .. } => Some(choice),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
