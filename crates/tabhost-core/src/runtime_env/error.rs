//! # Runtime Environment Errors
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeEnvError {
    #[error("I/O error during operation '{operation}' on path '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed environment catalog '{}': {source}", path.display())]
    CatalogMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed activation record '{}': {source}", path.display())]
    StateMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Environment '{name}' not found under '{}'", dir.display())]
    UnknownEnvironment { name: String, dir: PathBuf },

    #[error("Environment '{0}' is not active")]
    NotActive(String),

    #[error("Executable path contains an entry that cannot be joined: {0}")]
    ExecutablePath(#[from] std::env::JoinPathsError),
}

impl RuntimeEnvError {
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        RuntimeEnvError::Io {
            source,
            operation: operation.into(),
            path,
        }
    }
}
