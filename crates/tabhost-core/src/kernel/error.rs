//! # Tabhost Core Kernel Errors
//!
//! Defines the top-level error type of `tabhost-core`.
//!
//! [`Error`] wraps the typed errors of each subsystem: the plugin system
//! ([`PluginSystemError`]), host configuration storage ([`StorageSystemError`])
//! and the runtime environment registry ([`RuntimeEnvError`]).
use std::result::Result as StdResult;

use crate::plugin_system::error::PluginSystemError;
use crate::runtime_env::error::RuntimeEnvError;
use crate::storage::error::StorageSystemError;
use thiserror::Error as ThisError;

/// Custom error type for the tabhost core
#[derive(Debug, ThisError)]
pub enum Error {
    /// Specific, typed plugin system error
    #[error("Plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    /// Specific, typed storage system error
    #[error("Storage system error: {0}")]
    StorageSystem(#[from] StorageSystemError),

    /// Runtime environment registry error
    #[error("Runtime environment error: {0}")]
    RuntimeEnv(#[from] RuntimeEnvError),
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;
