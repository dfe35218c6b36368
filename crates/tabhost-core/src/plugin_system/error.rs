//! # Tabhost Plugin System Errors
//!
//! Defines error types specific to plugin discovery and activation.
//!
//! [`PluginSystemError`] follows the lifecycle of a plugin: configuration files
//! that are missing or malformed, descriptors that fail validation, activation
//! failures (tagged with the [`ActivationStage`] that failed) and icon resolution
//! problems. Everything except `ActivationFailure` is recovered locally by the
//! scan and only logged.
use std::fmt;
use std::path::PathBuf;

use crate::plugin_system::traits::PluginError;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    #[error("No valid configuration found in '{}'", dir.display())]
    ConfigMissing { dir: PathBuf },

    #[error("Malformed plugin configuration '{}': {message}", path.display())]
    ConfigMalformed {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<Box<PluginSystemErrorSource>>,
    },

    #[error("Invalid plugin descriptor in '{}'{}: {message}", dir.display(), plugin.as_deref().map(|p| format!(" for '{}'", p)).unwrap_or_default())]
    DescriptorInvalid {
        dir: PathBuf,
        plugin: Option<String>,
        message: String,
    },

    #[error("Failed to load plugin '{plugin}' ({stage}): {message}")]
    ActivationFailure {
        plugin: String,
        stage: ActivationStage,
        message: String,
        #[source]
        source: Option<Box<PluginSystemErrorSource>>,
    },

    #[error("Icon resolution failed for '{}': {message}", path.display())]
    IconResolution { path: PathBuf, message: String },

    #[error("FFI error in module '{module}' during operation '{operation}': {message}")]
    FfiError {
        module: String,
        operation: String,
        message: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemErrorSource {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Ini(#[from] ini::ParseError),
    #[error("libloading error: {0}")]
    Library(#[from] libloading::Error),
    #[error(transparent)]
    Plugin(#[from] PluginError),
    #[error(transparent)]
    System(Box<PluginSystemError>),
}

/// The step of activation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationStage {
    ResolveEntryPoint,
    LoadModule,
    LookupClass,
    NegotiateCapabilities,
    Construct,
    Run,
}

impl fmt::Display for ActivationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ActivationStage::ResolveEntryPoint => "resolving entry point",
            ActivationStage::LoadModule => "loading module",
            ActivationStage::LookupClass => "looking up class",
            ActivationStage::NegotiateCapabilities => "negotiating capabilities",
            ActivationStage::Construct => "constructing instance",
            ActivationStage::Run => "running",
        };
        f.write_str(label)
    }
}

impl PluginSystemError {
    /// Build an `ActivationFailure` without an underlying source.
    pub fn activation(plugin: impl Into<String>, stage: ActivationStage, message: impl Into<String>) -> Self {
        PluginSystemError::ActivationFailure {
            plugin: plugin.into(),
            stage,
            message: message.into(),
            source: None,
        }
    }

    /// Build a `ConfigMalformed` error carrying its parse/I/O cause.
    pub fn malformed(path: impl Into<PathBuf>, message: impl Into<String>, source: impl Into<PluginSystemErrorSource>) -> Self {
        PluginSystemError::ConfigMalformed {
            path: path.into(),
            message: message.into(),
            source: Some(Box::new(source.into())),
        }
    }

    /// Re-tag an error raised while activating `plugin` as an `ActivationFailure`.
    ///
    /// Errors that already are activation failures keep their original stage.
    pub fn into_activation(self, plugin: &str, stage: ActivationStage) -> Self {
        match self {
            err @ PluginSystemError::ActivationFailure { .. } => err,
            other => PluginSystemError::ActivationFailure {
                plugin: plugin.to_string(),
                stage,
                message: other.to_string(),
                source: Some(Box::new(PluginSystemErrorSource::System(Box::new(other)))),
            },
        }
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic reason".to_string()
    }
}
