//! # Tabhost Storage
//!
//! Host configuration: the [`ConfigData`] key/value bag, readable from JSON,
//! YAML or TOML depending on enabled features, and the typed [`HostConfig`]
//! view the binary starts from.
pub mod config;
pub mod error;

pub use config::{ConfigData, ConfigFormat, HostConfig};
pub use error::StorageSystemError;
