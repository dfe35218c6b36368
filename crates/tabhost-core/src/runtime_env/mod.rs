//! # Tabhost Runtime Environments
//!
//! Named directories under the runtime root whose modules can be switched on
//! and off at run time. Activating an environment prepends its directories to
//! the process [`SearchPath`](crate::plugin_system::SearchPath) and, for
//! `common` modules, to the [`ExecutablePath`](crate::plugin_system::ExecutablePath).
//!
//! - `catalog`: the persisted [`EnvironmentCatalog`] (`environments.json`).
//! - `registry`: the [`EnvironmentRegistry`] holding the activation record.
//! - `error`: [`RuntimeEnvError`].
pub mod catalog;
pub mod error;
pub mod registry;

pub use catalog::{EnvironmentCatalog, ModuleEntry, ModuleType};
pub use error::RuntimeEnvError;
pub use registry::{Contribution, EnvironmentRegistry, EnvironmentStatus};

#[cfg(test)]
mod tests;
