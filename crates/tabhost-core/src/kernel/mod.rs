//! # Tabhost Core Kernel
//!
//! Shared foundations for the rest of `tabhost-core`:
//!
//! - **Core Constants**: file names, default directories and the navigation
//!   root segment, in the `constants` submodule.
//! - **Error Handling**: the top-level [`Error`](error::Error) enum wrapping each
//!   subsystem's typed error, and a `Result` alias, in the `error` submodule.
pub mod constants;
pub mod error;

pub use error::{Error, Result};
