//! Callin Weave Runtime Library
//!
//! This crate provides the value model shared between the callin weaving
//! engine and the host runtime that executes base, lift and role methods.
//! It includes:
//!
//! - `Symbol` for cheaply cloneable, content-compared names
//! - `ObjectRef` opaque handles to host objects (bases, teams, roles)
//! - `Value` enum for arguments and results crossing the dispatch boundary
//! - `HostError` for exceptions raised by host code

pub mod error;
pub mod symbol;
pub mod value;

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use callin_weave_runtime::prelude::*;
/// ```
pub mod prelude {
    pub use super::error::{HostError, HostResult};
    pub use super::symbol::Symbol;
    pub use super::value::{ObjectRef, Value};
}

pub use prelude::*;
