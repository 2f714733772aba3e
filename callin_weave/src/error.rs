//! Error types for callin dispatch.
//!
//! Three families, matching how the engine reacts to them:
//!
//! - [`ConfigurationError`]: binding metadata or a call context that is
//!   internally inconsistent. Fatal, never retried.
//! - [`LookupError`]: a lift method or role method that cannot be resolved
//!   against its team or role type. Fatal.
//! - [`HostError`]: raised by woven host code. Handed back unchanged.

use callin_weave_runtime::{HostError, Symbol};
use thiserror::Error;

use crate::binding::CallinKind;

/// Inconsistent binding metadata or call context.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// A callin id in the call context has no binding of the expected kind.
    #[error("no {kind} binding for callin id {callin_id} in team {team_type}")]
    MissingBinding {
        team_type: Symbol,
        callin_id: i32,
        kind: CallinKind,
    },

    /// The plan holds fewer bindings of `kind` than the ordinal asked for.
    #[error("plan has {count} {kind} bindings, no binding at ordinal {ordinal}")]
    MissingOrdinal {
        kind: CallinKind,
        ordinal: usize,
        count: usize,
    },

    /// A computed slot lies outside the active-team arrays.
    #[error("call-context slot {slot} is out of range (length {length})")]
    SlotOutOfRange { slot: usize, length: usize },

    /// `active_teams` and `callin_ids` are not index-aligned.
    #[error("call context holds {teams} teams but {callin_ids} callin ids")]
    MisalignedContext { teams: usize, callin_ids: usize },

    /// A lift method produced something other than a role object.
    #[error("lift method {method} of team {team_type} returned {got} instead of a role object")]
    LiftReturnedNonObject {
        team_type: Symbol,
        method: String,
        got: String,
    },

    /// The callin kind tag is not 1 (before), 2 (replace) or 3 (after).
    #[error("callin binding {label} of team {team_type} has invalid kind tag {tag}")]
    InvalidKind {
        team_type: Symbol,
        label: Symbol,
        tag: i32,
    },

    /// A callin binding that binds no base method.
    #[error("callin binding {label} of team {team_type} binds no base methods")]
    EmptyBinding { team_type: Symbol, label: Symbol },

    /// Callin ids must be non-negative.
    #[error("callin binding {label} of team {team_type} uses negative callin id {callin_id}")]
    NegativeCallinId {
        team_type: Symbol,
        label: Symbol,
        callin_id: i32,
    },

    /// Two distinct bindings of one team share a callin id.
    #[error("callin id {callin_id} of team {team_type} is used by both {first} and {second}")]
    DuplicateCallinId {
        team_type: Symbol,
        callin_id: i32,
        first: Symbol,
        second: Symbol,
    },

    /// A binding selected for a base method does not bind it.
    #[error("binding {label} of team {team_type} does not bind base method {base_method}")]
    UnboundBaseMethod {
        team_type: Symbol,
        label: Symbol,
        base_method: String,
    },

    /// Metadata document could not be parsed.
    #[error("malformed binding metadata ({format}): {message}")]
    MalformedMetadata {
        format: &'static str,
        message: String,
    },
}

/// A lift or role method that cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("team {team_type} declares no lift method {method}")]
    LiftMethod { team_type: Symbol, method: String },

    #[error("role {role_type} has no method {selector}{signature}")]
    RoleMethod {
        role_type: Symbol,
        selector: Symbol,
        signature: Symbol,
    },
}

/// Error produced by a callin dispatch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallinError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// Exception from a role method or the original method, unmodified.
    #[error(transparent)]
    User(#[from] HostError),
}

impl CallinError {
    /// True for internal-invariant violations that abort the whole chain.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CallinError::User(_))
    }

    /// The host exception, if this error came from woven code.
    pub fn as_host_error(&self) -> Option<&HostError> {
        match self {
            CallinError::User(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias for dispatch operations
pub type CallinResult<T> = Result<T, CallinError>;
