//! Scripted host for exercising the engine without a real runtime.
//!
//! [`ScriptedHost`] answers type-resolution queries and invocations from a
//! table of scripted [`Behavior`]s and records every interaction as a
//! [`TraceEvent`]. [`ScenarioDocument`] describes a host, its team metadata
//! and a list of calls in TOML, which is what the `weave-trace` tool runs.

mod document;
mod host;

pub use document::{
    BehaviorSpec, CallReport, CallSpec, LiftSpec, Literal, MethodSpec, ObjectSpec, OriginalSpec,
    ScenarioDocument, ScenarioError,
};
pub use host::{Behavior, ScriptedHost, TraceEvent, FIRST_ROLE_ID};
