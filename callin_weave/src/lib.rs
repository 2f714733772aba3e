//! Callin binding dispatch engine.
//!
//! Calls to woven base methods are intercepted and redirected to role
//! methods of the currently active teams, as before, replace or after
//! callins. The engine is organized leaves first:
//!
//! - [`catalog`]: decoded callin bindings per team type
//! - [`plan`]: per (team type, base method) dispatch plans and their cache
//! - [`resolver`]: lifting base objects to roles, resolving role methods
//! - [`dispatcher`]: the before/replace/after state machine
//! - [`registry`]: weak directory of callin labels to bindings
//! - [`gateway`]: the per-call entry point and team-type lifecycle
//!
//! The host runtime plugs in through two traits, [`TypeResolver`] and
//! [`Invoker`]. [`scenario`] provides an in-memory implementation of both.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use callin_weave::prelude::*;
//! use callin_weave::scenario::{Behavior, ScriptedHost};
//!
//! let host = Arc::new(ScriptedHost::new());
//! let debit = BaseMethod::new("Account", "debit", "(I)I");
//! host.define_original(debit.clone(), Behavior::ReturnArg(0));
//!
//! let gateway = InvocationGateway::new(host.clone(), host.clone());
//! let result = gateway
//!     .call(&debit, Value::Object(ObjectRef::new("Account", 1)), &[], BoundMethodId(0), vec![Value::I32(5)])
//!     .unwrap();
//! assert_eq!(result, Value::I32(5));
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

pub mod binding;
pub mod catalog;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod invoke;
pub mod metadata;
pub mod plan;
pub mod registry;
pub mod resolver;
pub mod scenario;

/// Commonly used types
pub mod prelude {
    pub use crate::binding::{BaseMethod, Binding, CallinKind};
    pub use crate::config::{MissingAfterBindingPolicy, WeaveConfig};
    pub use crate::context::{BoundMethodId, CallContext};
    pub use crate::error::{CallinError, CallinResult, ConfigurationError, LookupError};
    pub use crate::gateway::InvocationGateway;
    pub use crate::invoke::{CallNext, Invoker};
    pub use crate::resolver::{MethodRef, TypeResolver};
    pub use callin_weave_runtime::{HostError, ObjectRef, Symbol, Value};
}

pub use binding::{BaseMethod, Binding, BindingFlags, CallinKind};
pub use catalog::BindingCatalog;
pub use config::{MissingAfterBindingPolicy, WeaveConfig};
pub use context::{BoundMethodId, CallContext};
pub use dispatcher::{CallinDispatcher, Stage};
pub use error::{CallinError, CallinResult, ConfigurationError, LookupError};
pub use gateway::InvocationGateway;
pub use invoke::{CallNext, Invoker};
pub use metadata::{MetadataDocument, RawBaseMethodBinding, RawCallinBinding, TeamMetadata};
pub use plan::{DispatchPlan, DispatchPlanBuilder, PlanCache};
pub use registry::BindingRegistry;
pub use resolver::{MethodRef, RoleResolver, TypeResolver};
