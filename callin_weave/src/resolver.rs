//! Lifting and role-method resolution.
//!
//! The host's type system is reached through [`TypeResolver`]; the engine
//! only asks two questions of it: "which method does type T declare under
//! this name" (lift methods) and "which method does type T have with this
//! name and signature" (role methods). Answers are memoized per team type
//! and role type until the owning team type is unloaded.

use std::fmt;
use std::sync::Arc;

use callin_weave_runtime::{ObjectRef, Symbol, Value};
use dashmap::DashMap;
use tracing::trace;

use crate::binding::Binding;
use crate::error::{CallinResult, ConfigurationError, LookupError};
use crate::invoke::Invoker;

/// A resolved, invocable host method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub owner: Symbol,
    pub name: Symbol,
    pub signature: Symbol,
}

impl MethodRef {
    pub fn new(
        owner: impl Into<Symbol>,
        name: impl Into<Symbol>,
        signature: impl Into<Symbol>,
    ) -> Self {
        MethodRef {
            owner: owner.into(),
            name: name.into(),
            signature: signature.into(),
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.signature)
    }
}

/// The host's method and type system.
pub trait TypeResolver: Send + Sync {
    /// A method declared directly on `ty` with the given name, any signature.
    fn find_declared_method(&self, ty: &Symbol, name: &str) -> Option<MethodRef>;

    /// A method of `ty` (declared or inherited) with exact name and signature.
    fn lookup_method(&self, ty: &Symbol, name: &Symbol, signature: &Symbol) -> Option<MethodRef>;
}

type LiftKey = (Symbol, Symbol);
type RoleMethodKey = (Symbol, Symbol, Symbol);

/// Lifts base objects into roles and resolves role methods.
pub struct RoleResolver {
    types: Arc<dyn TypeResolver>,
    lift_prefix: String,
    caching: bool,
    lift_methods: DashMap<LiftKey, MethodRef>,
    role_methods: DashMap<RoleMethodKey, MethodRef>,
}

impl fmt::Debug for RoleResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleResolver")
            .field("lift_prefix", &self.lift_prefix)
            .field("caching", &self.caching)
            .field("lift_methods", &self.lift_methods.len())
            .field("role_methods", &self.role_methods.len())
            .finish_non_exhaustive()
    }
}

impl RoleResolver {
    pub fn new(types: Arc<dyn TypeResolver>, lift_prefix: impl Into<String>, caching: bool) -> Self {
        RoleResolver {
            types,
            lift_prefix: lift_prefix.into(),
            caching,
            lift_methods: DashMap::new(),
            role_methods: DashMap::new(),
        }
    }

    pub fn types(&self) -> &Arc<dyn TypeResolver> {
        &self.types
    }

    /// Name of the generated lift method for `role_class`.
    pub fn lift_method_name(&self, role_class: &Symbol) -> String {
        format!("{}{}", self.lift_prefix, role_class)
    }

    pub fn lookup_lift_method(&self, team_type: &Symbol, role_class: &Symbol) -> CallinResult<MethodRef> {
        let key = (team_type.clone(), role_class.clone());
        if self.caching {
            if let Some(found) = self.lift_methods.get(&key) {
                return Ok(found.value().clone());
            }
        }

        let name = self.lift_method_name(role_class);
        let method = self
            .types
            .find_declared_method(team_type, &name)
            .ok_or_else(|| LookupError::LiftMethod {
                team_type: team_type.clone(),
                method: name,
            })?;

        if self.caching {
            self.lift_methods.insert(key, method.clone());
        }
        Ok(method)
    }

    /// Lift `bound_base` into the role `binding` refers to, as seen by `team`.
    pub fn lift(
        &self,
        invoker: &dyn Invoker,
        team: &ObjectRef,
        bound_base: &Value,
        binding: &Binding,
    ) -> CallinResult<ObjectRef> {
        let method = self.lookup_lift_method(&team.class, &binding.role_class)?;
        let args = [Value::Object(team.clone()), bound_base.clone()];
        match invoker.invoke(&method, &args)? {
            Value::Object(role) => {
                trace!(team = %team, role = %role, "lifted base object");
                Ok(role)
            }
            other => Err(ConfigurationError::LiftReturnedNonObject {
                team_type: team.class.clone(),
                method: method.to_string(),
                got: other.type_name().to_string(),
            }
            .into()),
        }
    }

    /// Role method named by `binding`'s selector and signature on `role_type`.
    ///
    /// `team_type` scopes the cache entry so it is dropped with the team.
    pub fn resolve_role_method(
        &self,
        team_type: &Symbol,
        role_type: &Symbol,
        binding: &Binding,
    ) -> CallinResult<MethodRef> {
        let key = (
            role_type.clone(),
            binding.role_selector.clone(),
            binding.role_signature.clone(),
        );
        if self.caching {
            if let Some(found) = self.role_methods.get(&key) {
                return Ok(found.value().clone());
            }
        }

        let method = self
            .types
            .lookup_method(role_type, &binding.role_selector, &binding.role_signature)
            .ok_or_else(|| LookupError::RoleMethod {
                role_type: role_type.clone(),
                selector: binding.role_selector.clone(),
                signature: binding.role_signature.clone(),
            })?;

        if self.caching {
            trace!(team_type = %team_type, method = %method, "caching role method");
            self.role_methods.insert(key, method.clone());
        }
        Ok(method)
    }

    /// Forget resolutions that may refer to `team_type` or its roles.
    ///
    /// Role types are not tracked per team, so the role-method cache is
    /// cleared wholesale.
    pub fn invalidate_team(&self, team_type: &Symbol) {
        self.lift_methods.retain(|(team, _), _| team != team_type);
        self.role_methods.clear();
    }

    pub fn cached_len(&self) -> usize {
        self.lift_methods.len() + self.role_methods.len()
    }
}
