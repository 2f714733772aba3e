//! Shared helpers for integration tests
// Each test target uses a different subset of these fixtures.
#![allow(dead_code)]

use std::sync::Arc;

use callin_weave::metadata::{RawBaseMethodBinding, RawCallinBinding};
use callin_weave::prelude::*;
use callin_weave::scenario::{Behavior, ScriptedHost};

/// Signature shared by the base method and every role method in fixtures.
pub const SIG: &str = "(I)I";

pub fn debit() -> BaseMethod {
    BaseMethod::new("Account", "debit", SIG)
}

pub fn account(id: u64) -> Value {
    Value::Object(ObjectRef::new("Account", id))
}

pub fn team(team_type: &str, id: u64) -> ObjectRef {
    ObjectRef::new(team_type, id)
}

/// Role class used by `team_type`'s fixtures.
pub fn role_of(team_type: &str) -> String {
    format!("{}$Guard", team_type)
}

/// A binding of `team_type`'s guard role method `selector` to `Account.debit`.
pub fn raw(team_type: &str, selector: &str, kind: CallinKind, callin_id: i32) -> RawCallinBinding {
    RawCallinBinding {
        role_class: role_of(team_type),
        callin_label: format!("{}_{}", selector, callin_id),
        role_selector: selector.to_string(),
        role_signature: SIG.to_string(),
        base_class: "Account".to_string(),
        kind: kind.tag(),
        flags: 0,
        base_methods: vec![RawBaseMethodBinding {
            name: "debit".to_string(),
            signature: SIG.to_string(),
            declaring_class: "Account".to_string(),
            callin_id,
            base_flags: 0,
        }],
    }
}

/// A scripted host plus a gateway over it.
pub struct World {
    pub host: Arc<ScriptedHost>,
    pub gateway: InvocationGateway,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(WeaveConfig::default())
    }

    pub fn with_config(config: WeaveConfig) -> Self {
        let host = Arc::new(ScriptedHost::with_lift_prefix(config.lift_method_prefix.clone()));
        host.define_original(debit(), Behavior::ReturnArg(0));
        let gateway = InvocationGateway::with_config(config, host.clone(), host.clone());
        World { host, gateway }
    }

    /// Load `team_type` with `records` and script its lift method.
    pub fn load(&self, team_type: &str, records: &[RawCallinBinding]) {
        self.host.define_lift(team_type, role_of(team_type));
        self.gateway
            .load_team_type(team_type, records)
            .unwrap_or_else(|e| panic!("loading {} failed: {}", team_type, e));
    }

    /// Script a role method of `team_type`'s guard role.
    pub fn role_method(&self, team_type: &str, selector: &str, behavior: Behavior) {
        self.host.define_method(role_of(team_type), selector, SIG, behavior);
    }

    /// `Account#1.debit(amount)` with `teams` active.
    pub fn debit(&self, teams: &[ObjectRef], amount: i32) -> CallinResult<Value> {
        self.gateway
            .call(&debit(), account(1), teams, BoundMethodId(0), vec![Value::I32(amount)])
    }

    pub fn trace(&self) -> String {
        self.host.trace_lines().join("\n")
    }
}

/// Audit team with one before, one replace and one after binding.
pub fn audit_world() -> World {
    let world = World::new();
    world.load(
        "Audit",
        &[
            raw("Audit", "check", CallinKind::Before, 0),
            raw("Audit", "wrap", CallinKind::Replace, 1),
            raw("Audit", "log", CallinKind::After, 2),
        ],
    );
    world.role_method("Audit", "check", Behavior::Return(Value::Nothing));
    world.role_method("Audit", "wrap", Behavior::CallNext);
    world.role_method("Audit", "log", Behavior::Return(Value::Nothing));
    world
}
