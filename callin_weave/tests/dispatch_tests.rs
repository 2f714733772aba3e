//! Tests for before/replace/after dispatch and constructor after callins.

mod common;

use common::*;

use callin_weave::prelude::*;
use callin_weave::scenario::{Behavior, TraceEvent};
use pretty_assertions::assert_eq;

// ==================== Stage Ordering ====================

#[test]
fn test_before_replace_after_order() {
    let world = audit_world();
    let result = world.debit(&[team("Audit", 1)], 5).unwrap();
    assert_eq!(result, Value::I32(5));

    insta::assert_snapshot!(world.trace(), @r"
    lift Audit#1 -> Audit$Guard#1000
    invoke Audit$Guard.check(Audit$Guard#1000, 5)
    lift Audit#1 -> Audit$Guard#1000
    replace Audit$Guard.wrap @3
    original Account.debit(5) on Account#1
    lift Audit#1 -> Audit$Guard#1000
    invoke Audit$Guard.log(Audit$Guard#1000, 5, 5)
    ");
}

#[test]
fn test_after_runs_when_no_replace_binding() {
    let world = World::new();
    world.load(
        "Audit",
        &[
            raw("Audit", "check", CallinKind::Before, 0),
            raw("Audit", "log", CallinKind::After, 1),
        ],
    );
    world.role_method("Audit", "check", Behavior::Return(Value::Nothing));
    world.role_method("Audit", "log", Behavior::Return(Value::Nothing));

    let result = world.debit(&[team("Audit", 1)], 8).unwrap();
    assert_eq!(result, Value::I32(8));
    assert_eq!(
        world.host.trace_lines(),
        vec![
            "lift Audit#1 -> Audit$Guard#1000",
            "invoke Audit$Guard.check(Audit$Guard#1000, 8)",
            "original Account.debit(8) on Account#1",
            "lift Audit#1 -> Audit$Guard#1000",
            "invoke Audit$Guard.log(Audit$Guard#1000, 8, 8)",
        ]
    );
}

#[test]
fn test_before_callins_of_one_team_run_in_catalog_order() {
    let world = World::new();
    world.load(
        "Audit",
        &[
            raw("Audit", "first", CallinKind::Before, 0),
            raw("Audit", "wrap", CallinKind::Replace, 1),
            raw("Audit", "second", CallinKind::Before, 2),
        ],
    );
    world.role_method("Audit", "first", Behavior::Return(Value::Nothing));
    world.role_method("Audit", "second", Behavior::Return(Value::Nothing));
    world.role_method("Audit", "wrap", Behavior::Return(Value::I32(-1)));

    let result = world.debit(&[team("Audit", 1)], 3).unwrap();
    assert_eq!(result, Value::I32(-1));

    let invoked: Vec<String> = world
        .host
        .trace()
        .into_iter()
        .filter_map(|event| match event {
            TraceEvent::Invoke { method, .. } => Some(method.name.to_string()),
            TraceEvent::Replace { method, .. } => Some(method.name.to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(invoked, vec!["first", "second", "wrap"]);
}

#[test]
fn test_replace_without_call_next_skips_original() {
    let world = World::new();
    world.load("Audit", &[raw("Audit", "deny", CallinKind::Replace, 0)]);
    world.role_method("Audit", "deny", Behavior::Return(Value::I32(0)));

    assert_eq!(world.debit(&[team("Audit", 1)], 9).unwrap(), Value::I32(0));
    assert!(!world.trace().contains("original"));
}

#[test]
fn test_replace_receives_call_context_abi() {
    let world = World::new();
    world.load("Audit", &[raw("Audit", "echo", CallinKind::Replace, 4)]);
    world.role_method("Audit", "echo", Behavior::ReturnArg(4));

    // argument 4 of the replace tuple is the callin id array
    let result = world.debit(&[team("Audit", 1)], 2).unwrap();
    assert_eq!(result, Value::IntArray(vec![4]));
}

// ==================== No Active Teams ====================

#[test]
fn test_zero_teams_calls_original_only() {
    let world = audit_world();
    let result = world.debit(&[], 11).unwrap();
    assert_eq!(result, Value::I32(11));
    assert_eq!(world.trace(), "original Account.debit(11) on Account#1");
    assert_eq!(world.gateway.resolver().cached_len(), 0);
    assert!(world.gateway.plans().is_empty());
}

#[test]
fn test_team_without_bindings_is_left_out() {
    let world = audit_world();
    let ctx = world.gateway.prepare_call(
        &debit(),
        account(1),
        &[team("Bystander", 7), team("Audit", 1)],
        BoundMethodId(0),
        vec![Value::I32(1)],
    );
    assert_eq!(ctx.active_teams, vec![team("Audit", 1); 3]);
    assert_eq!(ctx.callin_ids, vec![0, 1, 2]);
}

#[test]
fn test_unknown_team_type_in_context_runs_original() {
    let world = audit_world();
    let mut ctx = CallContext::new(
        account(1),
        vec![team("Bystander", 7)],
        vec![0],
        BoundMethodId(0),
        vec![Value::I32(4)],
    )
    .unwrap();
    let result = world.gateway.dispatch(&debit(), &mut ctx).unwrap();
    assert_eq!(result, Value::I32(4));
    assert_eq!(world.trace(), "original Account.debit(4) on Account#1");
}

// ==================== Faults ====================

#[test]
fn test_missing_before_binding_is_fatal() {
    let world = audit_world();
    let mut ctx = CallContext::new(
        account(1),
        vec![team("Audit", 1); 3],
        vec![9, 1, 2],
        BoundMethodId(0),
        vec![Value::I32(5)],
    )
    .unwrap();

    let err = world.gateway.dispatch(&debit(), &mut ctx).unwrap_err();
    assert_eq!(
        err,
        CallinError::Configuration(ConfigurationError::MissingBinding {
            team_type: Symbol::new("Audit"),
            callin_id: 9,
            kind: CallinKind::Before,
        })
    );
    assert!(err.is_fatal());
    assert!(world.host.trace().is_empty());
}

#[test]
fn test_misaligned_context_is_rejected() {
    let world = audit_world();
    let mut ctx = CallContext::unwoven(account(1), BoundMethodId(0), vec![]);
    ctx.active_teams.push(team("Audit", 1));
    let err = world.gateway.dispatch(&debit(), &mut ctx).unwrap_err();
    assert!(matches!(
        err,
        CallinError::Configuration(ConfigurationError::MisalignedContext { teams: 1, callin_ids: 0 })
    ));
}

#[test]
fn test_host_exception_propagates_unchanged() {
    let world = audit_world();
    let thrown = HostError::thrown("IllegalStateException", "account frozen");
    world.role_method(
        "Audit",
        "check",
        Behavior::Throw {
            class: Symbol::new("IllegalStateException"),
            message: "account frozen".to_string(),
        },
    );

    let err = world.debit(&[team("Audit", 1)], 5).unwrap_err();
    assert_eq!(err, CallinError::User(thrown));
    assert!(!err.is_fatal());
    assert!(!world.trace().contains("replace"));
}

#[test]
fn test_missing_role_method_is_lookup_error() {
    let world = World::new();
    world.load("Audit", &[raw("Audit", "absent", CallinKind::Before, 0)]);
    let err = world.debit(&[team("Audit", 1)], 5).unwrap_err();
    assert!(matches!(err, CallinError::Lookup(LookupError::RoleMethod { .. })));
}

#[test]
fn test_missing_lift_method_is_lookup_error() {
    let world = World::new();
    world
        .gateway
        .load_team_type("Audit", &[raw("Audit", "check", CallinKind::Before, 0)])
        .unwrap();
    let err = world.debit(&[team("Audit", 1)], 5).unwrap_err();
    assert_eq!(
        err,
        CallinError::Lookup(LookupError::LiftMethod {
            team_type: Symbol::new("Audit"),
            method: "_OT$liftTo$Audit$Guard".to_string(),
        })
    );
}

// ==================== After Stage Policy ====================

fn replace_then_after(config: WeaveConfig) -> World {
    let world = World::with_config(config);
    world.load(
        "Audit",
        &[
            raw("Audit", "wrap", CallinKind::Replace, 0),
            raw("Audit", "log", CallinKind::After, 1),
        ],
    );
    world.role_method("Audit", "wrap", Behavior::Return(Value::I32(42)));
    world.role_method("Audit", "log", Behavior::Return(Value::Nothing));
    world
}

fn context_with_ids(ids: Vec<i32>) -> CallContext {
    CallContext::new(
        account(1),
        vec![team("Audit", 1); ids.len()],
        ids,
        BoundMethodId(0),
        vec![Value::I32(5)],
    )
    .unwrap()
}

#[test]
fn test_missing_after_binding_stops_by_default() {
    let world = replace_then_after(WeaveConfig::default());
    let mut ctx = context_with_ids(vec![0, 9]);
    let result = world.gateway.dispatch(&debit(), &mut ctx).unwrap();
    assert_eq!(result, Value::I32(42));
    assert!(!world.trace().contains("log"));
}

#[test]
fn test_after_slot_out_of_range_stops_by_default() {
    let world = replace_then_after(WeaveConfig::default());
    let mut ctx = context_with_ids(vec![0]);
    let result = world.gateway.dispatch(&debit(), &mut ctx).unwrap();
    assert_eq!(result, Value::I32(42));
}

#[test]
fn test_missing_after_binding_fails_under_fail_policy() {
    let config = WeaveConfig {
        missing_after_binding: MissingAfterBindingPolicy::Fail,
        ..WeaveConfig::default()
    };
    let world = replace_then_after(config);
    let mut ctx = context_with_ids(vec![0, 9]);
    let err = world.gateway.dispatch(&debit(), &mut ctx).unwrap_err();
    assert_eq!(
        err,
        CallinError::Configuration(ConfigurationError::MissingBinding {
            team_type: Symbol::new("Audit"),
            callin_id: 9,
            kind: CallinKind::After,
        })
    );
}

// ==================== Constructors ====================

#[test]
fn test_constructor_runs_only_after_callins() {
    let world = audit_world();
    let result = world
        .gateway
        .call(
            &debit(),
            account(1),
            &[team("Audit", 1)],
            BoundMethodId::constructor(3),
            vec![Value::I32(5)],
        )
        .unwrap();
    assert_eq!(result, Value::Nothing);
    assert_eq!(
        world.host.trace_lines(),
        vec![
            "lift Audit#1 -> Audit$Guard#1000",
            "invoke Audit$Guard.log(Audit$Guard#1000, 5, null)",
        ]
    );
}

fn construct(world: &World, teams: &[ObjectRef]) -> CallinResult<Value> {
    world.gateway.call(
        &debit(),
        account(1),
        teams,
        BoundMethodId::constructor(3),
        vec![Value::I32(5)],
    )
}

#[test]
fn test_constructor_runs_after_callins_of_every_team() {
    let world = audit_world();
    world.load("Bonus", &[raw("Bonus", "log", CallinKind::After, 0)]);
    world.role_method("Bonus", "log", Behavior::Return(Value::Nothing));

    let result = construct(&world, &[team("Audit", 1), team("Bonus", 1)]).unwrap();
    assert_eq!(result, Value::Nothing);
    insta::assert_snapshot!(world.trace(), @r"
    lift Audit#1 -> Audit$Guard#1000
    invoke Audit$Guard.log(Audit$Guard#1000, 5, null)
    lift Bonus#1 -> Bonus$Guard#1001
    invoke Bonus$Guard.log(Bonus$Guard#1001, 5, null)
    ");
}

#[test]
fn test_constructor_never_calls_original() {
    let world = audit_world();
    assert_eq!(construct(&world, &[]).unwrap(), Value::Nothing);
    assert_eq!(construct(&world, &[team("Audit", 1)]).unwrap(), Value::Nothing);
    assert!(!world.trace().contains("original"));
}

#[test]
fn test_constructor_after_failure_stops_later_teams() {
    let world = audit_world();
    world.role_method(
        "Audit",
        "log",
        Behavior::Throw {
            class: Symbol::new("IllegalStateException"),
            message: "closed".to_string(),
        },
    );
    world.load("Bonus", &[raw("Bonus", "log", CallinKind::After, 0)]);
    world.role_method("Bonus", "log", Behavior::Return(Value::Nothing));

    let err = construct(&world, &[team("Audit", 1), team("Bonus", 1)]).unwrap_err();
    assert_eq!(
        err.as_host_error(),
        Some(&HostError::thrown("IllegalStateException", "closed"))
    );
    assert!(!world.trace().contains("Bonus"));
}
