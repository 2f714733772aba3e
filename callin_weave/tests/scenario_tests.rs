//! Tests for TOML scenario documents.

use std::io::Write;

use callin_weave::config::MissingAfterBindingPolicy;
use callin_weave::scenario::{CallReport, ScenarioDocument, ScenarioError};
use pretty_assertions::assert_eq;

const BANK: &str = r#"
[config]
missing_after_binding = "fail"

[[team]]
team_type = "Audit"

[[team.bindings]]
role_class = "Audit$Guard"
callin_label = "limit"
role_selector = "limit"
role_signature = "(I)I"
base_class = "Account"
kind = 2

[[team.bindings.base_methods]]
name = "debit"
signature = "(I)I"
declaring_class = "Account"
callin_id = 0

[[team.bindings]]
role_class = "Audit$Guard"
callin_label = "record"
role_selector = "record"
role_signature = "(I)I"
base_class = "Account"
kind = 3

[[team.bindings.base_methods]]
name = "debit"
signature = "(I)I"
declaring_class = "Account"
callin_id = 1

[[lift]]
team_type = "Audit"
role_class = "Audit$Guard"

[[method]]
owner = "Audit$Guard"
name = "limit"
signature = "(I)I"
behavior = { kind = "call_next_with", args = [50] }

[[method]]
owner = "Audit$Guard"
name = "record"
signature = "(I)I"
behavior = { kind = "return" }

[[original]]
declaring_class = "Account"
name = "debit"
signature = "(I)I"
behavior = { kind = "return_arg", index = 0 }

[[call]]
label = "woven"
declaring_class = "Account"
name = "debit"
signature = "(I)I"
base = { class = "Account", id = 1 }
teams = [{ class = "Audit", id = 1 }]
args = [80]

[[call]]
declaring_class = "Account"
name = "debit"
signature = "(I)I"
base = { class = "Account", id = 2 }
args = [80]
"#;

#[test]
fn test_scenario_parses_config_and_sections() {
    let doc = ScenarioDocument::from_toml_str(BANK).unwrap();
    assert_eq!(doc.config.missing_after_binding, MissingAfterBindingPolicy::Fail);
    assert!(doc.config.plan_cache);
    assert_eq!(doc.teams.len(), 1);
    assert_eq!(doc.teams[0].bindings.len(), 2);
    assert_eq!(doc.methods.len(), 2);
    assert_eq!(doc.calls.len(), 2);
}

#[test]
fn test_scenario_run_reports_each_call() {
    let reports = ScenarioDocument::from_toml_str(BANK).unwrap().run().unwrap();
    assert_eq!(reports.len(), 2);

    let woven = &reports[0];
    assert_eq!(woven.label, "woven");
    assert_eq!(woven.result.as_deref(), Some("50"));
    assert_eq!(woven.error, None);
    let lines: Vec<String> = woven.trace.iter().map(ToString::to_string).collect();
    insta::assert_snapshot!(lines.join("\n"), @r"
    lift Audit#1 -> Audit$Guard#1000
    replace Audit$Guard.limit @2
    original Account.debit(50) on Account#1
    lift Audit#1 -> Audit$Guard#1000
    invoke Audit$Guard.record(Audit$Guard#1000, 80, 50)
    ");

    let plain = &reports[1];
    assert_eq!(
        plain,
        &CallReport {
            label: "call 1".to_string(),
            result: Some("80".to_string()),
            error: None,
            trace: plain.trace.clone(),
        }
    );
    assert_eq!(plain.trace.len(), 1);
}

#[test]
fn test_scenario_report_json_shape() {
    let reports = ScenarioDocument::from_toml_str(BANK).unwrap().run().unwrap();
    let json = serde_json::to_value(&reports[1]).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "label": "call 1",
            "result": "80",
            "trace": ["original Account.debit(80) on Account#2"],
        })
    );
}

#[test]
fn test_failing_call_is_reported_not_fatal() {
    let src = BANK.replace(r#"behavior = { kind = "return" }"#, r#"behavior = { kind = "throw", class = "AuditException", message = "ledger closed" }"#);
    let reports = ScenarioDocument::from_toml_str(&src).unwrap().run().unwrap();
    assert_eq!(reports[0].result, None);
    assert_eq!(reports[0].error.as_deref(), Some("AuditException: ledger closed"));
    assert_eq!(reports[1].result.as_deref(), Some("80"));
}

#[test]
fn test_invalid_team_metadata_aborts_run() {
    let src = BANK.replace("kind = 3", "kind = 0");
    let err = ScenarioDocument::from_toml_str(&src).unwrap().run().unwrap_err();
    assert!(matches!(err, ScenarioError::Load(_)));
}

#[test]
fn test_scenario_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(BANK.as_bytes()).unwrap();
    let doc = ScenarioDocument::from_file(file.path()).unwrap();
    assert_eq!(doc.lifts.len(), 1);

    let missing = ScenarioDocument::from_file(file.path().with_extension("missing"));
    assert!(matches!(missing, Err(ScenarioError::Io { .. })));
}
