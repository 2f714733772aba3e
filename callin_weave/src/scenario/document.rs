//! TOML scenario documents.
//!
//! ```toml
//! [config]
//! missing_after_binding = "fail"
//!
//! [[team]]
//! team_type = "Audit"
//! [[team.bindings]]
//! # RawCallinBinding fields
//!
//! [[lift]]
//! team_type = "Audit"
//! role_class = "Audit$Logger"
//!
//! [[method]]
//! owner = "Audit$Logger"
//! name = "log"
//! signature = "(I)V"
//! behavior = { kind = "return" }
//!
//! [[original]]
//! declaring_class = "Account"
//! name = "debit"
//! signature = "(I)I"
//! behavior = { kind = "return_arg", index = 0 }
//!
//! [[call]]
//! label = "debit"
//! declaring_class = "Account"
//! name = "debit"
//! signature = "(I)I"
//! base = { class = "Account", id = 1 }
//! teams = [{ class = "Audit", id = 1 }]
//! args = [5]
//! ```

use std::path::Path;
use std::sync::Arc;

use callin_weave_runtime::{ObjectRef, Symbol, Value};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::host::{Behavior, ScriptedHost, TraceEvent};
use crate::binding::BaseMethod;
use crate::config::WeaveConfig;
use crate::context::BoundMethodId;
use crate::error::CallinError;
use crate::gateway::InvocationGateway;
use crate::metadata::{MetadataDocument, TeamMetadata};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scenario: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to load team metadata: {0}")]
    Load(#[from] CallinError),
}

/// A literal argument or return value.
///
/// Integers that fit in 32 bits become `int`s, larger ones `long`s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Object(ObjectSpec),
    List(Vec<Literal>),
}

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Bool(b) => Value::from(*b),
            Literal::Int(i) => match i32::try_from(*i) {
                Ok(small) => Value::from(small),
                Err(_) => Value::from(*i),
            },
            Literal::Float(x) => Value::from(*x),
            Literal::Str(s) => Value::from(s.clone()),
            Literal::Object(obj) => Value::from(obj.to_object()),
            Literal::List(items) => {
                Value::from(items.iter().map(Literal::to_value).collect::<Vec<_>>())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSpec {
    pub class: String,
    pub id: u64,
}

impl ObjectSpec {
    pub fn to_object(&self) -> ObjectRef {
        ObjectRef::new(self.class.as_str(), self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BehaviorSpec {
    Return {
        #[serde(default)]
        value: Option<Literal>,
    },
    ReturnArg {
        index: usize,
    },
    CallNext,
    CallNextWith {
        args: Vec<Literal>,
    },
    Throw {
        class: String,
        message: String,
    },
}

impl BehaviorSpec {
    pub fn to_behavior(&self) -> Behavior {
        match self {
            BehaviorSpec::Return { value } => {
                Behavior::Return(value.as_ref().map_or(Value::Nothing, Literal::to_value))
            }
            BehaviorSpec::ReturnArg { index } => Behavior::ReturnArg(*index),
            BehaviorSpec::CallNext => Behavior::CallNext,
            BehaviorSpec::CallNextWith { args } => {
                Behavior::CallNextWith(args.iter().map(Literal::to_value).collect())
            }
            BehaviorSpec::Throw { class, message } => Behavior::Throw {
                class: Symbol::new(class),
                message: message.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiftSpec {
    pub team_type: String,
    pub role_class: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSpec {
    pub owner: String,
    pub name: String,
    pub signature: String,
    pub behavior: BehaviorSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginalSpec {
    pub declaring_class: String,
    pub name: String,
    pub signature: String,
    pub behavior: BehaviorSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSpec {
    #[serde(default)]
    pub label: Option<String>,
    pub declaring_class: String,
    pub name: String,
    pub signature: String,
    pub base: ObjectSpec,
    /// Active teams, highest precedence first.
    #[serde(default)]
    pub teams: Vec<ObjectSpec>,
    #[serde(default)]
    pub args: Vec<Literal>,
    #[serde(default)]
    pub bound_method_id: i32,
    #[serde(default)]
    pub constructor: bool,
}

impl CallSpec {
    pub fn base_method(&self) -> BaseMethod {
        BaseMethod::new(
            self.declaring_class.as_str(),
            self.name.as_str(),
            self.signature.as_str(),
        )
    }

    pub fn bound_method_id(&self) -> BoundMethodId {
        if self.constructor {
            BoundMethodId::constructor(self.bound_method_id)
        } else {
            BoundMethodId(self.bound_method_id)
        }
    }
}

/// Outcome of one scripted call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallReport {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub trace: Vec<TraceEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioDocument {
    #[serde(default)]
    pub config: WeaveConfig,
    #[serde(default, rename = "team")]
    pub teams: Vec<TeamMetadata>,
    #[serde(default, rename = "lift")]
    pub lifts: Vec<LiftSpec>,
    #[serde(default, rename = "method")]
    pub methods: Vec<MethodSpec>,
    #[serde(default, rename = "original")]
    pub originals: Vec<OriginalSpec>,
    #[serde(default, rename = "call")]
    pub calls: Vec<CallSpec>,
}

impl ScenarioDocument {
    pub fn from_toml_str(src: &str) -> Result<Self, ScenarioError> {
        Ok(toml::from_str(src)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&src)
    }

    /// Host with every lift, method and original of this document defined.
    pub fn build_host(&self) -> ScriptedHost {
        let host = ScriptedHost::with_lift_prefix(self.config.lift_method_prefix.clone());
        for lift in &self.lifts {
            host.define_lift(lift.team_type.as_str(), lift.role_class.as_str());
        }
        for method in &self.methods {
            host.define_method(
                method.owner.as_str(),
                method.name.as_str(),
                method.signature.as_str(),
                method.behavior.to_behavior(),
            );
        }
        for original in &self.originals {
            host.define_original(
                BaseMethod::new(
                    original.declaring_class.as_str(),
                    original.name.as_str(),
                    original.signature.as_str(),
                ),
                original.behavior.to_behavior(),
            );
        }
        host
    }

    /// Load the teams and run every call in order. A failing call is
    /// reported and does not stop later calls; a team that fails to load
    /// aborts the run.
    pub fn run(&self) -> Result<Vec<CallReport>, ScenarioError> {
        let host = Arc::new(self.build_host());
        let gateway = InvocationGateway::with_config(self.config.clone(), host.clone(), host.clone());
        gateway.load_metadata(&MetadataDocument {
            teams: self.teams.clone(),
        })?;

        let mut reports = Vec::with_capacity(self.calls.len());
        for (index, call) in self.calls.iter().enumerate() {
            let base_method = call.base_method();
            let teams: Vec<ObjectRef> = call.teams.iter().map(ObjectSpec::to_object).collect();
            let args = call.args.iter().map(Literal::to_value).collect();
            let outcome = gateway.call(
                &base_method,
                Value::Object(call.base.to_object()),
                &teams,
                call.bound_method_id(),
                args,
            );

            let (result, error) = match outcome {
                Ok(value) => (Some(value.to_string()), None),
                Err(err) => (None, Some(err.to_string())),
            };
            reports.push(CallReport {
                label: call
                    .label
                    .clone()
                    .unwrap_or_else(|| format!("call {}", index)),
                result,
                error,
                trace: host.take_trace(),
            });
        }
        Ok(reports)
    }
}
