//! In-memory host with scripted method bodies.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use callin_weave_runtime::{HostError, ObjectRef, Symbol, Value};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::binding::BaseMethod;
use crate::config::DEFAULT_LIFT_PREFIX;
use crate::context::BoundMethodId;
use crate::error::CallinResult;
use crate::invoke::{CallNext, Invoker};
use crate::resolver::{MethodRef, TypeResolver};

/// First id handed out to lifted role objects.
pub const FIRST_ROLE_ID: u64 = 1000;

/// What a scripted method does when invoked.
#[derive(Debug, Clone, PartialEq)]
pub enum Behavior {
    Return(Value),
    /// Return the argument at this position.
    ReturnArg(usize),
    /// Lift method: `(team, base)` to a role of this class. One role per
    /// team, role class and base.
    Lift { role_class: Symbol },
    /// Replace method that continues the chain.
    CallNext,
    /// Replace method that continues the chain with other arguments.
    CallNextWith(Vec<Value>),
    Throw { class: Symbol, message: String },
}

/// One recorded host interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    Lift { team: ObjectRef, role: ObjectRef },
    Invoke { method: MethodRef, args: Vec<Value> },
    Replace { method: MethodRef, cursor: usize },
    Original { method: BaseMethod, base: Value, args: Vec<Value> },
}

struct Args<'a>(&'a [Value]);

impl fmt::Display for Args<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", arg)?;
        }
        Ok(())
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::Lift { team, role } => write!(f, "lift {} -> {}", team, role),
            TraceEvent::Invoke { method, args } => {
                write!(f, "invoke {}.{}({})", method.owner, method.name, Args(args))
            }
            TraceEvent::Replace { method, cursor } => {
                write!(f, "replace {}.{} @{}", method.owner, method.name, cursor)
            }
            TraceEvent::Original { method, base, args } => write!(
                f,
                "original {}.{}({}) on {}",
                method.declaring_class,
                method.name,
                Args(args),
                base
            ),
        }
    }
}

impl Serialize for TraceEvent {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

type RoleKey = (ObjectRef, Symbol, String);

/// A [`TypeResolver`] and [`Invoker`] whose methods are scripted
/// [`Behavior`]s. Every interaction is appended to a trace.
pub struct ScriptedHost {
    lift_prefix: String,
    methods: RwLock<FxHashMap<(Symbol, Symbol), Vec<(MethodRef, Behavior)>>>,
    originals: RwLock<FxHashMap<BaseMethod, Behavior>>,
    roles: Mutex<FxHashMap<RoleKey, ObjectRef>>,
    next_role_id: AtomicU64,
    recording: AtomicBool,
    trace: Mutex<Vec<TraceEvent>>,
}

impl fmt::Debug for ScriptedHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedHost")
            .field("lift_prefix", &self.lift_prefix)
            .field("methods", &self.methods.read().len())
            .field("originals", &self.originals.read().len())
            .field("trace", &self.trace.lock().len())
            .finish_non_exhaustive()
    }
}

impl Default for ScriptedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::with_lift_prefix(DEFAULT_LIFT_PREFIX)
    }

    pub fn with_lift_prefix(prefix: impl Into<String>) -> Self {
        ScriptedHost {
            lift_prefix: prefix.into(),
            methods: RwLock::new(FxHashMap::default()),
            originals: RwLock::new(FxHashMap::default()),
            roles: Mutex::new(FxHashMap::default()),
            next_role_id: AtomicU64::new(FIRST_ROLE_ID),
            recording: AtomicBool::new(true),
            trace: Mutex::new(Vec::new()),
        }
    }

    /// Declare `role_class`'s lift method on `team_type`.
    pub fn define_lift(&self, team_type: impl Into<Symbol>, role_class: impl Into<Symbol>) -> MethodRef {
        let team_type = team_type.into();
        let role_class = role_class.into();
        let name = format!("{}{}", self.lift_prefix, role_class);
        self.define_method(
            team_type,
            name,
            "(Ljava/lang/Object;)Ljava/lang/Object;",
            Behavior::Lift { role_class },
        )
    }

    pub fn define_method(
        &self,
        owner: impl Into<Symbol>,
        name: impl Into<Symbol>,
        signature: impl Into<Symbol>,
        behavior: Behavior,
    ) -> MethodRef {
        let method = MethodRef::new(owner, name, signature);
        let mut methods = self.methods.write();
        let overloads = methods
            .entry((method.owner.clone(), method.name.clone()))
            .or_default();
        overloads.retain(|(existing, _)| existing.signature != method.signature);
        overloads.push((method.clone(), behavior));
        method
    }

    /// Body of the unwoven base method. Undefined originals return `Nothing`.
    pub fn define_original(&self, method: BaseMethod, behavior: Behavior) {
        self.originals.write().insert(method, behavior);
    }

    pub fn trace(&self) -> Vec<TraceEvent> {
        self.trace.lock().clone()
    }

    /// Return and clear the trace.
    pub fn take_trace(&self) -> Vec<TraceEvent> {
        std::mem::take(&mut *self.trace.lock())
    }

    /// The trace rendered one event per line.
    pub fn trace_lines(&self) -> Vec<String> {
        self.trace().iter().map(ToString::to_string).collect()
    }

    /// Turn trace recording on or off. On by default.
    pub fn set_recording(&self, on: bool) {
        self.recording.store(on, Ordering::Relaxed);
    }

    fn record(&self, event: TraceEvent) {
        if self.recording.load(Ordering::Relaxed) {
            self.trace.lock().push(event);
        }
    }

    fn behavior_of(&self, method: &MethodRef) -> CallinResult<Behavior> {
        self.methods
            .read()
            .get(&(method.owner.clone(), method.name.clone()))
            .and_then(|overloads| {
                overloads
                    .iter()
                    .find(|(m, _)| m.signature == method.signature)
                    .map(|(_, behavior)| behavior.clone())
            })
            .ok_or_else(|| {
                HostError::thrown("NoSuchMethodError", method.to_string()).into()
            })
    }

    fn lift(&self, role_class: &Symbol, args: &[Value]) -> CallinResult<Value> {
        let team = match args.first() {
            Some(Value::Object(team)) => team.clone(),
            Some(other) => {
                return Err(HostError::argument_mismatch("team object", other.type_name()).into())
            }
            None => return Err(HostError::null_receiver("lift").into()),
        };
        let base = args.get(1).cloned().unwrap_or(Value::Nothing);
        if base.is_nothing() {
            return Err(HostError::null_receiver(format!("lift to {}", role_class)).into());
        }

        let key = (team.clone(), role_class.clone(), base.to_string());
        let role = self
            .roles
            .lock()
            .entry(key)
            .or_insert_with(|| {
                let id = self.next_role_id.fetch_add(1, Ordering::Relaxed);
                ObjectRef::new(role_class.clone(), id)
            })
            .clone();
        self.record(TraceEvent::Lift {
            team,
            role: role.clone(),
        });
        Ok(Value::Object(role))
    }

    fn perform(&self, behavior: &Behavior, args: &[Value]) -> CallinResult<Value> {
        match behavior {
            Behavior::Return(value) => Ok(value.clone()),
            Behavior::ReturnArg(index) => args.get(*index).cloned().ok_or_else(|| {
                HostError::argument_mismatch(format!("argument {}", index), "nothing").into()
            }),
            Behavior::Throw { class, message } => {
                Err(HostError::thrown(class.clone(), message.clone()).into())
            }
            Behavior::Lift { role_class } => Err(HostError::custom(format!(
                "lifting to {} is only available to lift methods",
                role_class
            ))
            .into()),
            Behavior::CallNext | Behavior::CallNextWith(_) => Err(
                HostError::custom("call-next is only available to replace callins").into(),
            ),
        }
    }
}

impl TypeResolver for ScriptedHost {
    fn find_declared_method(&self, ty: &Symbol, name: &str) -> Option<MethodRef> {
        self.methods
            .read()
            .get(&(ty.clone(), Symbol::new(name)))
            .and_then(|overloads| overloads.first().map(|(method, _)| method.clone()))
    }

    fn lookup_method(&self, ty: &Symbol, name: &Symbol, signature: &Symbol) -> Option<MethodRef> {
        self.methods
            .read()
            .get(&(ty.clone(), name.clone()))
            .and_then(|overloads| {
                overloads
                    .iter()
                    .find(|(method, _)| &method.signature == signature)
                    .map(|(method, _)| method.clone())
            })
    }
}

impl Invoker for ScriptedHost {
    fn invoke(&self, method: &MethodRef, args: &[Value]) -> CallinResult<Value> {
        match self.behavior_of(method)? {
            Behavior::Lift { role_class } => self.lift(&role_class, args),
            behavior => {
                self.record(TraceEvent::Invoke {
                    method: method.clone(),
                    args: args.to_vec(),
                });
                self.perform(&behavior, args)
            }
        }
    }

    fn invoke_replace(
        &self,
        method: &MethodRef,
        args: &[Value],
        mut next: CallNext<'_>,
    ) -> CallinResult<Value> {
        let behavior = self.behavior_of(method)?;
        self.record(TraceEvent::Replace {
            method: method.clone(),
            cursor: next.cursor(),
        });
        match behavior {
            Behavior::CallNext => next.proceed(),
            Behavior::CallNextWith(replacement) => next.proceed_with(replacement),
            other => self.perform(&other, args),
        }
    }

    fn invoke_original(
        &self,
        base_method: &BaseMethod,
        bound_base: &Value,
        _bound_method_id: BoundMethodId,
        args: &[Value],
    ) -> CallinResult<Value> {
        self.record(TraceEvent::Original {
            method: base_method.clone(),
            base: bound_base.clone(),
            args: args.to_vec(),
        });
        let behavior = self.originals.read().get(base_method).cloned();
        match behavior {
            Some(behavior) => self.perform(&behavior, args),
            None => Ok(Value::Nothing),
        }
    }
}
