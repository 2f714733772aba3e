//! Dynamic Value type for the dispatch boundary
//!
//! Arguments, receivers and results travel between the weaving engine and
//! the host as `Value`s. Host objects are never owned by the engine; it only
//! sees `ObjectRef` handles carrying the object's class and identity.

use std::fmt;

use crate::symbol::Symbol;

/// Opaque handle to a host object.
///
/// The class is what the engine resolves methods against (team type, role
/// type, base class); the id is the host's object identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub class: Symbol,
    pub id: u64,
}

impl ObjectRef {
    pub fn new(class: impl Into<Symbol>, id: u64) -> Self {
        ObjectRef {
            class: class.into(),
            id,
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class, self.id)
    }
}

/// Dynamic value crossing the dispatch boundary
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    // ========== Primitive Types ==========
    /// 64-bit signed integer
    I64(i64),
    /// 32-bit signed integer
    I32(i32),
    /// 64-bit floating point
    F64(f64),
    /// 32-bit floating point
    F32(f32),
    /// Boolean
    Bool(bool),
    /// Character
    Char(char),
    /// Absent result (void methods, null references)
    Nothing,

    // ========== Heap-Allocated Types ==========
    /// String
    Str(String),
    /// Host object handle
    Object(ObjectRef),
    /// Array (dynamically typed elements)
    Array(Vec<Value>),
    /// Packed int array (callin id arrays of the call-context ABI)
    IntArray(Vec<i32>),
}

impl Value {
    /// Get the host type name of this value
    pub fn type_name(&self) -> &str {
        match self {
            Value::I64(_) => "long",
            Value::I32(_) => "int",
            Value::F64(_) => "double",
            Value::F32(_) => "float",
            Value::Bool(_) => "boolean",
            Value::Char(_) => "char",
            Value::Nothing => "void",
            Value::Str(_) => "String",
            Value::Object(obj) => obj.class.as_str(),
            Value::Array(_) => "Object[]",
            Value::IntArray(_) => "int[]",
        }
    }

    /// Check if this value is nothing
    pub fn is_nothing(&self) -> bool {
        matches!(self, Value::Nothing)
    }
}

// ========== From implementations ==========

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Value::Object(v)
    }
}

impl From<Vec<i32>> for Value {
    fn from(v: Vec<i32>) -> Self {
        Value::IntArray(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

// ========== Display implementation ==========

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I64(v) => write!(f, "{}L", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::F64(v) => {
                if v.fract() == 0.0 && v.abs() < 1e15 {
                    write!(f, "{}.0", v)
                } else {
                    write!(f, "{}", v)
                }
            }
            Value::F32(v) => write!(f, "{}f", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "'{}'", v),
            Value::Nothing => write!(f, "null"),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Object(obj) => write!(f, "{}", obj),
            Value::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::IntArray(arr) => {
                write!(f, "int[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}
