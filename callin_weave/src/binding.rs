//! Decoded callin binding records.
//!
//! A [`Binding`] links one role method to one or more base methods of a
//! single base class. Bindings are immutable once decoded and are shared as
//! `Arc<Binding>` between the catalog, dispatch plans and the registry.

use std::fmt;
use std::sync::Arc;

use callin_weave_runtime::Symbol;
use serde::{Deserialize, Serialize};

/// When a callin runs relative to the base method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallinKind {
    Before,
    Replace,
    After,
}

impl CallinKind {
    /// Wire tag used by binding metadata.
    pub const BEFORE_TAG: i32 = 1;
    pub const REPLACE_TAG: i32 = 2;
    pub const AFTER_TAG: i32 = 3;

    pub fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            Self::BEFORE_TAG => Some(CallinKind::Before),
            Self::REPLACE_TAG => Some(CallinKind::Replace),
            Self::AFTER_TAG => Some(CallinKind::After),
            _ => None,
        }
    }

    pub fn tag(self) -> i32 {
        match self {
            CallinKind::Before => Self::BEFORE_TAG,
            CallinKind::Replace => Self::REPLACE_TAG,
            CallinKind::After => Self::AFTER_TAG,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CallinKind::Before => "before",
            CallinKind::Replace => "replace",
            CallinKind::After => "after",
        }
    }
}

impl fmt::Display for CallinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flag bits of a callin binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BindingFlags {
    pub handles_covariant_return: bool,
    pub requires_base_super_call: bool,
}

impl BindingFlags {
    pub const COVARIANT_BASE_RETURN: i32 = 0x08;
    pub const BASE_SUPER_CALL: i32 = 0x10;

    /// Decode from the metadata bit field. Unknown bits are ignored.
    pub fn from_bits(bits: i32) -> Self {
        BindingFlags {
            handles_covariant_return: bits & Self::COVARIANT_BASE_RETURN != 0,
            requires_base_super_call: bits & Self::BASE_SUPER_CALL != 0,
        }
    }

    pub fn bits(self) -> i32 {
        let mut bits = 0;
        if self.handles_covariant_return {
            bits |= Self::COVARIANT_BASE_RETURN;
        }
        if self.requires_base_super_call {
            bits |= Self::BASE_SUPER_CALL;
        }
        bits
    }
}

/// Identity of a base method: declaring class, name and raw signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BaseMethod {
    pub declaring_class: Symbol,
    pub name: Symbol,
    pub signature: Symbol,
}

impl BaseMethod {
    pub fn new(
        declaring_class: impl Into<Symbol>,
        name: impl Into<Symbol>,
        signature: impl Into<Symbol>,
    ) -> Self {
        BaseMethod {
            declaring_class: declaring_class.into(),
            name: name.into(),
            signature: signature.into(),
        }
    }
}

impl fmt::Display for BaseMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.declaring_class, self.name, self.signature)
    }
}

/// What a callin binding knows about one of its base methods.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BaseMethodBinding {
    pub name: Symbol,
    pub signature: Symbol,
    pub declaring_class: Symbol,
    /// Team-scoped id correlating a call-context slot with this binding.
    pub callin_id: i32,
    pub base_flags: i32,
}

impl BaseMethodBinding {
    /// Name and signature match; the declaring class is checked on the binding.
    pub fn matches(&self, method: &BaseMethod) -> bool {
        self.name == method.name && self.signature == method.signature
    }
}

/// All base method bindings of one callin binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binding {
    pub role_class: Symbol,
    pub callin_label: Symbol,
    pub role_selector: Symbol,
    pub role_signature: Symbol,
    pub base_class: Symbol,
    pub kind: CallinKind,
    pub flags: BindingFlags,
    pub base_methods: Vec<BaseMethodBinding>,
}

impl Binding {
    /// Whether this binding intercepts `method`.
    pub fn applies_to(&self, method: &BaseMethod) -> bool {
        self.base_class == method.declaring_class
            && self.base_methods.iter().any(|bmb| bmb.matches(method))
    }

    pub fn has_callin_id(&self, callin_id: i32) -> bool {
        self.base_methods.iter().any(|bmb| bmb.callin_id == callin_id)
    }

    /// Callin id this binding uses for `method`, if it binds it.
    pub fn callin_id_for(&self, method: &BaseMethod) -> Option<i32> {
        if self.base_class != method.declaring_class {
            return None;
        }
        self.base_methods
            .iter()
            .find(|bmb| bmb.matches(method))
            .map(|bmb| bmb.callin_id)
    }
}

/// Find the binding of `kind` that owns `callin_id`.
pub fn binding_for_id(
    bindings: &[Arc<Binding>],
    callin_id: i32,
    kind: CallinKind,
) -> Option<&Arc<Binding>> {
    bindings
        .iter()
        .find(|binding| binding.kind == kind && binding.has_callin_id(callin_id))
}
