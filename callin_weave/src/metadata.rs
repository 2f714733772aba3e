//! Binding metadata records and their decoding.
//!
//! The metadata loader hands the engine one list of [`RawCallinBinding`]s per
//! team type, already sorted low-to-high by precedence. Raw records carry the
//! wire encoding (integer kind tag, flag bits); [`decode_team`] validates them
//! and turns them into [`Binding`]s without reordering.

use callin_weave_runtime::Symbol;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::binding::{BaseMethodBinding, Binding, BindingFlags, CallinKind};
use crate::error::ConfigurationError;

/// Wire form of one base method binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBaseMethodBinding {
    pub name: String,
    pub signature: String,
    pub declaring_class: String,
    pub callin_id: i32,
    #[serde(default)]
    pub base_flags: i32,
}

/// Wire form of one callin binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCallinBinding {
    pub role_class: String,
    pub callin_label: String,
    pub role_selector: String,
    pub role_signature: String,
    pub base_class: String,
    /// 1 = before, 2 = replace, 3 = after
    pub kind: i32,
    /// 0x08 = handles covariant return, 0x10 = requires base super call
    #[serde(default)]
    pub flags: i32,
    #[serde(default)]
    pub base_methods: Vec<RawBaseMethodBinding>,
}

/// All callin bindings of one team type, in precedence order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMetadata {
    pub team_type: String,
    #[serde(default)]
    pub bindings: Vec<RawCallinBinding>,
}

/// A document of team metadata, as written by a metadata loader dump.
///
/// TOML documents use `[[team]]` tables; JSON documents use a `"team"` array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDocument {
    #[serde(default, rename = "team")]
    pub teams: Vec<TeamMetadata>,
}

impl MetadataDocument {
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigurationError> {
        toml::from_str(src).map_err(|e| ConfigurationError::MalformedMetadata {
            format: "toml",
            message: e.to_string(),
        })
    }

    pub fn from_json_str(src: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(src).map_err(|e| ConfigurationError::MalformedMetadata {
            format: "json",
            message: e.to_string(),
        })
    }
}

/// Decode a single record. Does not check callin-id uniqueness across records.
pub fn decode_binding(
    team_type: &Symbol,
    raw: &RawCallinBinding,
) -> Result<Binding, ConfigurationError> {
    let label = Symbol::new(&raw.callin_label);
    let kind = CallinKind::from_tag(raw.kind).ok_or_else(|| ConfigurationError::InvalidKind {
        team_type: team_type.clone(),
        label: label.clone(),
        tag: raw.kind,
    })?;

    if raw.base_methods.is_empty() {
        return Err(ConfigurationError::EmptyBinding {
            team_type: team_type.clone(),
            label,
        });
    }

    let mut base_methods = Vec::with_capacity(raw.base_methods.len());
    for bm in &raw.base_methods {
        if bm.callin_id < 0 {
            return Err(ConfigurationError::NegativeCallinId {
                team_type: team_type.clone(),
                label,
                callin_id: bm.callin_id,
            });
        }
        base_methods.push(BaseMethodBinding {
            name: Symbol::new(&bm.name),
            signature: Symbol::new(&bm.signature),
            declaring_class: Symbol::new(&bm.declaring_class),
            callin_id: bm.callin_id,
            base_flags: bm.base_flags,
        });
    }

    Ok(Binding {
        role_class: Symbol::new(&raw.role_class),
        callin_label: label,
        role_selector: Symbol::new(&raw.role_selector),
        role_signature: Symbol::new(&raw.role_signature),
        base_class: Symbol::new(&raw.base_class),
        kind,
        flags: BindingFlags::from_bits(raw.flags),
        base_methods,
    })
}

/// Decode every record of a team type, preserving order.
///
/// A callin id may repeat inside one binding (one id per callin, shared by
/// its base methods) but must not be shared by two bindings.
pub fn decode_team(
    team_type: &Symbol,
    raws: &[RawCallinBinding],
) -> Result<Vec<Binding>, ConfigurationError> {
    let mut owners: FxHashMap<i32, usize> = FxHashMap::default();
    let mut bindings = Vec::with_capacity(raws.len());

    for (index, raw) in raws.iter().enumerate() {
        let binding = decode_binding(team_type, raw)?;
        for bmb in &binding.base_methods {
            match owners.get(&bmb.callin_id) {
                Some(&owner) if owner != index => {
                    let first: &Binding = &bindings[owner];
                    return Err(ConfigurationError::DuplicateCallinId {
                        team_type: team_type.clone(),
                        callin_id: bmb.callin_id,
                        first: first.callin_label.clone(),
                        second: binding.callin_label.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    owners.insert(bmb.callin_id, index);
                }
            }
        }
        bindings.push(binding);
    }

    Ok(bindings)
}
