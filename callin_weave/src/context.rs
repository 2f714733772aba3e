//! Per-call dispatch state.

use std::fmt;

use callin_weave_runtime::{ObjectRef, Value};

use crate::error::ConfigurationError;

/// Identifier of the bound base method, as passed through the woven call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BoundMethodId(pub i32);

impl BoundMethodId {
    /// Set on constructor bindings. Constructors carry no before or replace
    /// callins.
    pub const CONSTRUCTOR_FLAG: u32 = 0x8000_0000;

    pub fn constructor(id: i32) -> Self {
        BoundMethodId(((id as u32) | Self::CONSTRUCTOR_FLAG) as i32)
    }

    pub fn is_constructor(self) -> bool {
        (self.0 as u32) & Self::CONSTRUCTOR_FLAG != 0
    }

    /// The id without the constructor flag.
    pub fn index(self) -> i32 {
        ((self.0 as u32) & !Self::CONSTRUCTOR_FLAG) as i32
    }
}

impl fmt::Display for BoundMethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_constructor() {
            write!(f, "ctor:{}", self.index())
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// State of one woven call.
///
/// `active_teams` and `callin_ids` are index-aligned. They are laid out as
/// team blocks: a team appears once per binding it applies to the base
/// method, each slot carrying that binding's callin id.
#[derive(Debug, Clone, PartialEq)]
pub struct CallContext {
    pub bound_base: Value,
    pub active_teams: Vec<ObjectRef>,
    pub cursor: usize,
    pub callin_ids: Vec<i32>,
    pub bound_method_id: BoundMethodId,
    pub original_args: Vec<Value>,
}

impl CallContext {
    pub fn new(
        bound_base: Value,
        active_teams: Vec<ObjectRef>,
        callin_ids: Vec<i32>,
        bound_method_id: BoundMethodId,
        original_args: Vec<Value>,
    ) -> Result<Self, ConfigurationError> {
        let ctx = CallContext {
            bound_base,
            active_teams,
            cursor: 0,
            callin_ids,
            bound_method_id,
            original_args,
        };
        ctx.check_shape()?;
        Ok(ctx)
    }

    /// Context with no active teams. Dispatching it runs the original only.
    pub fn unwoven(bound_base: Value, bound_method_id: BoundMethodId, original_args: Vec<Value>) -> Self {
        CallContext {
            bound_base,
            active_teams: Vec::new(),
            cursor: 0,
            callin_ids: Vec::new(),
            bound_method_id,
            original_args,
        }
    }

    /// Build the slot layout from team blocks, highest precedence first.
    /// Each block is a team and the callin ids of its applicable bindings in
    /// catalog order; blocks without ids are dropped.
    pub fn assemble<I>(
        bound_base: Value,
        blocks: I,
        bound_method_id: BoundMethodId,
        original_args: Vec<Value>,
    ) -> Self
    where
        I: IntoIterator<Item = (ObjectRef, Vec<i32>)>,
    {
        let mut ctx = Self::unwoven(bound_base, bound_method_id, original_args);
        for (team, ids) in blocks {
            for id in ids {
                ctx.active_teams.push(team.clone());
                ctx.callin_ids.push(id);
            }
        }
        ctx
    }

    pub fn with_cursor(mut self, cursor: usize) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn len(&self) -> usize {
        self.active_teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active_teams.is_empty()
    }

    /// True once the cursor has moved past the last team.
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.active_teams.len()
    }

    pub fn team_at(&self, slot: usize) -> Result<&ObjectRef, ConfigurationError> {
        self.active_teams
            .get(slot)
            .ok_or(ConfigurationError::SlotOutOfRange {
                slot,
                length: self.active_teams.len(),
            })
    }

    pub fn callin_id_at(&self, slot: usize) -> Result<i32, ConfigurationError> {
        self.callin_ids
            .get(slot)
            .copied()
            .ok_or(ConfigurationError::SlotOutOfRange {
                slot,
                length: self.callin_ids.len(),
            })
    }

    pub fn check_shape(&self) -> Result<(), ConfigurationError> {
        if self.active_teams.len() != self.callin_ids.len() {
            return Err(ConfigurationError::MisalignedContext {
                teams: self.active_teams.len(),
                callin_ids: self.callin_ids.len(),
            });
        }
        Ok(())
    }

    /// Positional form: `(bound_base, active_teams, cursor, callin_ids,
    /// bound_method_id, original_args)`.
    pub fn abi_tuple(&self) -> Vec<Value> {
        vec![
            self.bound_base.clone(),
            Value::Array(
                self.active_teams
                    .iter()
                    .cloned()
                    .map(Value::Object)
                    .collect(),
            ),
            Value::I32(abi_index(self.cursor)),
            Value::from(self.callin_ids.clone()),
            Value::I32(self.bound_method_id.0),
            Value::Array(self.original_args.clone()),
        ]
    }
}

/// Cursor as an ABI int. Contexts never approach `i32::MAX` slots.
pub(crate) fn abi_index(cursor: usize) -> i32 {
    i32::try_from(cursor).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(id: u64) -> ObjectRef {
        ObjectRef::new("Audit", id)
    }

    #[test]
    fn test_constructor_flag() {
        let ctor = BoundMethodId::constructor(7);
        assert!(ctor.is_constructor());
        assert_eq!(ctor.index(), 7);
        assert_eq!(ctor.to_string(), "ctor:7");
        assert!(!BoundMethodId(7).is_constructor());
        assert_eq!(BoundMethodId(7).index(), 7);
    }

    #[test]
    fn test_new_rejects_misaligned_arrays() {
        let err = CallContext::new(
            Value::Nothing,
            vec![team(1), team(2)],
            vec![0],
            BoundMethodId(0),
            vec![],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::MisalignedContext {
                teams: 2,
                callin_ids: 1
            }
        );
    }

    #[test]
    fn test_assemble_repeats_team_per_slot() {
        let ctx = CallContext::assemble(
            Value::Nothing,
            vec![(team(1), vec![4, 5]), (team(2), vec![]), (team(3), vec![0])],
            BoundMethodId(0),
            vec![],
        );
        assert_eq!(ctx.active_teams, vec![team(1), team(1), team(3)]);
        assert_eq!(ctx.callin_ids, vec![4, 5, 0]);
        assert!(ctx.check_shape().is_ok());
    }

    #[test]
    fn test_slot_accessors_report_range() {
        let ctx = CallContext::assemble(
            Value::Nothing,
            vec![(team(1), vec![3])],
            BoundMethodId(0),
            vec![],
        );
        assert_eq!(ctx.callin_id_at(0), Ok(3));
        assert_eq!(
            ctx.team_at(1),
            Err(ConfigurationError::SlotOutOfRange { slot: 1, length: 1 })
        );
        assert!(!ctx.is_exhausted());
        assert!(ctx.with_cursor(1).is_exhausted());
    }

    #[test]
    fn test_abi_tuple_layout() {
        let ctx = CallContext::assemble(
            Value::I64(1),
            vec![(team(1), vec![2])],
            BoundMethodId(9),
            vec![Value::I32(5)],
        );
        assert_eq!(
            ctx.abi_tuple(),
            vec![
                Value::I64(1),
                Value::Array(vec![Value::Object(team(1))]),
                Value::I32(0),
                Value::IntArray(vec![2]),
                Value::I32(9),
                Value::Array(vec![Value::I32(5)]),
            ]
        );
    }
}
