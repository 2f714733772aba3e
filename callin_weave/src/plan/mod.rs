//! Dispatch plans.
//!
//! A [`DispatchPlan`] is derived from the bindings of one team type that
//! apply to one base method. It partitions them by kind and records, per
//! kind, a scatter table translating "the i-th binding of this kind" into a
//! slot of the team's block in the call context.
//!
//! # Slot layout
//!
//! A team owns `width()` consecutive slots starting at the cursor, one per
//! applicable binding in catalog order. The i-th before (or after) binding
//! therefore sits at `cursor + i + scatter[i]`, where `scatter[i]` counts the
//! bindings of other kinds that precede it.
//!
//! Plans are pure functions of their input bindings, so they can be cached
//! indefinitely or rebuilt at will (see [`cache::PlanCache`]).

pub mod cache;

use std::sync::Arc;

use tracing::debug;

use crate::binding::{binding_for_id, Binding, CallinKind};

pub use cache::{PlanCache, PlanCacheStats, PlanKey};

/// Immutable, shareable dispatch plan for one (team type, base method) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPlan {
    bindings: Vec<Arc<Binding>>,
    before_count: usize,
    replace_count: usize,
    after_count: usize,
    before_scatter: Vec<usize>,
    after_scatter: Vec<usize>,
    replace_offset: Option<usize>,
}

impl DispatchPlan {
    /// Plan with no bindings: only the original method runs.
    pub fn empty() -> Self {
        DispatchPlanBuilder::build(Vec::new())
    }

    pub fn bindings(&self) -> &[Arc<Binding>] {
        &self.bindings
    }

    /// Number of call-context slots a team covered by this plan owns.
    pub fn width(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn before_count(&self) -> usize {
        self.before_count
    }

    pub fn replace_count(&self) -> usize {
        self.replace_count
    }

    pub fn after_count(&self) -> usize {
        self.after_count
    }

    pub fn count(&self, kind: CallinKind) -> usize {
        match kind {
            CallinKind::Before => self.before_count,
            CallinKind::Replace => self.replace_count,
            CallinKind::After => self.after_count,
        }
    }

    pub fn before_scatter(&self) -> &[usize] {
        &self.before_scatter
    }

    pub fn after_scatter(&self) -> &[usize] {
        &self.after_scatter
    }

    /// Scatter table of a kind. Replace bindings are addressed through
    /// [`replace_offset`](Self::replace_offset) instead and have none.
    pub fn scatter(&self, kind: CallinKind) -> &[usize] {
        match kind {
            CallinKind::Before => &self.before_scatter,
            CallinKind::Replace => &[],
            CallinKind::After => &self.after_scatter,
        }
    }

    /// Offset, relative to the cursor, of the `ordinal`-th binding of `kind`.
    pub fn slot_offset(&self, kind: CallinKind, ordinal: usize) -> Option<usize> {
        match kind {
            CallinKind::Replace => (ordinal == 0).then_some(self.replace_offset).flatten(),
            _ => self
                .scatter(kind)
                .get(ordinal)
                .map(|skipped| ordinal + skipped),
        }
    }

    /// Offset of the replace binding that runs for this team: the last one in
    /// catalog order, which has the highest precedence.
    pub fn replace_offset(&self) -> Option<usize> {
        self.replace_offset
    }

    pub fn binding_for_id(&self, callin_id: i32, kind: CallinKind) -> Option<&Arc<Binding>> {
        binding_for_id(&self.bindings, callin_id, kind)
    }
}

/// Builds [`DispatchPlan`]s from catalog-ordered bindings.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchPlanBuilder;

impl DispatchPlanBuilder {
    pub fn build(bindings: Vec<Arc<Binding>>) -> DispatchPlan {
        let mut before_count = 0;
        let mut replace_count = 0;
        let mut after_count = 0;
        let mut replace_offset = None;
        for (position, binding) in bindings.iter().enumerate() {
            match binding.kind {
                CallinKind::Before => before_count += 1,
                CallinKind::Replace => {
                    replace_count += 1;
                    replace_offset = Some(position);
                }
                CallinKind::After => after_count += 1,
            }
        }

        if replace_count > 1 {
            debug!(
                replace_count,
                "multiple replace bindings for one team; highest precedence wins"
            );
        }

        let before_scatter = scatter_table(&bindings, CallinKind::Before);
        let after_scatter = scatter_table(&bindings, CallinKind::After);
        debug_assert_eq!(before_scatter.len(), before_count);
        debug_assert_eq!(after_scatter.len(), after_count);

        DispatchPlan {
            bindings,
            before_count,
            replace_count,
            after_count,
            before_scatter,
            after_scatter,
            replace_offset,
        }
    }
}

/// Count-then-prefix-sum construction of a scatter table.
///
/// The table is over-approximated to the full binding count. Walking the
/// bindings, a match advances the running count; a mismatch bumps the slot the
/// next match will fill. The prefix sum then turns per-gap counts into
/// cumulative skips, and the tail beyond the match count is dropped.
fn scatter_table(bindings: &[Arc<Binding>], kind: CallinKind) -> Vec<usize> {
    let mut table = vec![0usize; bindings.len()];
    let mut count = 0;
    for binding in bindings {
        if binding.kind == kind {
            count += 1;
        } else {
            // count <= number of bindings seen so far < bindings.len()
            table[count] += 1;
        }
    }

    for i in 1..count {
        table[i] += table[i - 1];
    }
    table.truncate(count);
    table
}
