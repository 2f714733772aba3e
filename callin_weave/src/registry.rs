//! Directory of callin labels to bindings.
//!
//! Entries are keyed by the team-qualified callin label (`Team.label`) and
//! hold only a weak reference: the catalog owns the bindings, and an entry
//! whose team type has been unloaded reads as absent even before it is
//! purged.

use std::sync::{Arc, Weak};

use callin_weave_runtime::Symbol;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::binding::Binding;

#[derive(Debug)]
struct Entry {
    owner: Symbol,
    binding: Weak<Binding>,
}

#[derive(Debug, Default)]
pub struct BindingRegistry {
    entries: RwLock<FxHashMap<Symbol, Entry>>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry key of a binding of `team_type`.
    pub fn qualified_name(team_type: &Symbol, label: &Symbol) -> Symbol {
        Symbol::new(format!("{}.{}", team_type, label))
    }

    /// Register `binding` under `name`, owned by `owner`. Replaces any entry
    /// of the same name.
    pub fn register(&self, name: Symbol, owner: Symbol, binding: &Arc<Binding>) {
        trace!(name = %name, owner = %owner, "registering binding");
        self.entries.write().insert(
            name,
            Entry {
                owner,
                binding: Arc::downgrade(binding),
            },
        );
    }

    /// Binding registered under `name`, if it is still alive.
    pub fn get(&self, name: &str) -> Option<Arc<Binding>> {
        self.entries
            .read()
            .get(name)
            .and_then(|entry| entry.binding.upgrade())
    }

    pub fn owner_of(&self, name: &str) -> Option<Symbol> {
        self.entries.read().get(name).map(|entry| entry.owner.clone())
    }

    /// Remove every entry owned by `team_type`. Returns how many were removed.
    pub fn unregister_team(&self, team_type: &Symbol) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| &entry.owner != team_type);
        before - entries.len()
    }

    /// Drop entries whose binding is gone.
    pub fn purge(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.binding.strong_count() > 0);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
