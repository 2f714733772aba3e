//! Per-team-type binding catalog.
//!
//! Holds the decoded bindings of every loaded team type in the order the
//! metadata loader produced them (low-to-high precedence). The catalog never
//! re-sorts; every query returns bindings in catalog order.

use std::sync::Arc;

use callin_weave_runtime::Symbol;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::binding::{BaseMethod, Binding};

/// The bindings of one team type.
#[derive(Debug)]
pub struct TeamBindings {
    team_type: Symbol,
    bindings: Vec<Arc<Binding>>,
}

impl TeamBindings {
    pub fn new(team_type: Symbol, bindings: Vec<Arc<Binding>>) -> Self {
        TeamBindings {
            team_type,
            bindings,
        }
    }

    pub fn team_type(&self) -> &Symbol {
        &self.team_type
    }

    pub fn bindings(&self) -> &[Arc<Binding>] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bindings that intercept `method`, in catalog order.
    ///
    /// Linear in the team's binding count; callers memoize through the plan
    /// cache.
    pub fn bindings_for(&self, method: &BaseMethod) -> Vec<Arc<Binding>> {
        self.bindings
            .iter()
            .filter(|binding| binding.applies_to(method))
            .cloned()
            .collect()
    }
}

/// Decoded bindings of all loaded team types.
#[derive(Debug, Default)]
pub struct BindingCatalog {
    teams: RwLock<FxHashMap<Symbol, Arc<TeamBindings>>>,
}

impl BindingCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the bindings of `team_type`, replacing any earlier definition.
    /// Returns the replaced definition.
    pub fn load(
        &self,
        team_type: Symbol,
        bindings: Vec<Arc<Binding>>,
    ) -> Option<Arc<TeamBindings>> {
        let entry = Arc::new(TeamBindings::new(team_type.clone(), bindings));
        self.teams.write().insert(team_type, entry)
    }

    pub fn unload(&self, team_type: &Symbol) -> Option<Arc<TeamBindings>> {
        self.teams.write().remove(team_type)
    }

    pub fn get(&self, team_type: &Symbol) -> Option<Arc<TeamBindings>> {
        self.teams.read().get(team_type).cloned()
    }

    pub fn contains(&self, team_type: &Symbol) -> bool {
        self.teams.read().contains_key(team_type)
    }

    /// Loaded team types, sorted by name.
    pub fn team_types(&self) -> Vec<Symbol> {
        let mut types: Vec<Symbol> = self.teams.read().keys().cloned().collect();
        types.sort();
        types
    }

    /// Bindings of `team_type` that apply to `method`. Empty when the team
    /// type is not loaded.
    pub fn bindings_for(&self, method: &BaseMethod, team_type: &Symbol) -> Vec<Arc<Binding>> {
        match self.get(team_type) {
            Some(team) => team.bindings_for(method),
            None => Vec::new(),
        }
    }
}
