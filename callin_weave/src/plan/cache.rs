//! Concurrent dispatch-plan cache.
//!
//! Plans are keyed by (team type, base method). Lookups never block on plan
//! construction: a thread that misses builds its own plan and publishes it
//! through the map's entry API. When two threads race on the same key, the
//! first insert wins and the loser drops its copy and uses the winner's.
//!
//! Entries stay valid until their team type is unloaded or redefined, at
//! which point [`PlanCache::invalidate_team`] drops them. Every invalidation
//! advances an epoch; a plan whose construction straddled an epoch change
//! may have read the old bindings, so it is returned to its caller but not
//! left in the cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use callin_weave_runtime::Symbol;
use dashmap::DashMap;
use tracing::trace;

use super::DispatchPlan;
use crate::binding::BaseMethod;

/// Cache key: one plan per team type and base method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlanKey {
    pub team_type: Symbol,
    pub base_method: BaseMethod,
}

impl PlanKey {
    pub fn new(team_type: Symbol, base_method: BaseMethod) -> Self {
        PlanKey {
            team_type,
            base_method,
        }
    }
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanCacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Misses whose freshly built plan lost the publish race.
    pub discarded: u64,
}

#[derive(Debug)]
pub struct PlanCache {
    plans: DashMap<PlanKey, Arc<DispatchPlan>>,
    enabled: bool,
    epoch: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    discarded: AtomicU64,
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PlanCache {
    /// A disabled cache rebuilds the plan on every lookup.
    pub fn new(enabled: bool) -> Self {
        PlanCache {
            plans: DashMap::new(),
            enabled,
            epoch: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn get(&self, key: &PlanKey) -> Option<Arc<DispatchPlan>> {
        self.plans.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Cached plan for `key`, building it with `build` on a miss.
    pub fn get_or_build<F>(&self, key: PlanKey, build: F) -> Arc<DispatchPlan>
    where
        F: FnOnce() -> DispatchPlan,
    {
        if !self.enabled {
            return Arc::new(build());
        }

        if let Some(plan) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return plan;
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let epoch = self.epoch.load(Ordering::SeqCst);
        let built = Arc::new(build());
        let published = self
            .plans
            .entry(key.clone())
            .or_insert_with(|| Arc::clone(&built));
        let winner = Arc::clone(published.value());
        drop(published);

        if !Arc::ptr_eq(&winner, &built) {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            trace!("discarding plan that lost the publish race");
        }
        if self.epoch.load(Ordering::SeqCst) != epoch {
            self.plans
                .remove_if(&key, |_, cached| Arc::ptr_eq(cached, &winner));
            trace!(team_type = %key.team_type, "plan built across an invalidation, not cached");
        }
        winner
    }

    /// Drop every plan built for `team_type`. Returns how many were removed.
    pub fn invalidate_team(&self, team_type: &Symbol) -> usize {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let before = self.plans.len();
        self.plans.retain(|key, _| &key.team_type != team_type);
        before.saturating_sub(self.plans.len())
    }

    pub fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.plans.clear();
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn stats(&self) -> PlanCacheStats {
        PlanCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}
