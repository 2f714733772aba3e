//! Entry point for woven calls and owner of the team-type lifecycle.

use std::fmt;
use std::sync::Arc;

use callin_weave_runtime::{ObjectRef, Symbol, Value};
use tracing::{debug, info, trace};

use crate::binding::BaseMethod;
use crate::catalog::BindingCatalog;
use crate::config::WeaveConfig;
use crate::context::{BoundMethodId, CallContext};
use crate::dispatcher::CallinDispatcher;
use crate::error::CallinResult;
use crate::invoke::Invoker;
use crate::metadata::{decode_team, MetadataDocument, RawCallinBinding};
use crate::plan::{DispatchPlan, DispatchPlanBuilder, PlanCache, PlanKey};
use crate::registry::BindingRegistry;
use crate::resolver::{RoleResolver, TypeResolver};

/// Per-call entry point.
///
/// Shared by every thread making woven calls; all state is behind
/// concurrent containers.
pub struct InvocationGateway {
    config: WeaveConfig,
    catalog: BindingCatalog,
    plans: PlanCache,
    resolver: RoleResolver,
    invoker: Arc<dyn Invoker>,
    registry: Arc<BindingRegistry>,
}

impl fmt::Debug for InvocationGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationGateway")
            .field("config", &self.config)
            .field("catalog", &self.catalog)
            .field("plans", &self.plans.len())
            .field("resolver", &self.resolver)
            .field("registry", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl InvocationGateway {
    pub fn new(types: Arc<dyn TypeResolver>, invoker: Arc<dyn Invoker>) -> Self {
        Self::with_config(WeaveConfig::default(), types, invoker)
    }

    pub fn with_config(
        config: WeaveConfig,
        types: Arc<dyn TypeResolver>,
        invoker: Arc<dyn Invoker>,
    ) -> Self {
        Self::with_registry(config, types, invoker, Arc::new(BindingRegistry::new()))
    }

    /// Gateway sharing an externally owned registry.
    pub fn with_registry(
        config: WeaveConfig,
        types: Arc<dyn TypeResolver>,
        invoker: Arc<dyn Invoker>,
        registry: Arc<BindingRegistry>,
    ) -> Self {
        let resolver = RoleResolver::new(
            types,
            config.lift_method_prefix.clone(),
            config.resolution_cache,
        );
        InvocationGateway {
            plans: PlanCache::new(config.plan_cache),
            catalog: BindingCatalog::new(),
            resolver,
            invoker,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &WeaveConfig {
        &self.config
    }

    pub fn catalog(&self) -> &BindingCatalog {
        &self.catalog
    }

    pub fn plans(&self) -> &PlanCache {
        &self.plans
    }

    pub fn resolver(&self) -> &RoleResolver {
        &self.resolver
    }

    pub fn invoker(&self) -> &dyn Invoker {
        self.invoker.as_ref()
    }

    pub fn registry(&self) -> &Arc<BindingRegistry> {
        &self.registry
    }

    // ===== Team lifecycle =====

    /// Decode and install the bindings of `team_type`. A team type that is
    /// already loaded is redefined: its plans and cached resolutions are
    /// dropped. Returns the number of bindings installed.
    pub fn load_team_type(
        &self,
        team_type: impl Into<Symbol>,
        records: &[RawCallinBinding],
    ) -> CallinResult<usize> {
        let team_type = team_type.into();
        let bindings: Vec<_> = decode_team(&team_type, records)?
            .into_iter()
            .map(Arc::new)
            .collect();
        let count = bindings.len();

        let replaced = self.catalog.load(team_type.clone(), bindings.clone());
        if replaced.is_some() {
            self.forget_team(&team_type);
        }
        for binding in &bindings {
            let name = BindingRegistry::qualified_name(&team_type, &binding.callin_label);
            self.registry.register(name, team_type.clone(), binding);
        }

        info!(
            team_type = %team_type,
            bindings = count,
            redefined = replaced.is_some(),
            "loaded team type"
        );
        Ok(count)
    }

    /// Load every team of a metadata document, in document order. Stops at
    /// the first team that fails to decode.
    pub fn load_metadata(&self, document: &MetadataDocument) -> CallinResult<usize> {
        let mut total = 0;
        for team in &document.teams {
            total += self.load_team_type(team.team_type.as_str(), &team.bindings)?;
        }
        Ok(total)
    }

    /// Remove a team type with its plans, cached resolutions and registry
    /// entries. Returns false when it was not loaded.
    pub fn unload_team_type(&self, team_type: &Symbol) -> bool {
        let removed = self.catalog.unload(team_type).is_some();
        self.forget_team(team_type);
        if removed {
            info!(team_type = %team_type, "unloaded team type");
        }
        removed
    }

    fn forget_team(&self, team_type: &Symbol) {
        let plans = self.plans.invalidate_team(team_type);
        self.resolver.invalidate_team(team_type);
        let entries = self.registry.unregister_team(team_type);
        debug!(team_type = %team_type, plans, entries, "invalidated team type");
    }

    // ===== Call path =====

    /// Plan for `team_type` and `base_method`, from the cache or freshly
    /// built. Unknown team types get the empty plan.
    pub fn plan_for(&self, team_type: &Symbol, base_method: &BaseMethod) -> Arc<DispatchPlan> {
        let key = PlanKey::new(team_type.clone(), base_method.clone());
        self.plans.get_or_build(key, || {
            DispatchPlanBuilder::build(self.catalog.bindings_for(base_method, team_type))
        })
    }

    /// Assemble the call context for `teams` (highest precedence first).
    /// Teams whose type has no binding for `base_method` are left out.
    pub fn prepare_call(
        &self,
        base_method: &BaseMethod,
        bound_base: Value,
        teams: &[ObjectRef],
        bound_method_id: BoundMethodId,
        original_args: Vec<Value>,
    ) -> CallContext {
        let blocks = teams.iter().filter_map(|team| {
            let plan = self.plan_for(&team.class, base_method);
            let ids: Vec<i32> = plan
                .bindings()
                .iter()
                .filter_map(|binding| binding.callin_id_for(base_method))
                .collect();
            (!ids.is_empty()).then(|| (team.clone(), ids))
        });
        CallContext::assemble(bound_base, blocks, bound_method_id, original_args)
    }

    /// Dispatch the woven call described by `ctx`, starting at its cursor.
    pub fn dispatch(&self, base_method: &BaseMethod, ctx: &mut CallContext) -> CallinResult<Value> {
        ctx.check_shape()?;
        if ctx.is_exhausted() {
            // The constructor body has already run; only after callins apply.
            if ctx.bound_method_id.is_constructor() {
                trace!(base_method = %base_method, cursor = ctx.cursor, "constructor, no team left");
                return Ok(Value::Nothing);
            }
            trace!(base_method = %base_method, cursor = ctx.cursor, "no active team, calling original");
            return self.invoker.invoke_original(
                base_method,
                &ctx.bound_base,
                ctx.bound_method_id,
                &ctx.original_args,
            );
        }

        let team_type = ctx.team_at(ctx.cursor)?.class.clone();
        let plan = self.plan_for(&team_type, base_method);
        CallinDispatcher::new(self, base_method, plan).run(ctx)
    }

    /// Prepare and dispatch in one step.
    pub fn call(
        &self,
        base_method: &BaseMethod,
        bound_base: Value,
        teams: &[ObjectRef],
        bound_method_id: BoundMethodId,
        original_args: Vec<Value>,
    ) -> CallinResult<Value> {
        let mut ctx = self.prepare_call(base_method, bound_base, teams, bound_method_id, original_args);
        self.dispatch(base_method, &mut ctx)
    }
}
