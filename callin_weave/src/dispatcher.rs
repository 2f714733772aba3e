//! The callin dispatch state machine.
//!
//! One [`CallinDispatcher`] runs the bindings of the team at the context's
//! cursor for one base method:
//!
//! ```text
//! Init -> Before -> Replace -> After -> Done
//! ```
//!
//! Before and after stages are skipped when the plan has no bindings of that
//! kind. The replace stage always runs: it invokes the highest-precedence
//! replace binding, or the original method when there is none. A replace role
//! method continues the chain through [`CallNext`], which re-enters the
//! gateway at the next team block.
//!
//! Constructor dispatches skip the before and replace stages. After this
//! block's after callins the dispatcher moves on to the next team block
//! itself, since no replace callin is there to call next.

use std::sync::Arc;

use callin_weave_runtime::{ObjectRef, Value};
use tracing::{debug, trace, warn};

use crate::binding::{BaseMethod, Binding, CallinKind};
use crate::config::MissingAfterBindingPolicy;
use crate::context::{abi_index, CallContext};
use crate::error::{CallinResult, ConfigurationError};
use crate::gateway::InvocationGateway;
use crate::invoke::CallNext;
use crate::plan::DispatchPlan;

/// Dispatch stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Init,
    Before,
    Replace,
    After,
    Done,
}

#[derive(Debug)]
pub struct CallinDispatcher<'g> {
    gateway: &'g InvocationGateway,
    base_method: &'g BaseMethod,
    plan: Arc<DispatchPlan>,
}

impl<'g> CallinDispatcher<'g> {
    pub fn new(
        gateway: &'g InvocationGateway,
        base_method: &'g BaseMethod,
        plan: Arc<DispatchPlan>,
    ) -> Self {
        CallinDispatcher {
            gateway,
            base_method,
            plan,
        }
    }

    pub fn plan(&self) -> &DispatchPlan {
        &self.plan
    }

    /// Run every stage for the team block at `ctx.cursor` and return the
    /// replace-stage result.
    ///
    /// `ctx.cursor` is back at its entry value when this returns, on success
    /// and on error.
    pub fn run(&self, ctx: &mut CallContext) -> CallinResult<Value> {
        ctx.check_shape()?;
        let entry_cursor = ctx.cursor;
        let constructor = ctx.bound_method_id.is_constructor();
        let mut result = Value::Nothing;
        let mut stage = Stage::Init;

        loop {
            trace!(
                ?stage,
                cursor = ctx.cursor,
                base_method = %self.base_method,
                "callin dispatch"
            );
            stage = match stage {
                Stage::Init if constructor => Stage::After,
                Stage::Init if self.plan.before_count() > 0 => Stage::Before,
                Stage::Init => Stage::Replace,
                Stage::Before => {
                    self.run_before(ctx)?;
                    Stage::Replace
                }
                Stage::Replace => {
                    let outcome = self.run_replace(ctx);
                    ctx.cursor = entry_cursor;
                    result = outcome?;
                    Stage::After
                }
                Stage::After => {
                    if self.plan.after_count() > 0 {
                        self.run_after(ctx, &result)?;
                    }
                    if constructor {
                        self.continue_constructor(ctx, entry_cursor)?;
                    }
                    Stage::Done
                }
                Stage::Done => return Ok(result),
            };
        }
    }

    /// Dispatch the team blocks after this one for a constructor. The
    /// cursor is back at `entry_cursor` afterwards.
    fn continue_constructor(
        &self,
        ctx: &mut CallContext,
        entry_cursor: usize,
    ) -> CallinResult<()> {
        // An empty plan still occupies one slot of a hand-built context.
        ctx.cursor = entry_cursor + self.plan.width().max(1);
        trace!(
            cursor = ctx.cursor,
            base_method = %self.base_method,
            "constructor, next team block"
        );
        let outcome = self.gateway.dispatch(self.base_method, ctx);
        ctx.cursor = entry_cursor;
        outcome.map(drop)
    }

    /// Team and binding of the `ordinal`-th binding of `kind`, addressed
    /// through the plan's slot layout.
    fn locate(
        &self,
        ctx: &CallContext,
        kind: CallinKind,
        ordinal: usize,
    ) -> Result<(ObjectRef, Arc<Binding>), ConfigurationError> {
        let offset = self
            .plan
            .slot_offset(kind, ordinal)
            .ok_or(ConfigurationError::MissingOrdinal {
                kind,
                ordinal,
                count: self.plan.count(kind),
            })?;
        let slot = ctx.cursor + offset;
        let team = ctx.team_at(slot)?;
        let callin_id = ctx.callin_id_at(slot)?;
        let binding = self
            .plan
            .binding_for_id(callin_id, kind)
            .ok_or_else(|| ConfigurationError::MissingBinding {
                team_type: team.class.clone(),
                callin_id,
                kind,
            })?;
        Ok((team.clone(), Arc::clone(binding)))
    }

    /// Lift the bound base for `team` and resolve the role method of
    /// `binding` on the resulting role.
    fn prepare_role_call(
        &self,
        ctx: &CallContext,
        team: &ObjectRef,
        binding: &Binding,
    ) -> CallinResult<(ObjectRef, crate::resolver::MethodRef)> {
        let resolver = self.gateway.resolver();
        let role = resolver.lift(self.gateway.invoker(), team, &ctx.bound_base, binding)?;
        let method = resolver.resolve_role_method(&team.class, &role.class, binding)?;
        Ok((role, method))
    }

    fn run_before(&self, ctx: &CallContext) -> CallinResult<()> {
        for ordinal in 0..self.plan.before_count() {
            let (team, binding) = self.locate(ctx, CallinKind::Before, ordinal)?;
            let (role, method) = self.prepare_role_call(ctx, &team, &binding)?;
            debug!(team = %team, method = %method, "before callin");

            let mut args = Vec::with_capacity(ctx.original_args.len() + 1);
            args.push(Value::Object(role));
            args.extend(ctx.original_args.iter().cloned());
            self.gateway.invoker().invoke(&method, &args)?;
        }
        Ok(())
    }

    fn run_replace(&self, ctx: &mut CallContext) -> CallinResult<Value> {
        let invoker = self.gateway.invoker();
        if self.plan.replace_offset().is_none() {
            trace!(base_method = %self.base_method, "no replace callin, calling original");
            return invoker.invoke_original(
                self.base_method,
                &ctx.bound_base,
                ctx.bound_method_id,
                &ctx.original_args,
            );
        }

        let (team, binding) = self.locate(ctx, CallinKind::Replace, 0)?;
        let (role, method) = self.prepare_role_call(ctx, &team, &binding)?;
        let next_cursor = ctx.cursor + self.plan.width();
        debug!(team = %team, method = %method, next_cursor, "replace callin");

        let args = replace_args(role, ctx, next_cursor);
        ctx.cursor = next_cursor;
        let next = CallNext::new(self.gateway, self.base_method, ctx);
        invoker.invoke_replace(&method, &args, next)
    }

    fn run_after(&self, ctx: &CallContext, result: &Value) -> CallinResult<()> {
        let policy = self.gateway.config().missing_after_binding;
        for ordinal in 0..self.plan.after_count() {
            let (team, binding) = match self.locate(ctx, CallinKind::After, ordinal) {
                Ok(found) => found,
                Err(err) => match policy {
                    MissingAfterBindingPolicy::Stop => {
                        warn!(
                            error = %err,
                            base_method = %self.base_method,
                            "stopping after callins"
                        );
                        break;
                    }
                    MissingAfterBindingPolicy::Fail => return Err(err.into()),
                },
            };
            let (role, method) = self.prepare_role_call(ctx, &team, &binding)?;
            debug!(team = %team, method = %method, "after callin");

            let mut args = Vec::with_capacity(ctx.original_args.len() + 2);
            args.push(Value::Object(role));
            args.extend(ctx.original_args.iter().cloned());
            args.push(result.clone());
            self.gateway.invoker().invoke(&method, &args)?;
        }
        Ok(())
    }
}

/// `(role, bound_base, active_teams, next_cursor, callin_ids,
/// bound_method_id, original_args, ...original_args)`
fn replace_args(role: ObjectRef, ctx: &CallContext, next_cursor: usize) -> Vec<Value> {
    let mut args = Vec::with_capacity(ctx.original_args.len() + 7);
    args.push(Value::Object(role));
    args.push(ctx.bound_base.clone());
    args.push(Value::Array(
        ctx.active_teams.iter().cloned().map(Value::Object).collect(),
    ));
    args.push(Value::I32(abi_index(next_cursor)));
    args.push(Value::from(ctx.callin_ids.clone()));
    args.push(Value::I32(ctx.bound_method_id.0));
    args.push(Value::Array(ctx.original_args.clone()));
    args.extend(ctx.original_args.iter().cloned());
    args
}
