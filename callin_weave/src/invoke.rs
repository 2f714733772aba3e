//! Host invocation seam and the call-next handle.

use callin_weave_runtime::Value;

use crate::binding::BaseMethod;
use crate::context::{BoundMethodId, CallContext};
use crate::error::CallinResult;
use crate::gateway::InvocationGateway;
use crate::resolver::MethodRef;

/// Executes host methods on behalf of the dispatcher.
///
/// Host exceptions are returned as [`CallinError::User`] and are propagated
/// by the engine without modification.
///
/// [`CallinError::User`]: crate::error::CallinError::User
pub trait Invoker: Send + Sync {
    /// Call a lift method or a before/after role method.
    fn invoke(&self, method: &MethodRef, args: &[Value]) -> CallinResult<Value>;

    /// Call a replace role method. The role method continues the chain
    /// through `next`; dropping `next` unused skips the remaining teams and
    /// the original method.
    fn invoke_replace(
        &self,
        method: &MethodRef,
        args: &[Value],
        next: CallNext<'_>,
    ) -> CallinResult<Value>;

    /// Call the unwoven base method.
    fn invoke_original(
        &self,
        base_method: &BaseMethod,
        bound_base: &Value,
        bound_method_id: BoundMethodId,
        args: &[Value],
    ) -> CallinResult<Value>;
}

/// Continuation handed to a replace role method.
///
/// The context's cursor already points at the next team block. Each call to
/// [`proceed`](Self::proceed) re-enters the gateway from there; once the
/// cursor passes the last team, the original method runs.
#[derive(Debug)]
pub struct CallNext<'a> {
    gateway: &'a InvocationGateway,
    base_method: &'a BaseMethod,
    ctx: &'a mut CallContext,
}

impl<'a> CallNext<'a> {
    pub(crate) fn new(
        gateway: &'a InvocationGateway,
        base_method: &'a BaseMethod,
        ctx: &'a mut CallContext,
    ) -> Self {
        CallNext {
            gateway,
            base_method,
            ctx,
        }
    }

    pub fn base_method(&self) -> &BaseMethod {
        self.base_method
    }

    /// Cursor the continuation resumes at.
    pub fn cursor(&self) -> usize {
        self.ctx.cursor
    }

    /// Whether another team remains before the original method.
    pub fn has_next_team(&self) -> bool {
        !self.ctx.is_exhausted()
    }

    pub fn original_args(&self) -> &[Value] {
        &self.ctx.original_args
    }

    /// Continue with the current arguments.
    pub fn proceed(&mut self) -> CallinResult<Value> {
        let resume = self.ctx.cursor;
        let result = self.gateway.dispatch(self.base_method, self.ctx);
        self.ctx.cursor = resume;
        result
    }

    /// Continue with `args` in place of the original arguments. The caller's
    /// arguments are reinstated afterwards, whatever the outcome.
    pub fn proceed_with(&mut self, args: Vec<Value>) -> CallinResult<Value> {
        let saved = std::mem::replace(&mut self.ctx.original_args, args);
        let result = self.proceed();
        self.ctx.original_args = saved;
        result
    }
}
