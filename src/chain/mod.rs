//! The chain executor: drives a context through a queue of interceptors.
//!
//! Execution is a two-phase state machine. The forward phase pops
//! interceptors off the context's queue, pushes them onto its stack and runs
//! their `enter` stages; the unwind phase pops the stack in reverse and runs
//! `leave` stages, or `error` stages while an error is propagating. Any
//! stage may resolve asynchronously; the machine suspends until the stage's
//! [`Eventual`] settles and the observable stage order is unchanged by
//! suspension.
//!
//! Interceptors may reshape the remainder of the execution from inside a
//! stage: [`enqueue`] appends to the live queue (this is how the router
//! splices in per-route interceptors) and [`terminate`] ends the forward
//! phase outright. [`terminate_when`] installs a predicate evaluated after
//! each successful `enter`.

mod eventual;

pub use eventual::{Cause, Eventual};

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::context::Context;
use crate::interceptors::Interceptor;

/// The three stages of interceptor execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Enter,
    Leave,
    Error,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Enter => "enter",
            Stage::Leave => "leave",
            Stage::Error => "error",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error that occurred in an interceptor stage during chain execution.
///
/// Pins the failure to the interceptor and stage that raised it, plus the
/// execution id for log correlation.
#[derive(Debug, Clone)]
pub struct StageError {
    cause: Cause,
    execution_id: Uuid,
    interceptor: String,
    stage: Stage,
}

impl StageError {
    pub fn cause(&self) -> &Cause {
        &self.cause
    }

    pub fn into_cause(self) -> Cause {
        self.cause
    }

    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    /// Name of the interceptor whose stage failed.
    pub fn interceptor(&self) -> &str {
        &self.interceptor
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} stage of interceptor {:?} failed (execution {}): {}",
            self.stage, self.interceptor, self.execution_id, self.cause
        )
    }
}

impl std::error::Error for StageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.cause.as_error())
    }
}

/// Add interceptors to the end of a context's execution queue, creating the
/// queue if necessary. May be called from inside any stage handler.
pub fn enqueue<I>(mut context: Context, interceptors: I) -> Context
where
    I: IntoIterator,
    I::Item: Into<Arc<Interceptor>>,
{
    context
        .queue
        .get_or_insert_with(VecDeque::new)
        .extend(interceptors.into_iter().map(Into::into));
    context
}

/// Remove all remaining interceptors from a context's execution queue.
///
/// During execution this ends the forward phase once the current stage
/// completes; the interceptors already on the stack still have their `leave`
/// stages run.
pub fn terminate(mut context: Context) -> Context {
    context.queue = None;
    context
}

/// Add a terminating condition, evaluated after each successful `enter`.
pub fn terminate_when<P>(mut context: Context, predicate: P) -> Context
where
    P: Fn(&Context) -> bool + Send + Sync + 'static,
{
    context.terminators.push(Arc::new(predicate));
    context
}

/// Execute a context's queue of interceptors.
///
/// `enter` stages run in queue order; once the queue is exhausted (naturally,
/// by [`terminate`], or by a terminator predicate) the `leave` stages of the
/// entered interceptors run in reverse. A stage failure switches the unwind
/// to error mode: each remaining interceptor on the stack may handle the
/// error through its `error` stage, and an unhandled error fails the
/// returned future with its cause.
///
/// On success the resolved context has its queue, stack and execution id
/// stripped.
pub async fn execute(context: Context) -> Result<Context, Cause> {
    let context = begin(context);
    let context = enter_all(context).await;
    let context = terminate(context);
    let context = leave_all(context).await;
    finish(end(context))
}

/// [`execute`] with `interceptors` appended to the context's queue first.
pub async fn execute_with<I>(context: Context, interceptors: I) -> Result<Context, Cause>
where
    I: IntoIterator,
    I::Item: Into<Arc<Interceptor>>,
{
    execute(enqueue(context, interceptors)).await
}

fn begin(mut context: Context) -> Context {
    if context.execution_id.is_none() {
        context.execution_id = Some(Uuid::new_v4());
    }
    context
}

async fn enter_all(mut context: Context) -> Context {
    loop {
        if context.error.is_some() {
            return terminate(context);
        }
        let Some(interceptor) = context.queue.as_mut().and_then(|queue| queue.pop_front()) else {
            return context;
        };
        // The queue pop and stack push land before the handler runs, so a
        // reentrant enqueue from inside `enter` observes the updated state.
        context.stack.push(Arc::clone(&interceptor));
        context = run_stage(context, &interceptor, Stage::Enter).await;
        if context.error.is_some() {
            return terminate(context);
        }
        context = check_terminators(context);
    }
}

async fn leave_all(mut context: Context) -> Context {
    while let Some(interceptor) = context.stack.pop() {
        context = if context.error.is_some() {
            run_error(context, &interceptor).await
        } else {
            run_stage(context, &interceptor, Stage::Leave).await
        };
    }
    context
}

fn end(mut context: Context) -> Context {
    context.execution_id = None;
    context.stack.clear();
    context.queue = None;
    context
}

fn finish(mut context: Context) -> Result<Context, Cause> {
    match context.error.take() {
        Some(error) => Err(error.into_cause()),
        None => Ok(context),
    }
}

/// Apply an interceptor's handler for a stage, if it exists.
///
/// A failure, synchronous or asynchronous, is attached to the pre-stage
/// context as the active error.
async fn run_stage(context: Context, interceptor: &Arc<Interceptor>, stage: Stage) -> Context {
    let Some(stage_fn) = interceptor.stage_fn(stage) else {
        return context;
    };
    let stage_fn = Arc::clone(stage_fn);
    let snapshot = context.clone();
    match stage_fn(context).await {
        Ok(context) => context,
        Err(cause) => attach_error(snapshot, cause, interceptor.name(), stage),
    }
}

/// Offer the propagating error to an interceptor's `error` handler.
///
/// The handler receives the context with the error removed; returning a
/// context handles the error. A handler that itself fails keeps the original
/// error propagating, and the new failure is recorded under `suppressed`
/// when its type differs from the original cause.
async fn run_error(mut context: Context, interceptor: &Arc<Interceptor>) -> Context {
    let Some(error_fn) = interceptor.error_fn() else {
        return context;
    };
    let error_fn = Arc::clone(error_fn);
    let snapshot = context.clone();
    let Some(error) = context.error.take() else {
        return context;
    };
    match error_fn(context, error.clone()).await {
        Ok(context) => context,
        Err(cause) => {
            let mut context = snapshot;
            if !cause.same_type(error.cause()) {
                context.suppressed.push(cause);
            }
            context
        }
    }
}

fn attach_error(mut context: Context, cause: Cause, interceptor: &str, stage: Stage) -> Context {
    context.error = Some(StageError {
        cause,
        execution_id: context.execution_id.unwrap_or_else(Uuid::nil),
        interceptor: interceptor.to_string(),
        stage,
    });
    context
}

fn check_terminators(context: Context) -> Context {
    if context.terminators.iter().any(|predicate| predicate(&context)) {
        terminate(context)
    } else {
        context
    }
}
