//! Cancellation and deadline signal threaded through every plan and procedure call.
//!
//! `Context` is what a caller hands to the scheduler. `RunContext` is the per-run
//! view the scheduler hands to plans and procedures: the caller's signal plus the
//! run's correlation id and logging span.

use crate::error::PlanError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Span;

/// Caller-supplied cancellation token and optional deadline.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Limit the context to `timeout` from now.
    ///
    /// A timeout too large to represent as an instant leaves the deadline unchanged.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Limit the context to `deadline`. An earlier existing deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Replace the cancellation token, typically with a child of a caller-owned one.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel the context and every clone of it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fail if the context is cancelled or its deadline has passed.
    ///
    /// Explicit cancellation is reported before an expired deadline.
    pub fn check(&self) -> Result<(), PlanError> {
        if self.token.is_cancelled() {
            return Err(PlanError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(PlanError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Resolve once the context is cancelled or its deadline passes, yielding the reason.
    pub async fn cancelled(&self) -> PlanError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => PlanError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => PlanError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                PlanError::Cancelled
            }
        }
    }

    /// Drive `fut` to completion unless the context is cancelled first.
    pub async fn run_until_cancelled<F>(&self, fut: F) -> Result<F::Output, PlanError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            reason = self.cancelled() => Err(reason),
            output = fut => Ok(output),
        }
    }
}

/// Per-run context passed to `Plan::produce` and `Procedure::execute`.
///
/// Every plan and procedure future runs inside [`RunContext::span`], so plain
/// `tracing` events emitted there already carry the run's `execution_id`. The
/// span is exposed for work that hands off to other tasks.
#[derive(Debug, Clone)]
pub struct RunContext {
    context: Context,
    execution_id: String,
    span: Span,
}

impl RunContext {
    pub fn new(context: Context, execution_id: impl Into<String>, span: Span) -> Self {
        Self {
            context,
            execution_id: execution_id.into(),
            span,
        }
    }

    /// A detached run context for invoking a plan or procedure outside a scheduler.
    pub fn detached(context: Context) -> Self {
        Self::new(context, "detached", Span::none())
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.context.deadline()
    }

    pub fn is_cancelled(&self) -> bool {
        self.context.is_cancelled()
    }

    pub fn check(&self) -> Result<(), PlanError> {
        self.context.check()
    }

    pub async fn cancelled(&self) -> PlanError {
        self.context.cancelled().await
    }

    pub async fn run_until_cancelled<F>(&self, fut: F) -> Result<F::Output, PlanError>
    where
        F: Future,
    {
        self.context.run_until_cancelled(fut).await
    }
}
