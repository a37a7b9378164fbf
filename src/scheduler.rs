//! Scheduler: drives a plan's dynamically generated forest of procedures to completion.
//!
//! Each `produce` batch is drained pre-order, depth-first, before the plan is asked
//! again. The first failure ends the run and is returned unchanged.

use crate::context::{Context, RunContext};
use crate::error::PlanError;
use crate::execution_id::{ExecutionIdGenerator, UuidExecutionIds};
use crate::procedure::{Plan, Procedure, Steps};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, Instrument, Span};

/// Whether the scheduler itself polls the cancellation signal between calls.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancellationPolicy {
    /// Check the signal before every `produce` call and before every step.
    #[default]
    Enforce,
    /// Never check; plans and procedures honor the signal themselves.
    Cooperative,
}

/// Scheduler settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub cancellation: CancellationPolicy,

    /// Upper bound for a single run, combined with any caller deadline
    #[serde(default)]
    pub run_timeout_ms: Option<u64>,
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.run_timeout_ms == Some(0) {
            return Err("run_timeout_ms must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSummary {
    pub execution_id: String,
    pub plan: String,
    pub steps_executed: usize,
    pub batches: usize,
    pub elapsed_ms: u64,
}

/// Takes a plan and executes it.
///
/// Counters are reset at the start of every run. `execute` takes `&mut self`, so
/// one scheduler drives at most one run at a time; use one scheduler per
/// concurrent run.
pub struct Scheduler {
    step_counter: usize,
    batch_counter: usize,
    ids: Arc<dyn ExecutionIdGenerator>,
    parent_span: Option<Span>,
    cancellation: CancellationPolicy,
    run_timeout: Option<Duration>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            step_counter: 0,
            batch_counter: 0,
            ids: Arc::new(UuidExecutionIds),
            parent_span: None,
            cancellation: CancellationPolicy::default(),
            run_timeout: None,
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new()
            .with_cancellation_policy(config.cancellation)
            .with_run_timeout(config.run_timeout_ms.map(Duration::from_millis))
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn ExecutionIdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Nest every run span under `span` instead of the caller's current span.
    pub fn with_parent_span(mut self, span: Span) -> Self {
        self.parent_span = Some(span);
        self
    }

    pub fn with_cancellation_policy(mut self, policy: CancellationPolicy) -> Self {
        self.cancellation = policy;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.run_timeout = timeout;
        self
    }

    pub fn cancellation_policy(&self) -> CancellationPolicy {
        self.cancellation
    }

    /// Procedures invoked by the current or most recent run.
    pub fn steps_executed(&self) -> usize {
        self.step_counter
    }

    /// Non-empty batches drained by the current or most recent run.
    pub fn batches_drained(&self) -> usize {
        self.batch_counter
    }

    /// Execute `plan` until it produces an empty batch or something fails.
    pub async fn execute<P>(
        &mut self,
        ctx: &Context,
        plan: &mut P,
    ) -> Result<RunSummary, PlanError>
    where
        P: Plan + ?Sized,
    {
        let execution_id = self.ids.next_id();
        let plan_name = plan.name().to_string();
        let span = self.run_span(&execution_id, &plan_name);

        let mut context = ctx.clone();
        if let Some(timeout) = self.run_timeout {
            context = context.with_timeout(timeout);
        }
        let run_ctx = RunContext::new(context, execution_id.clone(), span.clone());

        self.run(&run_ctx, plan, plan_name)
            .instrument(span)
            .await
    }

    fn run_span(&self, execution_id: &str, plan_name: &str) -> Span {
        match &self.parent_span {
            Some(parent) => info_span!(
                parent: parent,
                "plan_execution",
                execution_id = %execution_id,
                plan = %plan_name
            ),
            None => info_span!(
                "plan_execution",
                execution_id = %execution_id,
                plan = %plan_name
            ),
        }
    }

    async fn run<P>(
        &mut self,
        ctx: &RunContext,
        plan: &mut P,
        plan_name: String,
    ) -> Result<RunSummary, PlanError>
    where
        P: Plan + ?Sized,
    {
        let start = Instant::now();
        info!(plan = %plan_name, "Started execution plan");
        self.step_counter = 0;
        self.batch_counter = 0;

        loop {
            if let Err(err) = self.poll_cancellation(ctx) {
                self.log_abort(&err, start);
                return Err(err);
            }

            let steps = match plan.produce(ctx).await {
                Ok(steps) => steps,
                Err(err) => {
                    error!(
                        error = %err,
                        elapsed_ms = elapsed_ms(start),
                        steps_executed = self.step_counter,
                        "Plan failed to produce steps."
                    );
                    return Err(err);
                }
            };
            if steps.is_empty() {
                break;
            }

            self.batch_counter += 1;
            debug!(
                batch = self.batch_counter,
                batch_size = steps.len(),
                "Draining batch"
            );
            if let Err(err) = self.drain(ctx, steps).await {
                self.log_abort(&err, start);
                return Err(err);
            }
        }

        let elapsed = elapsed_ms(start);
        info!(
            elapsed_ms = elapsed,
            steps_executed = self.step_counter,
            batches = self.batch_counter,
            "Plan executed without errors."
        );
        Ok(RunSummary {
            execution_id: ctx.execution_id().to_string(),
            plan: plan_name,
            steps_executed: self.step_counter,
            batches: self.batch_counter,
            elapsed_ms: elapsed,
        })
    }

    /// Run every procedure in `batch` and everything it spawns, pre-order depth-first.
    ///
    /// Pending siblings live on an explicit stack of iterators, one frame per
    /// level, so forest depth never grows the native call stack.
    async fn drain(&mut self, ctx: &RunContext, batch: Steps) -> Result<(), PlanError> {
        let mut pending: Vec<std::vec::IntoIter<Box<dyn Procedure>>> = vec![batch.into_iter()];

        loop {
            let next = match pending.last_mut() {
                Some(frame) => frame.next(),
                None => break,
            };
            let Some(mut step) = next else {
                pending.pop();
                continue;
            };

            self.poll_cancellation(ctx)?;
            self.step_counter += 1;
            debug!(
                step = %step.name(),
                step_number = self.step_counter,
                "Executing step"
            );

            match step.execute(ctx).await {
                Ok(children) => {
                    if !children.is_empty() {
                        pending.push(children.into_iter());
                    }
                }
                Err(err) => {
                    error!(step = %step.name(), error = %err, "Step failed.");
                    return Err(err);
                }
            }
        }

        Ok(())
    }

    fn poll_cancellation(&self, ctx: &RunContext) -> Result<(), PlanError> {
        match self.cancellation {
            CancellationPolicy::Enforce => ctx.check(),
            CancellationPolicy::Cooperative => Ok(()),
        }
    }

    fn log_abort(&self, err: &PlanError, start: Instant) {
        error!(
            error = %err,
            elapsed_ms = elapsed_ms(start),
            steps_executed = self.step_counter,
            "Plan execution aborted."
        );
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    millis_saturating(start.elapsed())
}

fn millis_saturating(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
