//! Ready-made plans and procedures for the common shapes: a closure as a step,
//! a fixed batch emitted once, a queue of batches, a closure driven by round number.

use crate::context::RunContext;
use crate::error::PlanError;
use crate::procedure::{Plan, Procedure, Steps};
use async_trait::async_trait;
use std::collections::VecDeque;

/// Named procedure backed by a synchronous closure.
pub struct FnProcedure<F> {
    name: String,
    run: F,
}

impl<F> FnProcedure<F>
where
    F: FnMut(&RunContext) -> Result<Steps, PlanError> + Send,
{
    pub fn new(name: impl Into<String>, run: F) -> Self {
        Self {
            name: name.into(),
            run,
        }
    }
}

#[async_trait]
impl<F> Procedure for FnProcedure<F>
where
    F: FnMut(&RunContext) -> Result<Steps, PlanError> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&mut self, ctx: &RunContext) -> Result<Steps, PlanError> {
        (self.run)(ctx)
    }
}

/// Emits one batch on the first `produce`, then nothing.
pub struct OneShotPlan {
    name: String,
    batch: Option<Steps>,
}

impl OneShotPlan {
    pub fn new(name: impl Into<String>, batch: Steps) -> Self {
        Self {
            name: name.into(),
            batch: Some(batch),
        }
    }

    /// True once the batch has been handed out.
    pub fn is_exhausted(&self) -> bool {
        self.batch.is_none()
    }
}

#[async_trait]
impl Plan for OneShotPlan {
    fn name(&self) -> &str {
        &self.name
    }

    async fn produce(&mut self, _ctx: &RunContext) -> Result<Steps, PlanError> {
        Ok(self.batch.take().unwrap_or_default())
    }
}

/// Emits queued batches in order, then nothing.
///
/// An empty batch in the queue ends the run early, same as exhaustion.
pub struct BatchPlan {
    name: String,
    batches: VecDeque<Steps>,
}

impl BatchPlan {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            batches: VecDeque::new(),
        }
    }

    pub fn with_batch(mut self, batch: Steps) -> Self {
        self.batches.push_back(batch);
        self
    }

    pub fn push(&mut self, batch: Steps) {
        self.batches.push_back(batch);
    }

    pub fn remaining(&self) -> usize {
        self.batches.len()
    }
}

#[async_trait]
impl Plan for BatchPlan {
    fn name(&self) -> &str {
        &self.name
    }

    async fn produce(&mut self, _ctx: &RunContext) -> Result<Steps, PlanError> {
        Ok(self.batches.pop_front().unwrap_or_default())
    }
}

/// Named plan backed by a closure receiving the number of earlier `produce` calls.
pub struct FnPlan<F> {
    name: String,
    round: usize,
    produce: F,
}

impl<F> FnPlan<F>
where
    F: FnMut(&RunContext, usize) -> Result<Steps, PlanError> + Send,
{
    pub fn new(name: impl Into<String>, produce: F) -> Self {
        Self {
            name: name.into(),
            round: 0,
            produce,
        }
    }

    /// How many times `produce` has been called.
    pub fn rounds(&self) -> usize {
        self.round
    }
}

#[async_trait]
impl<F> Plan for FnPlan<F>
where
    F: FnMut(&RunContext, usize) -> Result<Steps, PlanError> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn produce(&mut self, ctx: &RunContext) -> Result<Steps, PlanError> {
        let round = self.round;
        self.round += 1;
        (self.produce)(ctx, round)
    }
}
