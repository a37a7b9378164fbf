//! The two contracts the scheduler drives: procedures (units of work) and plans
//! (generators of batches of root procedures).

use crate::context::RunContext;
use crate::error::PlanError;
use async_trait::async_trait;

/// An ordered sequence of procedures: a batch from a plan, or the follow-ups of a step.
pub type Steps = Vec<Box<dyn Procedure>>;

/// Smallest unit of work in a plan.
///
/// `execute` performs the step's side effects and returns the follow-up steps
/// that must fully complete, in order, before the step's next sibling runs.
#[async_trait]
pub trait Procedure: Send {
    /// Stable identifier used in log and error context only.
    fn name(&self) -> &str;

    async fn execute(&mut self, ctx: &RunContext) -> Result<Steps, PlanError>;
}

/// Produces successive batches of root procedures.
///
/// The scheduler calls `produce` until it returns an empty batch. Any progress
/// tracking across calls belongs to the plan.
#[async_trait]
pub trait Plan: Send {
    fn name(&self) -> &str;

    async fn produce(&mut self, ctx: &RunContext) -> Result<Steps, PlanError>;
}

/// Box a concrete procedure for use in a [`Steps`] sequence.
pub fn boxed<P>(procedure: P) -> Box<dyn Procedure>
where
    P: Procedure + 'static,
{
    Box::new(procedure)
}
