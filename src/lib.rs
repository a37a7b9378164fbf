//! Planner: depth-first execution of plans whose steps spawn further steps.
//!
//! A [`Plan`] produces batches of [`Procedure`]s; the [`Scheduler`] drains each
//! batch pre-order, depth-first, including every follow-up step a procedure
//! returns, then asks the plan again until it produces an empty batch or
//! something fails.

pub mod config;
pub mod context;
pub mod error;
pub mod execution_id;
pub mod logging;
pub mod plans;
pub mod procedure;
pub mod scheduler;

pub use context::{Context, RunContext};
pub use error::PlanError;
pub use execution_id::{ExecutionIdGenerator, SequentialExecutionIds, UuidExecutionIds};
pub use plans::{BatchPlan, FnPlan, FnProcedure, OneShotPlan};
pub use procedure::{boxed, Plan, Procedure, Steps};
pub use scheduler::{CancellationPolicy, RunSummary, Scheduler, SchedulerConfig};
