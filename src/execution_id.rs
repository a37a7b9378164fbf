//! Correlation ids for grouping the log lines of one scheduler run.

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Produces one id per run; practically collision-free is enough.
pub trait ExecutionIdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random v4 UUIDs. Default for the scheduler.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidExecutionIds;

impl ExecutionIdGenerator for UuidExecutionIds {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic `{prefix}-{n}` ids, n starting at 1.
#[derive(Debug)]
pub struct SequentialExecutionIds {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialExecutionIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(1),
        }
    }
}

impl ExecutionIdGenerator for SequentialExecutionIds {
    fn next_id(&self) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{seq}", self.prefix)
    }
}

impl<F> ExecutionIdGenerator for F
where
    F: Fn() -> String + Send + Sync,
{
    fn next_id(&self) -> String {
        self()
    }
}
