//! Error types shared by plans, procedures and the scheduler.
//!
//! Plans and procedures fail with the same type the scheduler returns, so the
//! first failure of a run reaches the caller exactly as it was produced.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Execution cancelled")]
    Cancelled,

    #[error("Execution deadline exceeded")]
    DeadlineExceeded,

    #[error("Plan failed: {0}")]
    PlanFailed(String),

    #[error("Step failed: {0}")]
    StepFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PlanError {
    /// True for failures raised by the cancellation signal rather than by work.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, PlanError::Cancelled | PlanError::DeadlineExceeded)
    }
}

impl From<config::ConfigError> for PlanError {
    fn from(err: config::ConfigError) -> Self {
        PlanError::ConfigError(err.to_string())
    }
}
