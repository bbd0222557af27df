//! Queue and task errors.

use thiserror::Error;
use vaultbank_common::AppError;

/// Errors from the queue layer itself (producer side and broker).
#[derive(Debug, Error)]
pub enum QueueError {
    /// The task could not be enqueued (backend unreachable or rejected
    /// the write). Producers decide whether this is fatal to the
    /// triggering operation.
    #[error("failed to enqueue task: {0}")]
    Enqueue(String),

    /// The broker backend failed mid-operation.
    #[error("queue backend error: {0}")]
    Backend(String),

    /// A task envelope or payload failed to (de)serialize.
    #[error("task serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The task envelope is invalid (e.g. empty type name).
    #[error("invalid task: {0}")]
    InvalidTask(String),

    /// Processor configuration is unusable (e.g. no registered
    /// handlers, duplicate registration).
    #[error("processor registry error: {0}")]
    Registry(String),
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        Self::Queue(err.to_string())
    }
}

impl From<fred::error::Error> for QueueError {
    fn from(err: fred::error::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Error returned by a task handler for one delivery.
///
/// Handlers classify failures: retryable errors re-enter the queue
/// with backoff until the task's retry budget is exhausted; terminal
/// errors archive the delivery immediately (e.g. a permanently invalid
/// recipient address).
#[derive(Debug, Error)]
pub enum TaskError {
    /// Transient failure; the delivery should be retried.
    #[error("retryable task failure: {0}")]
    Retryable(String),

    /// Permanent failure; retrying cannot succeed.
    #[error("terminal task failure: {0}")]
    Terminal(String),
}

impl TaskError {
    /// Build a retryable error from anything displayable.
    pub fn retryable(err: impl std::fmt::Display) -> Self {
        Self::Retryable(err.to_string())
    }

    /// Build a terminal error from anything displayable.
    pub fn terminal(err: impl std::fmt::Display) -> Self {
        Self::Terminal(err.to_string())
    }

    /// Whether this delivery may be retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(TaskError::retryable("smtp timeout").is_retryable());
        assert!(!TaskError::terminal("bad address").is_retryable());
    }

    #[test]
    fn queue_error_maps_to_app_error() {
        let err = AppError::from(QueueError::Enqueue("redis down".to_string()));
        assert!(matches!(err, AppError::Queue(_)));
    }
}
