//! Durable queue backends.
//!
//! The broker owns every task from enqueue until completion or
//! archival. Workers never cache ownership beyond one delivery:
//! delivery locking is the backend's lease (visibility timeout), not
//! anything in-process.

mod memory;
mod redis;

pub use memory::{ArchivedTask, MemoryBroker};
pub use redis::RedisBroker;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::QueueError;
use crate::task::{QueueName, TaskMessage};

/// One leased delivery of a task to one worker.
///
/// Exactly one worker holds a given delivery at a time; the lease
/// expires after the visibility timeout if the worker neither acks,
/// retries, nor archives it.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// The task as stored at dequeue time.
    pub task: TaskMessage,
}

/// Durable, at-least-once delivery backend.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Atomically store the task as pending (or delayed when its
    /// `process_at` lies in the future).
    async fn enqueue(&self, task: TaskMessage) -> Result<(), QueueError>;

    /// Lease the next eligible task, scanning `queues` in the given
    /// order (strict priority). Blocks without busy-waiting for up to
    /// an implementation-defined poll window, then returns `Ok(None)`
    /// so callers can observe shutdown.
    async fn dequeue(
        &self,
        queues: &[QueueName],
        visibility: Duration,
    ) -> Result<Option<Delivery>, QueueError>;

    /// Mark the delivery completed and drop the task.
    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Return the delivery to the delayed set for another attempt
    /// after `delay`, recording the error and incrementing the retry
    /// counter.
    async fn retry(
        &self,
        delivery: &Delivery,
        delay: Duration,
        error: &str,
    ) -> Result<(), QueueError>;

    /// Move the delivery to the dead letter set for manual
    /// inspection. Never auto-retried.
    async fn archive(&self, delivery: &Delivery, error: &str) -> Result<(), QueueError>;

    /// Re-queue leases whose visibility deadline has passed (worker
    /// crashed or overran its grace period). Returns how many tasks
    /// became eligible again.
    async fn reap_expired(&self, queues: &[QueueName]) -> Result<u64, QueueError>;
}
