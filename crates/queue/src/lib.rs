//! Durable background task queue for vaultbank.
//!
//! This crate decouples request handling from slow side effects:
//!
//! - **Envelope**: named, serialized units of work with delivery options
//! - **Distributor**: producer-side enqueue, fire-and-forget
//! - **Broker**: durable at-least-once backend (Redis, or in-memory)
//! - **Processor**: worker pool with strict queue priority, bounded
//!   concurrency, exponential-backoff retries, and a dead letter set
//! - **Jobs/Workers**: the verify-email job and its handler

pub mod broker;
pub mod distributor;
pub mod error;
pub mod jobs;
pub mod processor;
pub mod retry;
pub mod task;
pub mod workers;

pub use broker::{Broker, Delivery, MemoryBroker, RedisBroker};
pub use distributor::TaskDistributor;
pub use error::{QueueError, TaskError};
pub use jobs::*;
pub use processor::{RunningProcessor, TaskHandler, TaskProcessor};
pub use retry::RetryConfig;
pub use task::{QueueName, TaskMessage, TaskOptions};
pub use workers::*;
