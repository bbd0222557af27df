//! Producer-side task distribution.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use vaultbank_common::IdGenerator;

use crate::broker::Broker;
use crate::error::QueueError;
use crate::task::{TaskMessage, TaskOptions};

/// Serializes tasks and publishes them to the durable backend.
///
/// `distribute` returns as soon as the task is stored; it never waits
/// for completion. Request handlers call this inline and treat an
/// [`QueueError::Enqueue`] as a logged, non-fatal failure unless their
/// business rules say otherwise.
#[derive(Clone)]
pub struct TaskDistributor {
    broker: Arc<dyn Broker>,
    id_gen: IdGenerator,
}

impl TaskDistributor {
    /// Create a distributor on top of an explicit broker. The broker's
    /// lifecycle (connect on startup, close on shutdown) belongs to
    /// the process entry point, not to this type.
    #[must_use]
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self {
            broker,
            id_gen: IdGenerator::new(),
        }
    }

    /// Serialize `payload` and enqueue it under `type_name` with the
    /// given delivery options. Returns the stored envelope so callers
    /// can log the task id.
    ///
    /// # Errors
    /// [`QueueError::InvalidTask`] for an empty type name,
    /// [`QueueError::Serialize`] if the payload does not serialize,
    /// [`QueueError::Enqueue`] when the backend rejects the write.
    pub async fn distribute<P: Serialize>(
        &self,
        type_name: &str,
        payload: &P,
        options: TaskOptions,
    ) -> Result<TaskMessage, QueueError> {
        if type_name.is_empty() {
            return Err(QueueError::InvalidTask(
                "task type name must not be empty".to_string(),
            ));
        }

        let task = TaskMessage::new(
            self.id_gen.task_id(),
            type_name.to_string(),
            serde_json::to_vec(payload)?,
            &options,
        );

        self.broker.enqueue(task.clone()).await?;

        debug!(
            task_id = %task.id,
            task_type = %task.type_name,
            queue = %task.queue,
            max_retry = task.max_retry,
            "Enqueued task"
        );

        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;
    use crate::task::QueueName;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Ping {
        n: u32,
    }

    #[tokio::test]
    async fn distribute_builds_and_stores_the_envelope() {
        let broker = Arc::new(MemoryBroker::new());
        let distributor = TaskDistributor::new(broker.clone());

        let task = distributor
            .distribute(
                "task:ping",
                &Ping { n: 7 },
                TaskOptions::default().queue(QueueName::Critical).max_retry(3),
            )
            .await
            .unwrap();

        assert_eq!(task.type_name, "task:ping");
        assert_eq!(task.queue, QueueName::Critical);
        assert_eq!(task.max_retry, 3);
        assert_eq!(task.retried, 0);
        let decoded: Ping = serde_json::from_slice(&task.payload).unwrap();
        assert_eq!(decoded, Ping { n: 7 });

        assert_eq!(broker.ready_len(QueueName::Critical).await, 1);
    }

    #[tokio::test]
    async fn empty_type_name_rejected() {
        let distributor = TaskDistributor::new(Arc::new(MemoryBroker::new()));
        let err = distributor
            .distribute("", &Ping { n: 1 }, TaskOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidTask(_)));
    }
}
