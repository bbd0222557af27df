//! Single-process in-memory broker.
//!
//! Satisfies the same contract as the Redis broker (delay, strict
//! priority, visibility timeout, dead letter set) without any external
//! service. Used by the integration tests and small deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::debug;

use super::{Broker, Delivery};
use crate::error::QueueError;
use crate::task::{QueueName, TaskMessage};

/// A dead-lettered task kept for manual inspection.
#[derive(Debug, Clone)]
pub struct ArchivedTask {
    /// The task as it looked on its final attempt.
    pub task: TaskMessage,
    /// The error that exhausted it.
    pub error: String,
    /// When it was archived.
    pub archived_at: DateTime<Utc>,
}

struct Lease {
    task: TaskMessage,
    deadline: DateTime<Utc>,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<TaskMessage>,
    delayed: Vec<TaskMessage>,
    active: HashMap<String, Lease>,
    archived: Vec<ArchivedTask>,
}

#[derive(Default)]
struct State {
    queues: HashMap<QueueName, QueueState>,
}

impl State {
    fn queue_mut(&mut self, queue: QueueName) -> &mut QueueState {
        self.queues.entry(queue).or_default()
    }

    /// Move due delayed tasks into the ready queue, oldest first.
    fn promote_due(&mut self, queue: QueueName, now: DateTime<Utc>) {
        let state = self.queue_mut(queue);
        if state.delayed.is_empty() {
            return;
        }
        state.delayed.sort_by_key(|t| t.process_at);
        while state
            .delayed
            .first()
            .is_some_and(|t| t.is_eligible_at(now))
        {
            let task = state.delayed.remove(0);
            state.ready.push_back(task);
        }
    }
}

/// In-memory [`Broker`] implementation.
pub struct MemoryBroker {
    state: Mutex<State>,
    notify: Notify,
    poll_window: Duration,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    /// Create a broker with the default 500ms dequeue poll window.
    #[must_use]
    pub fn new() -> Self {
        Self::with_poll_window(Duration::from_millis(500))
    }

    /// Create a broker with a custom dequeue poll window.
    #[must_use]
    pub fn with_poll_window(poll_window: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            notify: Notify::new(),
            poll_window,
        }
    }

    /// Snapshot of the dead letter set for a queue.
    pub async fn archived(&self, queue: QueueName) -> Vec<ArchivedTask> {
        let mut state = self.state.lock().await;
        state.queue_mut(queue).archived.clone()
    }

    /// Number of tasks currently eligible in a queue.
    pub async fn ready_len(&self, queue: QueueName) -> usize {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        state.promote_due(queue, now);
        state.queue_mut(queue).ready.len()
    }

    /// Number of tasks currently leased from a queue.
    pub async fn active_len(&self, queue: QueueName) -> usize {
        let mut state = self.state.lock().await;
        state.queue_mut(queue).active.len()
    }

    /// Number of tasks waiting on their `process_at` in a queue.
    pub async fn delayed_len(&self, queue: QueueName) -> usize {
        let mut state = self.state.lock().await;
        state.queue_mut(queue).delayed.len()
    }

    fn try_lease(
        state: &mut State,
        queues: &[QueueName],
        visibility: Duration,
        now: DateTime<Utc>,
    ) -> Option<Delivery> {
        for &queue in queues {
            state.promote_due(queue, now);
            let queue_state = state.queue_mut(queue);
            if let Some(task) = queue_state.ready.pop_front() {
                let deadline = now
                    + chrono::Duration::from_std(visibility)
                        .unwrap_or_else(|_| chrono::Duration::seconds(30));
                queue_state.active.insert(
                    task.id.clone(),
                    Lease {
                        task: task.clone(),
                        deadline,
                    },
                );
                return Some(Delivery { task });
            }
        }
        None
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn enqueue(&self, task: TaskMessage) -> Result<(), QueueError> {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        let queue_state = state.queue_mut(task.queue);
        if task.is_eligible_at(now) {
            queue_state.ready.push_back(task);
        } else {
            queue_state.delayed.push(task);
        }
        drop(state);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn dequeue(
        &self,
        queues: &[QueueName],
        visibility: Duration,
    ) -> Result<Option<Delivery>, QueueError> {
        let poll_deadline = Instant::now() + self.poll_window;

        loop {
            {
                let mut state = self.state.lock().await;
                if let Some(delivery) =
                    Self::try_lease(&mut state, queues, visibility, Utc::now())
                {
                    return Ok(Some(delivery));
                }
            }

            if Instant::now() >= poll_deadline {
                return Ok(None);
            }

            // Wake on enqueue, or tick so delayed tasks get promoted.
            tokio::select! {
                () = self.notify.notified() => {}
                () = tokio::time::sleep(Duration::from_millis(10)) => {}
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        if state
            .queue_mut(delivery.task.queue)
            .active
            .remove(&delivery.task.id)
            .is_none()
        {
            // Lease already reaped; the task will run again (at-least-once).
            debug!(task_id = %delivery.task.id, "ack for expired lease");
        }
        Ok(())
    }

    async fn retry(
        &self,
        delivery: &Delivery,
        delay: Duration,
        error: &str,
    ) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let queue_state = state.queue_mut(delivery.task.queue);
        if queue_state.active.remove(&delivery.task.id).is_none() {
            debug!(task_id = %delivery.task.id, "retry for expired lease");
            return Ok(());
        }

        let mut task = delivery.task.clone();
        task.retried += 1;
        task.last_error = Some(error.to_string());
        task.process_at = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        queue_state.delayed.push(task);
        drop(state);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn archive(&self, delivery: &Delivery, error: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let queue_state = state.queue_mut(delivery.task.queue);
        if queue_state.active.remove(&delivery.task.id).is_none() {
            debug!(task_id = %delivery.task.id, "archive for expired lease");
        }
        queue_state.archived.push(ArchivedTask {
            task: delivery.task.clone(),
            error: error.to_string(),
            archived_at: Utc::now(),
        });
        Ok(())
    }

    async fn reap_expired(&self, queues: &[QueueName]) -> Result<u64, QueueError> {
        let now = Utc::now();
        let mut reaped = 0;
        let mut state = self.state.lock().await;
        for &queue in queues {
            let queue_state = state.queue_mut(queue);
            let expired: Vec<String> = queue_state
                .active
                .iter()
                .filter(|(_, lease)| lease.deadline <= now)
                .map(|(id, _)| id.clone())
                .collect();
            for id in expired {
                if let Some(lease) = queue_state.active.remove(&id) {
                    queue_state.ready.push_front(lease.task);
                    reaped += 1;
                }
            }
        }
        drop(state);
        if reaped > 0 {
            self.notify.notify_waiters();
        }
        Ok(reaped)
    }
}
