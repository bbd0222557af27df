//! Redis-backed durable broker.
//!
//! Key layout (all under the configured prefix):
//!
//! ```text
//! {prefix}:q:{queue}:ready      list of task IDs, FIFO
//! {prefix}:q:{queue}:delayed    zset of task IDs scored by process_at (ms)
//! {prefix}:q:{queue}:active     zset of task IDs scored by lease deadline (ms)
//! {prefix}:q:{queue}:archived   zset of task IDs scored by archive time (ms)
//! {prefix}:task:{id}            JSON task envelope
//! ```
//!
//! Transitions that move an id between these structures run as Lua
//! scripts, so each move is a single atomic server-side step. A worker
//! crash or a dropped client future can interrupt a transition only
//! before it runs or after it completes, never halfway: an id is
//! always in exactly one structure, where the reaper can find it.

use async_trait::async_trait;
use chrono::Utc;
use fred::clients::Client;
use fred::interfaces::{KeysInterface, ListInterface, LuaInterface, SortedSetsInterface};
use fred::types::Expiration;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{Broker, Delivery};
use crate::error::QueueError;
use crate::task::{QueueName, TaskMessage};

/// Archived tasks are kept this long for manual inspection.
const ARCHIVE_RETENTION_SECS: i64 = 90 * 24 * 3600;

/// How many delayed tasks to promote per dequeue pass.
const PROMOTE_BATCH: i64 = 100;

/// Pop the next ready id and record its lease deadline, atomically.
///
/// KEYS[1] = ready list, KEYS[2] = active zset, ARGV[1] = deadline (ms).
const LEASE_SCRIPT: &str = r"
local id = redis.call('LPOP', KEYS[1])
if id then
  redis.call('ZADD', KEYS[2], ARGV[1], id)
end
return id";

/// Move every member scored at or below ARGV[1] from a zset onto a
/// list, up to ARGV[2] members. Returns the moved ids.
///
/// KEYS[1] = source zset, KEYS[2] = destination list. Shared by
/// delayed-task promotion and expired-lease reaping.
const MOVE_DUE_SCRIPT: &str = r"
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, ARGV[2])
for _, id in ipairs(due) do
  redis.call('ZREM', KEYS[1], id)
  redis.call('RPUSH', KEYS[2], id)
end
return due";

/// Redis [`Broker`] built on fred.
#[derive(Clone)]
pub struct RedisBroker {
    client: Client,
    prefix: String,
    poll_window: Duration,
    poll_interval: Duration,
}

impl RedisBroker {
    /// Wrap an already-connected fred client.
    #[must_use]
    pub fn new(client: Client, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            poll_window: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
        }
    }

    /// Override the dequeue poll window (how long one `dequeue` call
    /// waits before returning `None`).
    #[must_use]
    pub const fn with_poll_window(mut self, poll_window: Duration) -> Self {
        self.poll_window = poll_window;
        self
    }

    /// Override the sleep between polls of an empty queue.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn ready_key(&self, queue: QueueName) -> String {
        format!("{}:q:{}:ready", self.prefix, queue)
    }

    fn delayed_key(&self, queue: QueueName) -> String {
        format!("{}:q:{}:delayed", self.prefix, queue)
    }

    fn active_key(&self, queue: QueueName) -> String {
        format!("{}:q:{}:active", self.prefix, queue)
    }

    fn archived_key(&self, queue: QueueName) -> String {
        format!("{}:q:{}:archived", self.prefix, queue)
    }

    fn task_key(&self, id: &str) -> String {
        format!("{}:task:{}", self.prefix, id)
    }

    async fn store_task(
        &self,
        task: &TaskMessage,
        expire: Option<Expiration>,
    ) -> Result<(), QueueError> {
        let json = serde_json::to_string(task)?;
        self.client
            .set::<(), _, _>(self.task_key(&task.id), json, expire, None, false)
            .await?;
        Ok(())
    }

    async fn load_task(&self, id: &str) -> Result<Option<TaskMessage>, QueueError> {
        let json: Option<String> = self.client.get(self.task_key(id)).await?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Run [`MOVE_DUE_SCRIPT`] against `now`, returning the moved ids.
    async fn move_due(&self, from: String, to: String) -> Result<Vec<String>, QueueError> {
        let now_ms = Utc::now().timestamp_millis();
        let moved: Vec<String> = self
            .client
            .eval(MOVE_DUE_SCRIPT, vec![from, to], vec![now_ms, PROMOTE_BATCH])
            .await?;
        Ok(moved)
    }

    /// Move due delayed tasks into the ready list.
    async fn promote_due(&self, queue: QueueName) -> Result<(), QueueError> {
        self.move_due(self.delayed_key(queue), self.ready_key(queue))
            .await?;
        Ok(())
    }

    async fn try_lease(
        &self,
        queues: &[QueueName],
        visibility: Duration,
    ) -> Result<Option<Delivery>, QueueError> {
        for &queue in queues {
            self.promote_due(queue).await?;

            let deadline_ms =
                (Utc::now() + chrono::Duration::from_std(visibility).unwrap_or_default())
                    .timestamp_millis();
            let id: Option<String> = self
                .client
                .eval(
                    LEASE_SCRIPT,
                    vec![self.ready_key(queue), self.active_key(queue)],
                    vec![deadline_ms],
                )
                .await?;
            let Some(id) = id else { continue };

            match self.load_task(&id).await? {
                Some(task) => return Ok(Some(Delivery { task })),
                None => {
                    // Body purged from under us. Drop the orphan lease.
                    warn!(task_id = %id, queue = %queue, "leased task has no body; dropping");
                    self.client
                        .zrem::<i64, _, _>(self.active_key(queue), id.as_str())
                        .await?;
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn enqueue(&self, task: TaskMessage) -> Result<(), QueueError> {
        let result: Result<(), QueueError> = async {
            self.store_task(&task, None).await?;
            if task.is_eligible_at(Utc::now()) {
                self.client
                    .rpush::<i64, _, _>(self.ready_key(task.queue), task.id.as_str())
                    .await?;
            } else {
                let score = task.process_at.timestamp_millis() as f64;
                self.client
                    .zadd::<i64, _, _>(
                        self.delayed_key(task.queue),
                        None,
                        None,
                        false,
                        false,
                        (score, task.id.as_str()),
                    )
                    .await?;
            }
            Ok(())
        }
        .await;

        result.map_err(|e| QueueError::Enqueue(e.to_string()))
    }

    async fn dequeue(
        &self,
        queues: &[QueueName],
        visibility: Duration,
    ) -> Result<Option<Delivery>, QueueError> {
        let poll_deadline = Instant::now() + self.poll_window;

        loop {
            if let Some(delivery) = self.try_lease(queues, visibility).await? {
                return Ok(Some(delivery));
            }
            if Instant::now() >= poll_deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let task = &delivery.task;
        self.client
            .zrem::<i64, _, _>(self.active_key(task.queue), task.id.as_str())
            .await?;
        self.client.del::<i64, _>(self.task_key(&task.id)).await?;
        debug!(task_id = %task.id, queue = %task.queue, "task completed");
        Ok(())
    }

    async fn retry(
        &self,
        delivery: &Delivery,
        delay: Duration,
        error: &str,
    ) -> Result<(), QueueError> {
        let released: i64 = self
            .client
            .zrem(self.active_key(delivery.task.queue), delivery.task.id.as_str())
            .await?;
        if released == 0 {
            debug!(task_id = %delivery.task.id, "retry for expired lease");
            return Ok(());
        }

        let mut task = delivery.task.clone();
        task.retried += 1;
        task.last_error = Some(error.to_string());
        task.process_at =
            Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();

        self.store_task(&task, None).await?;
        let score = task.process_at.timestamp_millis() as f64;
        self.client
            .zadd::<i64, _, _>(
                self.delayed_key(task.queue),
                None,
                None,
                false,
                false,
                (score, task.id.as_str()),
            )
            .await?;
        Ok(())
    }

    async fn archive(&self, delivery: &Delivery, error: &str) -> Result<(), QueueError> {
        let task = &delivery.task;
        self.client
            .zrem::<i64, _, _>(self.active_key(task.queue), task.id.as_str())
            .await?;

        let mut archived = task.clone();
        archived.last_error = Some(error.to_string());
        self.store_task(&archived, Some(Expiration::EX(ARCHIVE_RETENTION_SECS)))
            .await?;

        let now_ms = Utc::now().timestamp_millis() as f64;
        self.client
            .zadd::<i64, _, _>(
                self.archived_key(task.queue),
                None,
                None,
                false,
                false,
                (now_ms, task.id.as_str()),
            )
            .await?;
        debug!(task_id = %task.id, queue = %task.queue, error = %error, "task archived");
        Ok(())
    }

    async fn reap_expired(&self, queues: &[QueueName]) -> Result<u64, QueueError> {
        let mut reaped = 0;

        for &queue in queues {
            let expired = self
                .move_due(self.active_key(queue), self.ready_key(queue))
                .await?;
            for id in &expired {
                warn!(task_id = %id, queue = %queue, "lease expired; task requeued");
            }
            reaped += expired.len() as u64;
        }
        Ok(reaped)
    }
}
