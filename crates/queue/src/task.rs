//! Task envelope and delivery options.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Priority classes a task can be enqueued into.
///
/// Workers poll queues in strict descending priority: no `Default`
/// task is dequeued by an idle worker while a `Critical` task is
/// eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueName {
    /// Must-run-now work (e.g. verification emails blocking signup).
    Critical,
    /// Ordinary background work.
    Default,
    /// Work that can wait for idle capacity.
    Low,
}

impl QueueName {
    /// All queues in strict descending polling order.
    pub const PRIORITY_ORDER: [Self; 3] = [Self::Critical, Self::Default, Self::Low];

    /// Queue name as used in Redis keys and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Default => "default",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery options chosen by the producer.
#[derive(Debug, Clone)]
pub struct TaskOptions {
    /// Target priority class.
    pub queue: QueueName,
    /// Upper bound on redelivery attempts after the first.
    pub max_retry: u32,
    /// Delay before the task becomes eligible, relative to enqueue.
    pub delay: Option<Duration>,
    /// Absolute earliest delivery instant. Takes precedence over
    /// `delay` when both are set.
    pub process_at: Option<DateTime<Utc>>,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            queue: QueueName::Default,
            max_retry: 10,
            delay: None,
            process_at: None,
        }
    }
}

impl TaskOptions {
    /// Target a specific queue.
    #[must_use]
    pub const fn queue(mut self, queue: QueueName) -> Self {
        self.queue = queue;
        self
    }

    /// Bound redelivery attempts.
    #[must_use]
    pub const fn max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    /// Delay eligibility relative to enqueue time.
    #[must_use]
    pub const fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Set an absolute earliest delivery instant.
    #[must_use]
    pub const fn process_at(mut self, at: DateTime<Utc>) -> Self {
        self.process_at = Some(at);
        self
    }

    /// Resolve the effective earliest delivery instant.
    #[must_use]
    pub fn effective_process_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        if let Some(at) = self.process_at {
            return at;
        }
        match self.delay {
            Some(delay) => now + chrono::Duration::from_std(delay).unwrap_or_default(),
            None => now,
        }
    }
}

/// A unit of deferred work as stored in the queue backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMessage {
    /// Unique task ID (ULID).
    pub id: String,
    /// Handler type name, e.g. `task:send_verify_email`.
    pub type_name: String,
    /// Opaque handler-specific payload bytes.
    pub payload: Vec<u8>,
    /// Queue the task was enqueued into.
    pub queue: QueueName,
    /// Upper bound on redelivery attempts after the first.
    pub max_retry: u32,
    /// Completed failed attempts so far.
    pub retried: u32,
    /// Earliest instant the task is eligible for delivery.
    pub process_at: DateTime<Utc>,
    /// Enqueue instant.
    pub enqueued_at: DateTime<Utc>,
    /// Error message from the most recent failed attempt.
    pub last_error: Option<String>,
}

impl TaskMessage {
    /// Build a fresh envelope from producer inputs.
    #[must_use]
    pub fn new(id: String, type_name: String, payload: Vec<u8>, options: &TaskOptions) -> Self {
        let now = Utc::now();
        Self {
            id,
            type_name,
            payload,
            queue: options.queue,
            max_retry: options.max_retry,
            retried: 0,
            process_at: options.effective_process_at(now),
            enqueued_at: now,
            last_error: None,
        }
    }

    /// Whether the task is eligible for delivery at `now`.
    #[must_use]
    pub fn is_eligible_at(&self, now: DateTime<Utc>) -> bool {
        self.process_at <= now
    }

    /// Whether the retry budget still allows another delivery.
    #[must_use]
    pub const fn has_retries_left(&self) -> bool {
        self.retried < self.max_retry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_is_strictly_descending() {
        assert_eq!(
            QueueName::PRIORITY_ORDER,
            [QueueName::Critical, QueueName::Default, QueueName::Low]
        );
    }

    #[test]
    fn default_options() {
        let options = TaskOptions::default();
        assert_eq!(options.queue, QueueName::Default);
        assert_eq!(options.max_retry, 10);
        assert!(options.delay.is_none());
    }

    #[test]
    fn delay_moves_process_at_forward() {
        let options = TaskOptions::default().delay(Duration::from_secs(60));
        let task = TaskMessage::new(
            "01abc".to_string(),
            "task:x".to_string(),
            Vec::new(),
            &options,
        );
        assert!(!task.is_eligible_at(Utc::now()));
        assert!(task.is_eligible_at(Utc::now() + chrono::Duration::seconds(61)));
    }

    #[test]
    fn explicit_process_at_wins_over_delay() {
        let at = Utc::now() + chrono::Duration::hours(2);
        let options = TaskOptions::default()
            .delay(Duration::from_secs(1))
            .process_at(at);
        assert_eq!(options.effective_process_at(Utc::now()), at);
    }

    #[test]
    fn retry_budget() {
        let options = TaskOptions::default().max_retry(2);
        let mut task = TaskMessage::new(
            "01abc".to_string(),
            "task:x".to_string(),
            Vec::new(),
            &options,
        );
        assert!(task.has_retries_left());
        task.retried = 2;
        assert!(!task.has_retries_left());
    }

    #[test]
    fn envelope_round_trips_as_json() {
        let task = TaskMessage::new(
            "01abc".to_string(),
            "task:send_verify_email".to_string(),
            br#"{"email":"a@b.com"}"#.to_vec(),
            &TaskOptions::default().queue(QueueName::Critical),
        );
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"critical\""));
        let back: TaskMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, task);
    }
}
