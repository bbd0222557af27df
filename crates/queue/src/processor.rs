//! Consumer-side task processing: handler registry and worker pool.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::broker::{Broker, Delivery};
use crate::error::{QueueError, TaskError};
use crate::retry::RetryConfig;
use crate::task::{QueueName, TaskMessage};

/// A processing function for one task type.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Process one delivery. Return [`TaskError::Retryable`] for
    /// transient failures and [`TaskError::Terminal`] when retrying
    /// cannot succeed.
    async fn handle(&self, task: &TaskMessage) -> Result<(), TaskError>;
}

/// Pulls tasks from the broker in strict priority order and runs
/// registered handlers with bounded concurrency.
pub struct TaskProcessor {
    broker: Arc<dyn Broker>,
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
    concurrency: usize,
    queues: Vec<QueueName>,
    visibility: Duration,
    retry: RetryConfig,
    reap_interval: Duration,
}

impl TaskProcessor {
    /// Create a processor on an explicit broker with defaults:
    /// concurrency 10, all queues in priority order, 30s visibility
    /// timeout.
    #[must_use]
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self {
            broker,
            handlers: HashMap::new(),
            concurrency: 10,
            queues: QueueName::PRIORITY_ORDER.to_vec(),
            visibility: Duration::from_secs(30),
            retry: RetryConfig::default(),
            reap_interval: Duration::from_secs(10),
        }
    }

    /// Set the worker pool size.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Restrict or reorder the polled queues. The order given is the
    /// strict priority order.
    #[must_use]
    pub fn with_queues(mut self, queues: Vec<QueueName>) -> Self {
        self.queues = queues;
        self
    }

    /// Set the lease window granted on each dequeue.
    #[must_use]
    pub const fn with_visibility(mut self, visibility: Duration) -> Self {
        self.visibility = visibility;
        self
    }

    /// Set the retry backoff policy.
    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set how often expired leases are reaped.
    #[must_use]
    pub const fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    /// Associate a type name with a handler. Every type the
    /// distributor can produce must be registered before [`start`].
    ///
    /// # Errors
    /// [`QueueError::Registry`] on duplicate registration.
    ///
    /// [`start`]: Self::start
    pub fn register(
        &mut self,
        type_name: impl Into<String>,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<(), QueueError> {
        let type_name = type_name.into();
        if self.handlers.contains_key(&type_name) {
            return Err(QueueError::Registry(format!(
                "handler already registered for {type_name}"
            )));
        }
        self.handlers.insert(type_name, handler);
        Ok(())
    }

    /// Launch the worker pool and the lease reaper.
    ///
    /// # Errors
    /// [`QueueError::Registry`] if no handler was registered or the
    /// pool size is zero; both would make the processor a task sink.
    pub fn start(self) -> Result<RunningProcessor, QueueError> {
        if self.handlers.is_empty() {
            return Err(QueueError::Registry(
                "no task handlers registered".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(QueueError::Registry(
                "worker concurrency must be positive".to_string(),
            ));
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ctx = Arc::new(WorkerContext {
            broker: self.broker,
            handlers: self.handlers,
            queues: self.queues,
            visibility: self.visibility,
            retry: self.retry,
        });

        let mut workers = JoinSet::new();
        for worker_id in 0..self.concurrency {
            workers.spawn(worker_loop(ctx.clone(), shutdown_rx.clone(), worker_id));
        }
        workers.spawn(reaper_loop(
            ctx.clone(),
            shutdown_rx,
            self.reap_interval,
        ));

        info!(
            concurrency = self.concurrency,
            queues = ?ctx.queues,
            "Task processor started"
        );

        Ok(RunningProcessor {
            shutdown_tx,
            workers,
        })
    }
}

/// Shared state for the worker pool.
struct WorkerContext {
    broker: Arc<dyn Broker>,
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
    queues: Vec<QueueName>,
    visibility: Duration,
    retry: RetryConfig,
}

/// Handle to a started processor.
pub struct RunningProcessor {
    shutdown_tx: watch::Sender<bool>,
    workers: JoinSet<()>,
}

impl RunningProcessor {
    /// Stop accepting new deliveries and wait up to `grace` for
    /// in-flight handlers to finish; anything still running after the
    /// grace period is abandoned to the backend's visibility timeout.
    pub async fn shutdown(mut self, grace: Duration) {
        info!("Task processor shutting down");
        let _ = self.shutdown_tx.send(true);

        let drain = async {
            while self.workers.join_next().await.is_some() {}
        };
        if tokio::time::timeout(grace, drain).await.is_err() {
            warn!(
                grace_secs = grace.as_secs(),
                "Grace period elapsed; abandoning in-flight deliveries to the visibility timeout"
            );
            self.workers.shutdown().await;
        }
        info!("Task processor stopped");
    }
}

async fn worker_loop(
    ctx: Arc<WorkerContext>,
    mut shutdown_rx: watch::Receiver<bool>,
    worker_id: usize,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            dequeued = ctx.broker.dequeue(&ctx.queues, ctx.visibility) => {
                match dequeued {
                    Ok(Some(delivery)) => process_delivery(&ctx, delivery).await,
                    Ok(None) => {}
                    Err(e) => {
                        warn!(worker = worker_id, error = %e, "Dequeue failed; backing off");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }
    info!(worker = worker_id, "Worker stopped");
}

async fn reaper_loop(
    ctx: Arc<WorkerContext>,
    mut shutdown_rx: watch::Receiver<bool>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                match ctx.broker.reap_expired(&ctx.queues).await {
                    Ok(0) => {}
                    Ok(n) => info!(count = n, "Requeued expired leases"),
                    Err(e) => warn!(error = %e, "Lease reaping failed"),
                }
            }
        }
    }
}

async fn process_delivery(ctx: &WorkerContext, delivery: Delivery) {
    let task = &delivery.task;

    let Some(handler) = ctx.handlers.get(&task.type_name) else {
        error!(
            task_id = %task.id,
            task_type = %task.type_name,
            "No handler registered for task type; archiving"
        );
        if let Err(e) = ctx
            .broker
            .archive(&delivery, "unregistered handler")
            .await
        {
            error!(task_id = %task.id, error = %e, "Failed to archive unroutable task");
        }
        return;
    };

    info!(
        task_id = %task.id,
        task_type = %task.type_name,
        queue = %task.queue,
        attempt = task.retried + 1,
        "Processing task"
    );

    // Run the handler on its own task so a panic surfaces as a
    // JoinError instead of killing the worker.
    let handler = handler.clone();
    let owned = task.clone();
    let joined = tokio::spawn(async move { handler.handle(&owned).await }).await;

    let result = match joined {
        Ok(result) => result,
        Err(join_err) => Err(TaskError::Terminal(format!("handler panicked: {join_err}"))),
    };

    let outcome = match result {
        Ok(()) => {
            info!(task_id = %task.id, task_type = %task.type_name, "Task completed");
            ctx.broker.ack(&delivery).await
        }
        Err(err) if err.is_retryable() && task.has_retries_left() => {
            let delay = ctx.retry.delay_for_attempt(task.retried);
            warn!(
                task_id = %task.id,
                task_type = %task.type_name,
                attempt = task.retried + 1,
                retry_in_ms = delay.as_millis() as u64,
                error = %err,
                "Task failed; scheduling retry"
            );
            ctx.broker.retry(&delivery, delay, &err.to_string()).await
        }
        Err(err) => {
            error!(
                task_id = %task.id,
                task_type = %task.type_name,
                attempts = task.retried + 1,
                error = %err,
                "Task failed permanently; archiving"
            );
            ctx.broker.archive(&delivery, &err.to_string()).await
        }
    };

    if let Err(e) = outcome {
        error!(task_id = %task.id, error = %e, "Failed to settle delivery");
    }
}
