//! Redis broker integration tests.
//!
//! These tests require a running Redis instance.
//! Run with: `cargo test --test redis_integration -- --ignored`
//!
//! Set `REDIS_URL` environment variable to point to your Redis instance.
//! Default: <redis://localhost:6379>

use std::time::Duration;

use fred::clients::Client;
use fred::interfaces::ClientLike;
use vaultbank_common::IdGenerator;
use vaultbank_queue::broker::Broker;
use vaultbank_queue::{QueueName, RedisBroker, TaskMessage, TaskOptions};

fn get_redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

/// Each test gets its own key prefix so runs never see each other's
/// leftovers.
async fn connect() -> RedisBroker {
    let url = get_redis_url();
    let config = fred::types::config::Config::from_url(&url).expect("invalid REDIS_URL");
    let client = Client::new(config, None, None, None);
    client.init().await.expect("Failed to connect to Redis");

    let prefix = format!("vbtest:{}", IdGenerator::new().task_id());
    RedisBroker::new(client, prefix)
        .with_poll_window(Duration::from_millis(200))
        .with_poll_interval(Duration::from_millis(20))
}

fn task(type_name: &str) -> TaskMessage {
    TaskMessage::new(
        IdGenerator::new().task_id(),
        type_name.to_string(),
        b"{}".to_vec(),
        &TaskOptions::default(),
    )
}

const ALL_QUEUES: &[QueueName] = &QueueName::PRIORITY_ORDER;

#[tokio::test]
#[ignore = "requires running Redis instance"]
async fn enqueue_dequeue_ack_round_trip() {
    let broker = connect().await;
    let enqueued = task("demo");
    broker.enqueue(enqueued.clone()).await.unwrap();

    let delivery = broker
        .dequeue(ALL_QUEUES, Duration::from_secs(30))
        .await
        .unwrap()
        .expect("task should be delivered");
    assert_eq!(delivery.task.id, enqueued.id);

    broker.ack(&delivery).await.unwrap();
    let empty = broker
        .dequeue(ALL_QUEUES, Duration::from_secs(30))
        .await
        .unwrap();
    assert!(empty.is_none());
}

/// A dequeue future dropped mid-flight (worker shutdown races the
/// broker call) must never lose the task: it either stays ready or
/// ends up leased, where the reaper recovers it after the visibility
/// window.
#[tokio::test]
#[ignore = "requires running Redis instance"]
async fn dropped_dequeue_never_loses_a_task() {
    let broker = connect().await;
    let visibility = Duration::from_millis(100);
    broker.enqueue(task("demo")).await.unwrap();

    for _ in 0..10 {
        let pending = broker.dequeue(ALL_QUEUES, visibility);
        // One poll starts the lease call, then the future is dropped.
        let _ = tokio::time::timeout(Duration::ZERO, pending).await;
    }

    tokio::time::sleep(visibility + Duration::from_millis(50)).await;
    broker.reap_expired(ALL_QUEUES).await.unwrap();

    let delivery = broker
        .dequeue(ALL_QUEUES, Duration::from_secs(30))
        .await
        .unwrap();
    assert!(delivery.is_some(), "task was lost by a cancelled dequeue");
}

#[tokio::test]
#[ignore = "requires running Redis instance"]
async fn expired_lease_is_requeued() {
    let broker = connect().await;
    broker.enqueue(task("demo")).await.unwrap();

    let first = broker
        .dequeue(ALL_QUEUES, Duration::from_millis(50))
        .await
        .unwrap()
        .expect("task should be delivered");

    tokio::time::sleep(Duration::from_millis(100)).await;
    let reaped = broker.reap_expired(ALL_QUEUES).await.unwrap();
    assert_eq!(reaped, 1);

    let second = broker
        .dequeue(ALL_QUEUES, Duration::from_secs(30))
        .await
        .unwrap()
        .expect("reaped task should be redelivered");
    assert_eq!(second.task.id, first.task.id);
}
