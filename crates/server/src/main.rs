//! Vaultbank task-processor entry point.
//!
//! Loads and validates configuration (failing fast on a bad token key
//! or missing settings), connects the Redis broker, registers every
//! task type the distributor can produce, and runs the worker pool
//! until SIGINT/SIGTERM.

use std::process::ExitCode;
use std::sync::Arc;

use fred::prelude::*;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vaultbank_common::Config;
use vaultbank_core::SmtpMailer;
use vaultbank_queue::{
    RedisBroker, TaskProcessor, VerifyEmailContext, VerifyEmailHandler, TYPE_VERIFY_EMAIL,
};
use vaultbank_token::TokenMaker;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vaultbank=debug".into()),
        )
        .init();

    // .env is optional; real deployments use the environment directly.
    let _ = dotenvy::dotenv();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Fatal startup or runtime error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting vaultbank task processor...");

    // Load and validate configuration; a wrong-size token key or a
    // missing setting must kill the process here, not at first use.
    let config = Config::load()?;
    config.validate()?;

    // Construct the token maker up front for the same reason, even
    // though only API handlers use it per request.
    let _token_maker = TokenMaker::new(config.token.symmetric_key.as_bytes())?;
    info!("Token maker initialized");

    // Connect to Redis
    info!("Connecting to Redis...");
    let redis_config = fred::types::config::Config::from_url(&config.redis.url)?;
    let redis_client = Client::new(redis_config, None, None, None);
    redis_client.init().await?;
    info!("Connected to Redis");

    let broker = Arc::new(RedisBroker::new(
        redis_client.clone(),
        config.redis.prefix.clone(),
    ));

    // Outbound email client
    let mailer = Arc::new(SmtpMailer::new(&config.email)?);

    // Register every task type the distributor can produce; an
    // unregistered type would refuse startup rather than dead-letter
    // tasks at runtime.
    let mut processor =
        TaskProcessor::new(broker).with_concurrency(config.worker.concurrency);
    processor.register(
        TYPE_VERIFY_EMAIL,
        Arc::new(VerifyEmailHandler::new(VerifyEmailContext::new(mailer))),
    )?;

    let running = processor.start()?;
    info!(
        environment = %config.environment,
        concurrency = config.worker.concurrency,
        "Task processor running"
    );

    shutdown_signal().await;

    running.shutdown(config.shutdown_grace()).await;

    if let Err(e) = redis_client.quit().await {
        error!(error = %e, "Error closing Redis connection");
    }
    info!("Shutdown complete");
    Ok(())
}
