//! Application configuration.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Symmetric token keys must be exactly this many bytes.
pub const TOKEN_KEY_SIZE: usize = 32;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Application environment (development, production, ...).
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Redis configuration.
    pub redis: RedisConfig,
    /// Token configuration.
    pub token: TokenConfig,
    /// Worker pool configuration.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Email sender configuration.
    pub email: EmailSenderConfig,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// Key prefix for all Redis keys.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

/// Token configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// Symmetric key used to encrypt tokens. Exactly 32 bytes.
    pub symmetric_key: String,
    /// Access token lifetime in seconds.
    #[serde(default = "default_access_token_ttl_secs")]
    pub access_token_ttl_secs: u64,
    /// Refresh token lifetime in seconds.
    #[serde(default = "default_refresh_token_ttl_secs")]
    pub refresh_token_ttl_secs: u64,
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent task handlers.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Graceful shutdown window in seconds.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

/// Email sender configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailSenderConfig {
    /// SMTP host.
    pub smtp_host: String,
    /// SMTP port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// Display name of the sender.
    pub sender_name: String,
    /// From address.
    pub sender_address: String,
    /// SMTP password (app password for the sender account).
    pub sender_password: String,
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_redis_prefix() -> String {
    "vaultbank".to_string()
}

const fn default_access_token_ttl_secs() -> u64 {
    900 // 15 minutes
}

const fn default_refresh_token_ttl_secs() -> u64 {
    86400 // 24 hours
}

const fn default_concurrency() -> usize {
    10
}

const fn default_shutdown_grace_secs() -> u64 {
    30
}

const fn default_smtp_port() -> u16 {
    587
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `VAULTBANK_ENV`)
    /// 3. Environment variables with `VAULTBANK__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("VAULTBANK_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("VAULTBANK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("VAULTBANK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate settings that would otherwise only fail deep inside the
    /// process. Called once at startup; the process must exit non-zero
    /// on error.
    pub fn validate(&self) -> Result<(), crate::AppError> {
        let mut missing = Vec::new();

        if self.token.symmetric_key.len() != TOKEN_KEY_SIZE {
            return Err(crate::AppError::Config(format!(
                "token.symmetric_key must be exactly {TOKEN_KEY_SIZE} bytes, got {}",
                self.token.symmetric_key.len()
            )));
        }
        if self.token.access_token_ttl_secs == 0 {
            return Err(crate::AppError::Config(
                "token.access_token_ttl_secs must be positive".to_string(),
            ));
        }
        if self.token.refresh_token_ttl_secs == 0 {
            return Err(crate::AppError::Config(
                "token.refresh_token_ttl_secs must be positive".to_string(),
            ));
        }
        if self.worker.concurrency == 0 {
            return Err(crate::AppError::Config(
                "worker.concurrency must be positive".to_string(),
            ));
        }

        if self.redis.url.is_empty() {
            missing.push("redis.url");
        }
        if self.email.smtp_host.is_empty() {
            missing.push("email.smtp_host");
        }
        if self.email.sender_name.is_empty() {
            missing.push("email.sender_name");
        }
        if self.email.sender_address.is_empty() {
            missing.push("email.sender_address");
        }
        if self.email.sender_password.is_empty() {
            missing.push("email.sender_password");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(crate::AppError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )))
        }
    }

    /// Access token lifetime.
    #[must_use]
    pub const fn access_token_ttl(&self) -> Duration {
        Duration::from_secs(self.token.access_token_ttl_secs)
    }

    /// Refresh token lifetime.
    #[must_use]
    pub const fn refresh_token_ttl(&self) -> Duration {
        Duration::from_secs(self.token.refresh_token_ttl_secs)
    }

    /// Graceful shutdown window for the task processor.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.worker.shutdown_grace_secs)
    }
}
