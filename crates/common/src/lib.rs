//! Common utilities and shared types for vaultbank.
//!
//! This crate provides foundational components used across all vaultbank crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID task IDs and UUID token IDs via [`IdGenerator`]
//!
//! # Example
//!
//! ```no_run
//! use vaultbank_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     config.validate()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.task_id();
//!     println!("Generated ID: {}", id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;

pub use config::{Config, EmailSenderConfig, RedisConfig, TokenConfig, WorkerConfig, TOKEN_KEY_SIZE};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
