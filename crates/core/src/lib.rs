//! Core services for vaultbank.

pub mod services;

pub use services::*;
