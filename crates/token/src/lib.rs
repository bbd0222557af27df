//! Authentication tokens for vaultbank.
//!
//! Tokens are symmetric authenticated-encryption wrappers around a
//! small claims [`Payload`]: confidentiality and integrity in one
//! construction, verified without any storage round trip.
//!
//! - [`TokenCodec`]: XChaCha20-Poly1305 seal/open of claim bytes
//! - [`Payload`]: identity, token id, validity window
//! - [`TokenMaker`]: `create_token` / `verify_token` on top of both
//!
//! # Example
//!
//! ```
//! use chrono::Duration;
//! use vaultbank_token::TokenMaker;
//!
//! # fn main() -> Result<(), vaultbank_token::TokenError> {
//! let maker = TokenMaker::new(&[0u8; 32])?;
//! let (token, payload) = maker.create_token("alice", Duration::minutes(15))?;
//! assert_eq!(maker.verify_token(&token)?.id, payload.id);
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod error;
pub mod maker;
pub mod payload;

pub use codec::TokenCodec;
pub use error::TokenError;
pub use maker::TokenMaker;
pub use payload::Payload;
