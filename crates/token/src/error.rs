//! Token layer errors.

use thiserror::Error;
use vaultbank_common::AppError;

/// Errors produced while creating or verifying tokens.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// The symmetric key is not exactly 32 bytes.
    #[error("invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength {
        /// Required key size.
        expected: usize,
        /// Size actually supplied.
        got: usize,
    },

    /// A token lifetime must be strictly positive.
    #[error("invalid token duration")]
    InvalidDuration,

    /// The authentication tag did not verify: the token was tampered
    /// with or encrypted under a different key.
    #[error("token integrity check failed")]
    Integrity,

    /// The token is not well-formed (bad encoding, truncated, or the
    /// decrypted claims do not parse).
    #[error("malformed token")]
    Malformed,

    /// The token is past its expiry instant.
    #[error("token has expired")]
    ExpiredToken,
}

/// Every token failure collapses to a generic `Unauthorized` at the
/// application boundary so callers cannot distinguish expired from
/// forged from malformed.
impl From<TokenError> for AppError {
    fn from(_: TokenError) -> Self {
        Self::Unauthorized
    }
}
