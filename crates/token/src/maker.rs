//! Stateless token maker: create and verify operations.

use chrono::{DateTime, Duration, Utc};

use crate::codec::TokenCodec;
use crate::error::TokenError;
use crate::payload::Payload;

/// Creates and verifies tamper-proof, time-bound authentication tokens.
///
/// Holds only the immutable symmetric key (inside the codec), so it is
/// cheap to clone and safe to share across request handlers.
/// Verification is purely cryptographic: no store round trip, and
/// therefore no revocation before natural expiry.
#[derive(Debug, Clone)]
pub struct TokenMaker {
    codec: TokenCodec,
}

impl TokenMaker {
    /// Create a maker from a 32-byte symmetric key.
    ///
    /// # Errors
    /// Returns [`TokenError::InvalidKeyLength`] for any other key size,
    /// so a misconfigured key kills the process at startup rather than
    /// on first use.
    pub fn new(key: &[u8]) -> Result<Self, TokenError> {
        Ok(Self {
            codec: TokenCodec::new(key)?,
        })
    }

    /// Issue a token for `subject`, valid for `duration` from now.
    ///
    /// Returns the opaque token together with its payload; callers may
    /// persist the payload `id` as a session reference (refresh-token
    /// flow) even though the maker itself stores nothing.
    pub fn create_token(
        &self,
        subject: impl Into<String>,
        duration: Duration,
    ) -> Result<(String, Payload), TokenError> {
        let payload = Payload::new(subject, duration)?;
        let claims = serde_json::to_vec(&payload).map_err(|_| TokenError::Malformed)?;
        let token = self.codec.encrypt(&claims)?;
        Ok((token, payload))
    }

    /// Verify a token against the current clock.
    pub fn verify_token(&self, token: &str) -> Result<Payload, TokenError> {
        self.verify_token_at(token, Utc::now())
    }

    /// Verify a token against an explicit clock instant.
    ///
    /// # Errors
    /// [`TokenError::Integrity`] or [`TokenError::Malformed`] as
    /// propagated from the codec, [`TokenError::ExpiredToken`] once
    /// `now` is past the payload expiry. No error path yields a usable
    /// payload.
    pub fn verify_token_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Payload, TokenError> {
        let claims = self.codec.decrypt(token)?;
        let payload: Payload =
            serde_json::from_slice(&claims).map_err(|_| TokenError::Malformed)?;
        payload.validate_at(now)?;
        Ok(payload)
    }
}
