//! Claims carried inside an authentication token.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vaultbank_common::IdGenerator;

use crate::error::TokenError;

/// Identity claims embedded in a token.
///
/// Immutable once created; the maker never persists it. The `id` is
/// returned to callers so a session record can be keyed on it if a
/// revocation layer is added on top.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Globally unique identifier for this token instance.
    pub id: Uuid,
    /// Identity the token authenticates (e.g. account username).
    pub subject: String,
    /// Issuance instant.
    pub issued_at: DateTime<Utc>,
    /// Expiry instant. Always after `issued_at`.
    pub expires_at: DateTime<Utc>,
}

impl Payload {
    /// Build a fresh payload valid for `duration` from now.
    ///
    /// # Errors
    /// Returns [`TokenError::InvalidDuration`] for a non-positive
    /// duration, which would break the `expires_at > issued_at`
    /// invariant.
    pub fn new(subject: impl Into<String>, duration: Duration) -> Result<Self, TokenError> {
        if duration <= Duration::zero() {
            return Err(TokenError::InvalidDuration);
        }

        let issued_at = Utc::now();
        Ok(Self {
            id: IdGenerator::new().token_id(),
            subject: subject.into(),
            issued_at,
            expires_at: issued_at + duration,
        })
    }

    /// Check expiry against an explicit clock instant.
    ///
    /// # Errors
    /// Returns [`TokenError::ExpiredToken`] once `now` is past
    /// `expires_at`.
    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<(), TokenError> {
        if now > self.expires_at {
            return Err(TokenError::ExpiredToken);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_payload_gets_its_own_id() {
        let a = Payload::new("alice", Duration::minutes(15)).unwrap();
        let b = Payload::new("alice", Duration::minutes(15)).unwrap();
        assert_ne!(a.id, b.id);
        assert!(!a.id.is_nil());
    }

    #[test]
    fn fresh_payload_is_valid_now() {
        let payload = Payload::new("alice", Duration::minutes(15)).unwrap();
        assert_eq!(payload.subject, "alice");
        assert!(payload.expires_at > payload.issued_at);
        assert!(payload.validate_at(Utc::now()).is_ok());
    }

    #[test]
    fn payload_expires() {
        let payload = Payload::new("alice", Duration::minutes(15)).unwrap();
        let later = payload.issued_at + Duration::minutes(16);
        assert_eq!(payload.validate_at(later), Err(TokenError::ExpiredToken));
    }

    #[test]
    fn non_positive_duration_rejected() {
        assert_eq!(
            Payload::new("alice", Duration::zero()).unwrap_err(),
            TokenError::InvalidDuration
        );
        assert_eq!(
            Payload::new("alice", Duration::minutes(-1)).unwrap_err(),
            TokenError::InvalidDuration
        );
    }

    #[test]
    fn ids_are_unique_per_issuance() {
        let a = Payload::new("alice", Duration::minutes(1)).unwrap();
        let b = Payload::new("alice", Duration::minutes(1)).unwrap();
        assert_ne!(a.id, b.id);
    }
}
