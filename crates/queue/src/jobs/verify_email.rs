//! Account email verification job.

use serde::{Deserialize, Serialize};

/// Task type name for sending a verification email.
pub const TYPE_VERIFY_EMAIL: &str = "task:send_verify_email";

/// Job to send a verification email to a newly registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyEmailJob {
    /// Account username (greeting only).
    pub username: String,
    /// Recipient address.
    pub email: String,
    /// One-time code the recipient submits back to prove ownership.
    pub secret_code: String,
}

impl VerifyEmailJob {
    /// Create a new verify-email job.
    #[must_use]
    pub const fn new(username: String, email: String, secret_code: String) -> Self {
        Self {
            username,
            email,
            secret_code,
        }
    }

    /// Subject line for the email.
    #[must_use]
    pub fn subject(&self) -> String {
        "Welcome to Vaultbank — verify your email".to_string()
    }

    /// HTML body for the email.
    #[must_use]
    pub fn body(&self) -> String {
        format!(
            "Hello {},<br/>\
             Thank you for registering with us!<br/>\
             Please enter the following code to verify your email address: \
             <strong>{}</strong><br/>",
            self.username, self.secret_code
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_carries_the_secret_code() {
        let job = VerifyEmailJob::new(
            "alice".to_string(),
            "alice@example.com".to_string(),
            "123456".to_string(),
        );
        assert!(job.body().contains("123456"));
        assert!(job.body().contains("alice"));
    }

    #[test]
    fn round_trips_as_json() {
        let job = VerifyEmailJob::new(
            "alice".to_string(),
            "alice@example.com".to_string(),
            "123456".to_string(),
        );
        let bytes = serde_json::to_vec(&job).unwrap();
        let back: VerifyEmailJob = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back.email, "alice@example.com");
    }
}
