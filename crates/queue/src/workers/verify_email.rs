//! Verify-email worker.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use vaultbank_common::AppError;
use vaultbank_core::Mailer;

use crate::error::TaskError;
use crate::jobs::VerifyEmailJob;
use crate::processor::TaskHandler;
use crate::task::TaskMessage;

/// Context for the verify-email worker.
#[derive(Clone)]
pub struct VerifyEmailContext {
    /// Outbound email client.
    pub mailer: Arc<dyn Mailer>,
}

impl VerifyEmailContext {
    /// Create a new verify-email context.
    #[must_use]
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }
}

/// Handler for [`crate::jobs::TYPE_VERIFY_EMAIL`] tasks.
pub struct VerifyEmailHandler {
    ctx: VerifyEmailContext,
}

impl VerifyEmailHandler {
    /// Create a new handler.
    #[must_use]
    pub const fn new(ctx: VerifyEmailContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl TaskHandler for VerifyEmailHandler {
    async fn handle(&self, task: &TaskMessage) -> Result<(), TaskError> {
        // A payload that does not parse will never parse; no point
        // burning the retry budget on it.
        let job: VerifyEmailJob =
            serde_json::from_slice(&task.payload).map_err(TaskError::terminal)?;

        info!(
            task_id = %task.id,
            email = %job.email,
            "Sending verification email"
        );

        self.ctx
            .mailer
            .send_email(&job.email, &job.subject(), &job.body(), &[])
            .await
            .map_err(|e| match e {
                AppError::InvalidRecipient(_) => TaskError::Terminal(e.to_string()),
                other => TaskError::Retryable(other.to_string()),
            })?;

        info!(task_id = %task.id, email = %job.email, "Verification email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vaultbank_common::{AppError, AppResult};
    use vaultbank_core::EmailAttachment;

    struct RecordingMailer {
        sent: AtomicUsize,
        fail_with: Option<AppError>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_email(
            &self,
            _to: &str,
            _subject: &str,
            _body: &str,
            _attachments: &[EmailAttachment],
        ) -> AppResult<()> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            match &self.fail_with {
                Some(AppError::InvalidRecipient(msg)) => {
                    Err(AppError::InvalidRecipient(msg.clone()))
                }
                Some(AppError::Email(msg)) => Err(AppError::Email(msg.clone())),
                Some(_) | None => Ok(()),
            }
        }
    }

    fn task_with(job: &VerifyEmailJob) -> TaskMessage {
        TaskMessage::new(
            "01test".to_string(),
            crate::jobs::TYPE_VERIFY_EMAIL.to_string(),
            serde_json::to_vec(job).unwrap(),
            &TaskOptions::default(),
        )
    }

    #[tokio::test]
    async fn sends_the_email() {
        let mailer = Arc::new(RecordingMailer {
            sent: AtomicUsize::new(0),
            fail_with: None,
        });
        let handler = VerifyEmailHandler::new(VerifyEmailContext::new(mailer.clone()));

        let job = VerifyEmailJob::new(
            "alice".to_string(),
            "a@b.com".to_string(),
            "123456".to_string(),
        );
        handler.handle(&task_with(&job)).await.unwrap();
        assert_eq!(mailer.sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn smtp_failure_is_retryable() {
        let mailer = Arc::new(RecordingMailer {
            sent: AtomicUsize::new(0),
            fail_with: Some(AppError::Email("SMTP send failed: timeout".to_string())),
        });
        let handler = VerifyEmailHandler::new(VerifyEmailContext::new(mailer));

        let job = VerifyEmailJob::new(
            "alice".to_string(),
            "a@b.com".to_string(),
            "123456".to_string(),
        );
        let err = handler.handle(&task_with(&job)).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn invalid_recipient_is_terminal() {
        let mailer = Arc::new(RecordingMailer {
            sent: AtomicUsize::new(0),
            fail_with: Some(AppError::InvalidRecipient(
                "not-an-address: missing @".to_string(),
            )),
        });
        let handler = VerifyEmailHandler::new(VerifyEmailContext::new(mailer));

        let job = VerifyEmailJob::new(
            "alice".to_string(),
            "not-an-address".to_string(),
            "123456".to_string(),
        );
        let err = handler.handle(&task_with(&job)).await.unwrap_err();
        assert!(!err.is_retryable());
    }

    // Classification is by error variant, not by anything in the
    // message text.
    #[tokio::test]
    async fn transport_error_mentioning_the_recipient_stays_retryable() {
        let mailer = Arc::new(RecordingMailer {
            sent: AtomicUsize::new(0),
            fail_with: Some(AppError::Email(
                "SMTP send failed: invalid recipient greeting from relay".to_string(),
            )),
        });
        let handler = VerifyEmailHandler::new(VerifyEmailContext::new(mailer));

        let job = VerifyEmailJob::new(
            "alice".to_string(),
            "a@b.com".to_string(),
            "123456".to_string(),
        );
        let err = handler.handle(&task_with(&job)).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn garbage_payload_is_terminal() {
        let mailer = Arc::new(RecordingMailer {
            sent: AtomicUsize::new(0),
            fail_with: None,
        });
        let handler = VerifyEmailHandler::new(VerifyEmailContext::new(mailer.clone()));

        let task = TaskMessage::new(
            "01test".to_string(),
            crate::jobs::TYPE_VERIFY_EMAIL.to_string(),
            b"not json".to_vec(),
            &TaskOptions::default(),
        );
        let err = handler.handle(&task).await.unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(mailer.sent.load(Ordering::SeqCst), 0);
    }
}
