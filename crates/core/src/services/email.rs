//! Email sending service.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use vaultbank_common::{AppError, AppResult, EmailSenderConfig};

/// A file attached to an outgoing email.
#[derive(Debug, Clone)]
pub struct EmailAttachment {
    /// File name shown to the recipient.
    pub filename: String,
    /// MIME type of the content.
    pub content_type: String,
    /// Raw file content.
    pub data: Vec<u8>,
}

/// Outbound email client.
///
/// Task workers depend on this trait rather than a concrete transport,
/// so tests can swap in a recording mock.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one email. Implementations report an undeliverable address
    /// as [`AppError::InvalidRecipient`]; callers treat every other
    /// error as transient.
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachments: &[EmailAttachment],
    ) -> AppResult<()>;
}

/// SMTP-backed [`Mailer`] using lettre's async transport.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build a mailer from sender configuration.
    ///
    /// # Errors
    /// Fails if the SMTP relay host or the sender address is invalid;
    /// both are startup-time configuration mistakes.
    pub fn new(config: &EmailSenderConfig) -> AppResult<Self> {
        let creds = Credentials::new(
            config.sender_address.clone(),
            config.sender_password.clone(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| AppError::Email(format!("invalid SMTP relay: {e}")))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        let from = format!("{} <{}>", config.sender_name, config.sender_address)
            .parse::<Mailbox>()
            .map_err(|e| AppError::Email(format!("invalid sender address: {e}")))?;

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachments: &[EmailAttachment],
    ) -> AppResult<()> {
        let to_mailbox = to
            .parse::<Mailbox>()
            .map_err(|e| AppError::InvalidRecipient(format!("{to}: {e}")))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to_mailbox)
            .subject(subject);

        let html = SinglePart::builder()
            .header(ContentType::TEXT_HTML)
            .body(body.to_string());

        let message = if attachments.is_empty() {
            builder
                .multipart(MultiPart::mixed().singlepart(html))
                .map_err(|e| AppError::Email(format!("failed to build message: {e}")))?
        } else {
            let mut multipart = MultiPart::mixed().singlepart(html);
            for attachment in attachments {
                let content_type = attachment
                    .content_type
                    .parse::<ContentType>()
                    .map_err(|e| {
                        AppError::Email(format!(
                            "invalid attachment content type {}: {e}",
                            attachment.content_type
                        ))
                    })?;
                multipart = multipart.singlepart(
                    Attachment::new(attachment.filename.clone())
                        .body(attachment.data.clone(), content_type),
                );
            }
            builder
                .multipart(multipart)
                .map_err(|e| AppError::Email(format!("failed to build message: {e}")))?
        };

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Email(format!("SMTP send failed: {e}")))?;

        tracing::info!(to = %to, subject = %subject, "Email sent");
        Ok(())
    }
}
