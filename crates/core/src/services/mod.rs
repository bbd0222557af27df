//! Business logic services.

pub mod email;

pub use email::{EmailAttachment, Mailer, SmtpMailer};
