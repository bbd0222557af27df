//! Job workers.

mod verify_email;

pub use verify_email::{VerifyEmailContext, VerifyEmailHandler};
