//! Job payload definitions.

mod verify_email;

pub use verify_email::{VerifyEmailJob, TYPE_VERIFY_EMAIL};
