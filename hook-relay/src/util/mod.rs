//! Small shared helpers.

pub mod id;

pub use id::{generate_webhook_id, WEBHOOK_ID_BYTES};
