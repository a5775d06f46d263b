//! Endpoint id generation.

use rand::{rngs::OsRng, RngCore};

/// Number of random bytes behind every webhook id.
pub const WEBHOOK_ID_BYTES: usize = 16;

/// Generate an unguessable webhook id.
///
/// Draws [`WEBHOOK_ID_BYTES`] bytes from the operating system CSPRNG and
/// hex-encodes them, giving a 32 character lowercase token that is safe to
/// use as a URL path segment.
pub fn generate_webhook_id() -> String {
    let mut bytes = [0u8; WEBHOOK_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
