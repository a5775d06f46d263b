//! Public exposure of the relay.
//!
//! This module provides:
//! - The tunnel agent client (single attempt with timeout, single teardown)
//! - The shared [`Exposure`] accessor handlers read the outcome through
//!
//! ## Startup
//!
//! ```text
//! PUBLIC_URL set?  → Live(PUBLIC_URL)
//! tunnel token?    → TunnelClient::attempt → Live(url) | Unavailable(reason)
//! otherwise        → Unavailable("tunnel not configured")
//! ```

pub mod client;
pub mod types;

use tracing::{info, warn};

use crate::Config;

pub use client::TunnelClient;
pub use types::{Exposure, ExposureState, PublicUrl, TunnelError, TunnelOutcome};

/// Determine the public base URL for this process.
///
/// Never fails: every problem is reported as [`TunnelOutcome::Unavailable`].
pub async fn resolve_exposure(config: &Config, tunnel: &TunnelClient) -> TunnelOutcome {
    if let Some(raw) = &config.public_url {
        return match PublicUrl::parse(raw) {
            Ok(url) => {
                info!(public_url = %url, "public_url_static");
                TunnelOutcome::Live(url)
            }
            Err(e) => {
                warn!(error = %e, "public_url_invalid");
                TunnelOutcome::Unavailable(e.to_string())
            }
        };
    }

    tunnel.attempt(config.port).await
}
