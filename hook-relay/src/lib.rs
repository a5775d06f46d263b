//! Hook Relay - webhook capture relay.
//!
//! Provisions unique inbound endpoints, records every HTTP request sent to
//! them and serves the captured history back.
//!
//! ## Architecture
//!
//! ```text
//! Sender → /webhook/:id → Capture Gateway → Registry ← /api/webhooks/:id ← Client
//!                                               ↑
//!                          Tunnel → Exposure (public base URL)
//! ```

pub mod config;
pub mod registry;
pub mod tunnel;
pub mod util;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use registry::{CapturedBody, CapturedRequest, Endpoint, Registry, RegistryError};
pub use tunnel::{Exposure, TunnelClient, TunnelOutcome};
pub use web::{router, AppState};
