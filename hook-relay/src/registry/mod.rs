//! Endpoint registry.
//!
//! This module provides:
//! - Record types for endpoints and captured requests
//! - The shared, concurrency-safe store that owns them
//!
//! ## Flow
//!
//! ```text
//! create → Endpoint { requests: [] } → append* → get
//! ```

pub mod store;
pub mod types;

pub use store::{Registry, RegistryError};
pub use types::{endpoint_url, CapturedBody, CapturedRequest, Endpoint, QueryValue};
