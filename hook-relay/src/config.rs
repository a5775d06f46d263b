//! Configuration module for environment variable parsing.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Default tunnel agent API address (ngrok agent compatible).
pub const DEFAULT_TUNNEL_API_URL: &str = "http://127.0.0.1:4040";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Auth token for the tunnel provider; tunneling is disabled without it
    pub tunnel_auth_token: Option<String>,

    /// Base URL of the tunnel agent API
    pub tunnel_api_url: String,

    /// Upper bound on a single tunnel establishment attempt
    pub tunnel_timeout: Duration,

    /// Static public base URL, used instead of a tunnel when set
    pub public_url: Option<String>,

    /// Honor X-Forwarded-For / X-Forwarded-Proto from a fronting proxy
    pub trust_proxy: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            port: parse_number("PORT", 3001),

            tunnel_auth_token: non_empty("TUNNEL_AUTH_TOKEN")
                .or_else(|| non_empty("NGROK_AUTHTOKEN")),

            tunnel_api_url: non_empty("TUNNEL_API_URL")
                .unwrap_or_else(|| DEFAULT_TUNNEL_API_URL.to_string()),

            tunnel_timeout: Duration::from_millis(parse_number("TUNNEL_TIMEOUT_MS", 10_000)),

            public_url: non_empty("PUBLIC_URL"),

            trust_proxy: parse_bool("TRUST_PROXY", false),
        }
    }

    /// Address this process is always reachable at locally.
    pub fn local_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    /// Whether any form of public exposure is configured.
    pub fn exposure_configured(&self) -> bool {
        self.public_url.is_some() || self.tunnel_auth_token.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 3001,
            tunnel_auth_token: None,
            tunnel_api_url: DEFAULT_TUNNEL_API_URL.to_string(),
            tunnel_timeout: Duration::from_secs(10),
            public_url: None,
            trust_proxy: false,
        }
    }
}

/// Read a variable, treating blank values as unset.
fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a boolean flag like "true", "1", "yes" or "off".
fn parse_bool(name: &str, default: bool) -> bool {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" | "" => false,
        _ => {
            warn!(env_var = name, value = %raw, "Invalid boolean, using default");
            default
        }
    }
}

/// Parse a numeric variable, warning and falling back on bad input.
fn parse_number<T: FromStr>(name: &str, default: T) -> T {
    let Some(raw) = non_empty(name) else {
        return default;
    };

    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid number, using default");
            default
        }
    }
}
