//! HTTP client construction.

use std::time::Duration;

use reqwest::Client;

/// User agent sent to the provider endpoints.
pub const USER_AGENT: &str = concat!("antigravity-rotator/", env!("CARGO_PKG_VERSION"));

/// Create HTTP client with the given request timeout.
pub fn create_client(timeout_secs: u64) -> Result<Client, String> {
    base_builder(timeout_secs).build().map_err(|e| format!("HTTP client builder failed: {e}"))
}

/// Shared builder with keepalive settings.
fn base_builder(timeout_secs: u64) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .tcp_nodelay(true)
        .user_agent(USER_AGENT)
        .http2_keep_alive_interval(Duration::from_secs(25))
        .http2_keep_alive_timeout(Duration::from_secs(10))
        .http2_keep_alive_while_idle(true)
}

/// Trim a response body for logs and error messages.
pub fn truncate_body(body: &str, max: usize) -> String {
    if body.chars().count() <= max {
        return body.to_string();
    }
    let head: String = body.chars().take(max).collect();
    format!("{head}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("short", 10), "short");
        assert_eq!(truncate_body("abcdefgh", 3), "abc…");
    }
}
