//! Built-in tools backed by public HTTP APIs.

pub mod sejm_stats;
pub mod wikipedia;

use std::time::Duration;

/// HTTP client shared by a tool for its lifetime.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("agentstream/", env!("CARGO_PKG_VERSION")))
        .build()
}
