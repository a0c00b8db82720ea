//! HTTP client construction

use crate::config::{EngineConfig, UserAgentConfig};
use reqwest::Client;
use std::time::Duration;

/// Formats the user agent string: `Name/Version (+ContactURL)`
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    match &config.contact_url {
        Some(contact) => format!(
            "{}/{} (+{})",
            config.crawler_name, config.crawler_version, contact
        ),
        None => format!("{}/{}", config.crawler_name, config.crawler_version),
    }
}

/// Builds an HTTP client with proper configuration
///
/// The request timeout covers the whole exchange up to the response headers
/// and body; a request that exceeds it surfaces as a retryable timeout.
///
/// # Example
///
/// ```no_run
/// use gatherer::config::{EngineConfig, UserAgentConfig};
/// use gatherer::crawler::build_http_client;
///
/// let user_agent = UserAgentConfig {
///     crawler_name: "Gatherer".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: None,
/// };
///
/// let client = build_http_client(&EngineConfig::default(), &user_agent).unwrap();
/// ```
pub fn build_http_client(
    engine: &EngineConfig,
    user_agent: &UserAgentConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent_string(user_agent))
        .timeout(Duration::from_millis(engine.request_timeout_ms))
        .connect_timeout(Duration::from_millis(engine.connect_timeout_ms))
        .gzip(true)
        .brotli(true)
        .build()
}
