use crate::config::types::{Config, CookieEntry, EngineConfig, SeedEntry, UserAgentConfig};
use crate::ConfigError;
use std::collections::HashMap;
use url::Url;

/// Upper bound on attempts per request
pub const MAX_ATTEMPTS_LIMIT: u32 = 100;

/// Upper bound on concurrent workers
pub const MAX_WORKERS: usize = 1000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_engine_config(&config.engine)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_status_codes(&config.status_codes)?;
    validate_cookies(&config.cookies)?;
    validate_seeds(&config.seeds)?;

    if config.extract.selector.trim().is_empty() {
        return Err(ConfigError::Validation(
            "extract selector cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates engine configuration
fn validate_engine_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    if config.max_attempts < 1 || config.max_attempts > MAX_ATTEMPTS_LIMIT {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be between 1 and {}, got {}",
            MAX_ATTEMPTS_LIMIT, config.max_attempts
        )));
    }

    if config.request_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-ms must be greater than 0".to_string(),
        ));
    }

    if config.connect_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "connect-timeout-ms must be greater than 0".to_string(),
        ));
    }

    if config.connect_timeout_ms > config.request_timeout_ms {
        return Err(ConfigError::Validation(format!(
            "connect-timeout-ms ({}) cannot exceed request-timeout-ms ({})",
            config.connect_timeout_ms, config.request_timeout_ms
        )));
    }

    if config.idle_backoff_ms == 0 {
        return Err(ConfigError::Validation(
            "idle-backoff-ms must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if config.crawler_version.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-version cannot be empty".to_string(),
        ));
    }

    if let Some(contact_url) = &config.contact_url {
        Url::parse(contact_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;
    }

    Ok(())
}

/// Validates status-code keys: numeric and within the HTTP range
fn validate_status_codes<V>(codes: &HashMap<String, V>) -> Result<(), ConfigError> {
    for key in codes.keys() {
        parse_status_key(key)?;
    }
    Ok(())
}

/// Parses a `[status-codes]` key into an HTTP status code
pub(crate) fn parse_status_key(key: &str) -> Result<u16, ConfigError> {
    let code: u16 = key.trim().parse().map_err(|_| {
        ConfigError::Validation(format!("status code '{}' is not a number", key))
    })?;

    if !(100..=599).contains(&code) {
        return Err(ConfigError::Validation(format!(
            "status code {} is outside 100..=599",
            code
        )));
    }

    Ok(code)
}

/// Validates cookie entries
fn validate_cookies(cookies: &[CookieEntry]) -> Result<(), ConfigError> {
    for cookie in cookies {
        if cookie.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "cookie name cannot be empty".to_string(),
            ));
        }

        if cookie.name.contains(['=', ';']) || cookie.value.contains(';') {
            return Err(ConfigError::Validation(format!(
                "cookie '{}' contains a reserved character",
                cookie.name
            )));
        }
    }
    Ok(())
}

/// Validates seed entries
fn validate_seeds(seeds: &[SeedEntry]) -> Result<(), ConfigError> {
    for seed in seeds {
        let url = Url::parse(&seed.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed.url, e))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use http or https",
                seed.url
            )));
        }
    }
    Ok(())
}
