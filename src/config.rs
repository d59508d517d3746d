use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Session cookie sent on every request to Threads.
    pub cookie: String,
    /// User-Agent header value.
    pub user_agent: String,
    /// GraphQL endpoint serving reply pages.
    pub graphql_url: String,

    // Page retry policy
    pub max_page_retries: u32,
    pub retry_backoff: Duration,

    // HTTP client
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            cookie: required_env("COOKIE")?,
            user_agent: env_or_default("THREADS_USER_AGENT", "threads-client"),
            graphql_url: env_or_default(
                "THREADS_GRAPHQL_URL",
                "https://www.threads.net/api/graphql",
            ),
            max_page_retries: parse_env_u32("MAX_PAGE_RETRIES", 3)?,
            retry_backoff: Duration::from_millis(parse_env_u64("RETRY_BACKOFF_MS", 2000)?),
            http_timeout: Duration::from_secs(parse_env_u64("HTTP_TIMEOUT_SECS", 30)?),
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cookie.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "COOKIE".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if self.http_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "HTTP_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if url::Url::parse(&self.graphql_url).is_err() {
            return Err(ConfigError::InvalidValue {
                name: "THREADS_GRAPHQL_URL".to_string(),
                message: format!("not a valid URL: '{}'", self.graphql_url),
            });
        }
        Ok(())
    }

    /// Configuration with harmless defaults for tests.
    ///
    /// Tests override the fields they care about with struct update syntax.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            cookie: "sessionid=test".to_string(),
            user_agent: "threads-client".to_string(),
            graphql_url: "http://127.0.0.1:0/api/graphql".to_string(),
            max_page_retries: 2,
            retry_backoff: Duration::from_millis(10),
            http_timeout: Duration::from_secs(5),
        }
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty_cookie() {
        let config = Config {
            cookie: String::new(),
            ..Config::for_testing()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = Config {
            graphql_url: "not a url".to_string(),
            ..Config::for_testing()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_for_testing_is_valid() {
        assert!(Config::for_testing().validate().is_ok());
    }

    #[test]
    fn test_parse_env_u32_default() {
        assert_eq!(parse_env_u32("NONEXISTENT_VAR", 7).unwrap(), 7);
    }
}
