//! Configuration for DataCrunch clients.
//!
//! [`DataCrunchConfig`] can be deserialized from any serde source or read
//! from the environment, and is validated before use.

use crate::auth::Credentials;
use crate::client::ClientConfig;
use crate::constants::DEFAULT_BASE_URL;
use crate::Error;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Environment variable holding the client id
pub const ENV_CLIENT_ID: &str = "DATACRUNCH_CLIENT_ID";
/// Environment variable holding the client secret
pub const ENV_CLIENT_SECRET: &str = "DATACRUNCH_CLIENT_SECRET";
/// Environment variable overriding the base URL
pub const ENV_BASE_URL: &str = "DATACRUNCH_BASE_URL";
/// Environment variable overriding the request timeout in seconds
pub const ENV_TIMEOUT_SECS: &str = "DATACRUNCH_TIMEOUT_SECS";

/// Configuration for a DataCrunch client instance.
#[derive(Debug, Deserialize, Validate)]
pub struct DataCrunchConfig {
    /// OAuth2 client id
    #[validate(length(min = 1))]
    pub client_id: String,

    /// OAuth2 client secret
    pub client_secret: SecretString,

    /// API base URL
    #[validate(url)]
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

const fn default_request_timeout_secs() -> u64 {
    30
}

impl DataCrunchConfig {
    /// Create a configuration for the public API.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, Error> {
        let config = Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        };

        config
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;

        Ok(config)
    }

    /// Read the configuration from `DATACRUNCH_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| Error::ConfigError(format!("{key} is not set")))
        };

        let mut config = Self::new(required(ENV_CLIENT_ID)?, required(ENV_CLIENT_SECRET)?)?;

        if let Some(base_url) = lookup(ENV_BASE_URL) {
            config = config.with_base_url(base_url);
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let seconds = raw.trim().parse().map_err(|e| {
                Error::ConfigError(format!("{ENV_TIMEOUT_SECS} is not a number: {e}"))
            })?;
            config = config.with_timeout(seconds);
        }

        config
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;

        Ok(config)
    }

    /// Set the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Parse and validate the base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn parse_base_url(&self) -> Result<Url, Error> {
        Url::parse(&self.base_url)
            .map_err(|e| Error::ConfigError(format!("Invalid base URL: {e}")))
    }

    /// Credentials described by this configuration.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials::from_secret(
            self.client_id.clone(),
            SecretString::from(self.client_secret.expose_secret().to_owned()),
        )
    }

    /// Transport settings described by this configuration.
    #[must_use]
    pub fn http_config(&self) -> ClientConfig {
        ClientConfig::new().with_timeout(self.timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_config_new() {
        let config = DataCrunchConfig::new("id", "secret").unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.client_secret.expose_secret(), "secret");
    }

    #[test]
    fn test_config_rejects_empty_client_id() {
        assert!(matches!(
            DataCrunchConfig::new("", "secret"),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_config_debug_hides_secret() {
        let config = DataCrunchConfig::new("id", "hunter2").unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn test_from_lookup() {
        let config = DataCrunchConfig::from_lookup(lookup(&[
            (ENV_CLIENT_ID, "id"),
            (ENV_CLIENT_SECRET, "secret"),
            (ENV_BASE_URL, "https://staging.example.com/v1"),
            (ENV_TIMEOUT_SECS, "45"),
        ]))
        .unwrap();

        assert_eq!(config.client_id, "id");
        assert_eq!(config.base_url, "https://staging.example.com/v1");
        assert_eq!(config.request_timeout_secs, 45);
        assert_eq!(config.credentials().client_id(), "id");
        assert_eq!(config.http_config().timeout, Duration::from_secs(45));
    }

    #[test]
    fn test_from_lookup_missing_secret() {
        let err = DataCrunchConfig::from_lookup(lookup(&[(ENV_CLIENT_ID, "id")])).unwrap_err();
        assert!(matches!(err, Error::ConfigError(msg) if msg.contains(ENV_CLIENT_SECRET)));
    }

    #[test]
    fn test_from_lookup_timeout_out_of_range() {
        let err = DataCrunchConfig::from_lookup(lookup(&[
            (ENV_CLIENT_ID, "id"),
            (ENV_CLIENT_SECRET, "secret"),
            (ENV_TIMEOUT_SECS, "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_from_lookup_bad_url() {
        let err = DataCrunchConfig::from_lookup(lookup(&[
            (ENV_CLIENT_ID, "id"),
            (ENV_CLIENT_SECRET, "secret"),
            (ENV_BASE_URL, "not a url"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_config_deserialization_defaults() {
        let json = r#"{"client_id": "id", "client_secret": "secret"}"#;
        let config: DataCrunchConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.parse_base_url().unwrap().path(), "/v1");
    }
}
