//! Top-level client wiring the dispatcher to the resource services.

use crate::services::{
    BalanceService, ImagesService, InstanceTypesService, InstancesService, SshKeysService,
    StartupScriptsService,
};
use datacrunch_core::auth::{Clock, Credentials};
use datacrunch_core::client::{ClientConfig, HttpClient, HttpClientBuilder};
use datacrunch_core::config::DataCrunchConfig;
use datacrunch_core::constants::DEFAULT_BASE_URL;
use datacrunch_core::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// SDK version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Builder for [`DataCrunchClient`].
pub struct DataCrunchClientBuilder {
    credentials: Credentials,
    base_url: String,
    config: ClientConfig,
    clock: Option<Arc<dyn Clock>>,
}

impl DataCrunchClientBuilder {
    /// Create a builder for the public API.
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            base_url: DEFAULT_BASE_URL.to_string(),
            config: ClientConfig::default(),
            clock: None,
        }
    }

    /// Use another base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_timeout(timeout);
        self
    }

    /// Override the time source used for token expiry.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the transport cannot be
    /// configured.
    pub fn build(self) -> Result<DataCrunchClient> {
        let mut builder =
            HttpClientBuilder::new(&self.base_url, self.credentials)?.with_http_config(self.config);
        if let Some(clock) = self.clock {
            builder = builder.with_clock(clock);
        }

        let http = builder.build()?;
        debug!(base_url = %http.base_url(), "DataCrunch client ready");
        Ok(DataCrunchClient { http })
    }
}

/// Client for the DataCrunch public API.
///
/// Owns one authenticated dispatcher; the service accessors hand out cheap
/// views that borrow it, so every service shares the same cached token.
#[derive(Debug)]
pub struct DataCrunchClient {
    http: HttpClient,
}

impl DataCrunchClient {
    /// Create a client for the public API.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be configured.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Result<Self> {
        Self::builder(client_id, client_secret).build()
    }

    /// Start building a client.
    #[must_use]
    pub fn builder(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> DataCrunchClientBuilder {
        DataCrunchClientBuilder::new(Credentials::new(client_id, client_secret))
    }

    /// Create a client from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn from_config(config: &DataCrunchConfig) -> Result<Self> {
        DataCrunchClientBuilder::new(config.credentials())
            .with_base_url(config.base_url.clone())
            .with_http_config(config.http_config())
            .build()
    }

    /// Create a client from `DATACRUNCH_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment does not describe a valid configuration.
    pub fn from_env() -> Result<Self> {
        Self::from_config(&DataCrunchConfig::from_env()?)
    }

    /// Return the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        self.http.base_url()
    }

    /// SDK version.
    #[must_use]
    pub const fn version(&self) -> &'static str {
        VERSION
    }

    /// The underlying dispatcher, for endpoints without a service wrapper.
    #[must_use]
    pub const fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Balance service.
    #[must_use]
    pub const fn balance(&self) -> BalanceService<'_> {
        BalanceService::new(&self.http)
    }

    /// Images service.
    #[must_use]
    pub const fn images(&self) -> ImagesService<'_> {
        ImagesService::new(&self.http)
    }

    /// Instance types service.
    #[must_use]
    pub const fn instance_types(&self) -> InstanceTypesService<'_> {
        InstanceTypesService::new(&self.http)
    }

    /// Instances service.
    #[must_use]
    pub const fn instances(&self) -> InstancesService<'_> {
        InstancesService::new(&self.http)
    }

    /// SSH keys service.
    #[must_use]
    pub const fn ssh_keys(&self) -> SshKeysService<'_> {
        SshKeysService::new(&self.http)
    }

    /// Startup scripts service.
    #[must_use]
    pub const fn startup_scripts(&self) -> StartupScriptsService<'_> {
        StartupScriptsService::new(&self.http)
    }
}
