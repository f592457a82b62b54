//! Authenticated request dispatch.
//!
//! [`HttpClient`] is the only way resource services talk to the API. It
//! resolves request paths against the base URL, attaches a bearer token from
//! the [`TokenManager`], retries exactly once when the API rejects the token
//! and turns every failure into a typed [`Error`].

use crate::auth::{AccessToken, Clock, Credentials, TokenManager};
use crate::constants::{DEFAULT_BASE_URL, TOKEN_ENDPOINT_PATH};
use crate::error::{map_status, Error, Result};
use bytes::Bytes;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default idle timeout for connection pools
pub const DEFAULT_POOL_IDLE_TIMEOUT: u64 = 90;

/// Default maximum idle connections per host
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("datacrunch-rust/", env!("CARGO_PKG_VERSION"));

const JSON: &str = "application/json";

/// HTTP client configuration.
///
/// Configures transport behavior: timeouts, connection pooling and
/// compression. The timeout applies to every call, the token exchange
/// included, and surfaces as a transport error.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout
    pub timeout: Duration,

    /// Connection pool idle timeout
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Enable response compression
    pub enable_compression: bool,

    /// User agent header value
    pub user_agent: String,
}

impl ClientConfig {
    /// Create a new client configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            pool_idle_timeout: Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT),
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            enable_compression: true,
            user_agent: USER_AGENT.to_string(),
        }
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set connection pool idle timeout.
    #[must_use]
    pub const fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Set maximum idle connections per host.
    #[must_use]
    pub const fn with_pool_max_idle(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Enable or disable compression.
    #[must_use]
    pub const fn with_compression(mut self, enabled: bool) -> Self {
        self.enable_compression = enabled;
        self
    }

    /// Override the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    fn build_transport(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .pool_idle_timeout(self.pool_idle_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .gzip(self.enable_compression)
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|err| Error::ConfigError(format!("failed to build HTTP client: {err}")))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A single API call, relative to the base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    /// HTTP method
    pub method: Method,
    /// Path relative to the base URL, without a leading slash
    pub path: String,
    /// Caller-supplied segments appended after `path`, percent-encoded
    pub segments: Vec<String>,
    /// Query pairs, encoded in order
    pub query: Vec<(&'static str, String)>,
    /// JSON body
    pub body: Option<Value>,
}

impl RequestSpec {
    /// Create a request with no query and no body.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            segments: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }

    /// A `GET` request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// A `POST` request.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// A `PUT` request.
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// A `DELETE` request.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append one path segment taken verbatim from caller input.
    ///
    /// `/`, `?` and `#` are percent-encoded and `.` or `..` segments are
    /// dropped, so the value cannot move the request to another path.
    #[must_use]
    pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// Set the query pairs.
    #[must_use]
    pub fn with_query(mut self, query: Vec<(&'static str, String)>) -> Self {
        self.query = query;
        self
    }

    /// Serialize `body` as the JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if `body` cannot be represented as JSON.
    pub fn with_json<B>(mut self, body: &B) -> Result<Self>
    where
        B: Serialize + ?Sized,
    {
        let value = serde_json::to_value(body)
            .map_err(|err| Error::InvalidRequest(format!("failed to serialize body: {err}")))?;
        self.body = Some(value);
        Ok(self)
    }
}

/// A successful response, returned as received.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl ApiResponse {
    /// Response status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw body.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decode the body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DecodeError`] if the body is not valid UTF-8.
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|err| Error::DecodeError(format!("response is not UTF-8: {err}")))
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DecodeError`] if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(Error::from)
    }
}

/// Builder for [`HttpClient`].
pub struct HttpClientBuilder {
    base_url: Url,
    credentials: Credentials,
    config: ClientConfig,
    clock: Option<Arc<dyn Clock>>,
}

impl HttpClientBuilder {
    /// Create a builder for the specified base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if `base_url` is not an absolute
    /// http(s) URL.
    pub fn new(base_url: impl AsRef<str>, credentials: Credentials) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url.as_ref())?,
            credentials,
            config: ClientConfig::default(),
            clock: None,
        })
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
    /// Returns an error if the transport cannot be configured.
    pub fn build(self) -> Result<HttpClient> {
        let http = self.config.build_transport()?;
        let token_url = join_url(&self.base_url, TOKEN_ENDPOINT_PATH)?;

        let mut tokens = TokenManager::new(self.credentials, http.clone(), token_url);
        if let Some(clock) = self.clock {
            tokens = tokens.with_clock(clock);
        }

        Ok(HttpClient {
            base_url: self.base_url,
            http,
            tokens,
        })
    }
}

/// Authenticated dispatcher shared by all resource services.
pub struct HttpClient {
    base_url: Url,
    http: reqwest::Client,
    tokens: TokenManager,
}

impl HttpClient {
    /// Create a client for `base_url` with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn new(base_url: impl AsRef<str>, credentials: Credentials) -> Result<Self> {
        HttpClientBuilder::new(base_url, credentials)?.build()
    }

    /// Create a client for the public API.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be configured.
    pub fn with_default_url(credentials: Credentials) -> Result<Self> {
        Self::new(DEFAULT_BASE_URL, credentials)
    }

    /// Start building a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn builder(base_url: impl AsRef<str>, credentials: Credentials) -> Result<HttpClientBuilder> {
        HttpClientBuilder::new(base_url, credentials)
    }

    /// Return the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The token manager backing this client.
    #[must_use]
    pub fn token_manager(&self) -> &TokenManager {
        &self.tokens
    }

    /// Resolve the full URL a request will be sent to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if the path does not form a valid URL.
    pub fn endpoint_url(&self, spec: &RequestSpec) -> Result<Url> {
        let mut url = join_url(&self.base_url, &spec.path)?;
        if !spec.segments.is_empty() {
            url.path_segments_mut()
                .map_err(|()| {
                    Error::InvalidEndpoint(format!("cannot append segments to {}", self.base_url))
                })?
                .pop_if_empty()
                .extend(&spec.segments);
        }
        if !spec.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(spec.query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    /// Dispatch `spec` with a bearer token.
    ///
    /// A `401` answer invalidates the token and the request is sent once more
    /// with a fresh one; a second `401` is terminal. Any other failure is
    /// returned immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] for authentication, HTTP and transport failures.
    pub async fn request(&self, spec: &RequestSpec) -> Result<ApiResponse> {
        let url = self.endpoint_url(spec)?;
        let body = spec
            .body
            .as_ref()
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|err| Error::InvalidRequest(format!("failed to serialize body: {err}")))?;

        let token = self.tokens.valid_token().await?;
        let response = self.send(spec, &url, body.as_deref(), &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::finish(response).await;
        }

        warn!(
            method = %spec.method,
            path = %spec.path,
            "access token rejected, renewing and retrying once"
        );
        self.tokens.invalidate(&token);

        let token = self.tokens.valid_token().await?;
        let response = self.send(spec, &url, body.as_deref(), &token).await?;
        Self::finish(response).await
    }

    async fn send(
        &self,
        spec: &RequestSpec,
        url: &Url,
        body: Option<&[u8]>,
        token: &AccessToken,
    ) -> Result<reqwest::Response> {
        debug!(method = %spec.method, %url, "dispatching request");

        let mut request = self
            .http
            .request(spec.method.clone(), url.clone())
            .bearer_auth(token.value())
            .header(ACCEPT, JSON)
            .header(CONTENT_TYPE, JSON);
        if let Some(body) = body {
            request = request.body(body.to_vec());
        }

        request.send().await.map_err(Error::from)
    }

    async fn finish(response: reqwest::Response) -> Result<ApiResponse> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        if status.is_success() {
            return Ok(ApiResponse {
                status,
                headers,
                body,
            });
        }

        let error = map_status(status, String::from_utf8_lossy(&body).into_owned());
        debug!(status = status.as_u16(), kind = %error.kind, "request failed");
        Err(error.into())
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url.as_str())
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim_end_matches('/'))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(Error::InvalidEndpoint(format!(
            "base URL must be an absolute http(s) URL: {raw}"
        )));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(Error::InvalidEndpoint(format!(
            "base URL must not carry a query or fragment: {raw}"
        )));
    }
    Ok(url)
}

fn join_url(base: &Url, path: &str) -> Result<Url> {
    let base = base.as_str().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    Url::parse(&format!("{base}/{path}")).map_err(Error::from)
}
