//! OAuth2 client-credentials authentication.
//!
//! [`TokenManager`] owns the single cached [`AccessToken`] of a client. It
//! acquires a token lazily on first use, hands out the cached token while it
//! is valid and renews it once it expires or once the dispatcher reports that
//! the API rejected it. Renewal is single-flight: callers that find no valid
//! token queue on one async mutex, and whoever gets it second finds the token
//! the first one stored. A failed attempt is shared the same way: callers
//! that queued behind it receive its error instead of starting another.

use crate::error::{map_status, ApiError, Error, ErrorKind, Result};
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

/// Client id and secret issued by DataCrunch.
#[derive(Debug)]
pub struct Credentials {
    client_id: String,
    client_secret: SecretString,
}

impl Credentials {
    /// Create a credential pair.
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
        }
    }

    /// Create a credential pair from an already wrapped secret.
    #[must_use]
    pub fn from_secret(client_id: impl Into<String>, client_secret: SecretString) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
        }
    }

    /// The client id.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

/// Bearer token returned by the token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
    refresh_token: Option<String>,
    token_type: String,
    scope: Option<String>,
}

impl AccessToken {
    /// Create a token that expires at `expires_at`.
    #[must_use]
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
            refresh_token: None,
            token_type: "Bearer".to_string(),
            scope: None,
        }
    }

    /// The opaque token value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Instant after which the token must not be used.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Refresh token issued alongside the access token.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Token type reported by the provider.
    #[must_use]
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Granted scope.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// A token is expired at or after its expiry instant.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Time source used for token expiry.
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Serialize)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
enum Grant<'a> {
    ClientCredentials {
        client_id: &'a str,
        client_secret: &'a str,
    },
    RefreshToken {
        refresh_token: &'a str,
    },
}

impl Grant<'_> {
    const fn name(&self) -> &'static str {
        match self {
            Self::ClientCredentials { .. } => "client_credentials",
            Self::RefreshToken { .. } => "refresh_token",
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Default)]
struct TokenState {
    current: Option<AccessToken>,
    // Outlives `current`: an invalidated access token can still be renewed with it.
    refresh_token: Option<String>,
    // Completed renewal attempts, and the error of the last one if it failed.
    attempts: u64,
    last_failure: Option<Error>,
}

/// Owner of the cached access token.
pub struct TokenManager {
    credentials: Credentials,
    http: reqwest::Client,
    token_url: Url,
    clock: Arc<dyn Clock>,
    state: RwLock<TokenState>,
    renewal: Mutex<()>,
}

impl TokenManager {
    /// Create a manager that exchanges `credentials` at `token_url`.
    #[must_use]
    pub fn new(credentials: Credentials, http: reqwest::Client, token_url: Url) -> Self {
        Self {
            credentials,
            http,
            token_url,
            clock: Arc::new(SystemClock),
            state: RwLock::new(TokenState::default()),
            renewal: Mutex::new(()),
        }
    }

    /// Replace the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The token endpoint.
    #[must_use]
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// The client id this manager authenticates as.
    #[must_use]
    pub fn client_id(&self) -> &str {
        self.credentials.client_id()
    }

    /// Return a token that is valid now, acquiring or renewing it if needed.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Authentication`] error if the exchange fails.
    pub async fn valid_token(&self) -> Result<AccessToken> {
        if let Some(token) = self.cached() {
            return Ok(token);
        }

        let seen = self.read_state().attempts;
        let _renewal = self.renewal.lock().await;

        // Whoever held the lock before us may already have stored a new token.
        if let Some(token) = self.cached() {
            return Ok(token);
        }

        let refresh_token = {
            let state = self.read_state();
            // An attempt finished while we queued for it; its failure is ours too.
            if state.attempts != seen {
                if let Some(err) = &state.last_failure {
                    return Err(err.clone());
                }
            }
            state.refresh_token.clone()
        };

        let result = self.renew(refresh_token.as_deref()).await;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.attempts = state.attempts.wrapping_add(1);
        match result {
            Ok(token) => {
                state.refresh_token = token.refresh_token.clone();
                state.current = Some(token.clone());
                state.last_failure = None;
                Ok(token)
            }
            Err(err) => {
                state.last_failure = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Discard `rejected` so the next [`valid_token`](Self::valid_token) renews.
    ///
    /// Does nothing if the cache already holds a different token, so several
    /// requests rejecting the same token trigger one renewal.
    pub fn invalidate(&self, rejected: &AccessToken) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state
            .current
            .as_ref()
            .is_some_and(|current| current.value == rejected.value)
        {
            debug!(client_id = %self.client_id(), "invalidating cached access token");
            state.current = None;
        }
    }

    /// The cached token, even if expired.
    #[must_use]
    pub fn current(&self) -> Option<AccessToken> {
        self.read_state().current.clone()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, TokenState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn cached(&self) -> Option<AccessToken> {
        let now = self.clock.now();
        self.read_state()
            .current
            .as_ref()
            .filter(|token| !token.is_expired_at(now))
            .cloned()
    }

    async fn renew(&self, refresh_token: Option<&str>) -> Result<AccessToken> {
        if let Some(refresh_token) = refresh_token {
            match self.exchange(&Grant::RefreshToken { refresh_token }).await {
                Ok(token) => return Ok(token),
                Err(err) => {
                    warn!(error = %err, "refresh token grant failed, falling back to client credentials");
                }
            }
        }

        self.exchange(&Grant::ClientCredentials {
            client_id: self.credentials.client_id(),
            client_secret: self.credentials.client_secret.expose_secret(),
        })
        .await
    }

    async fn exchange(&self, grant: &Grant<'_>) -> Result<AccessToken> {
        debug!(grant = grant.name(), url = %self.token_url, "requesting access token");

        let response = self
            .http
            .post(self.token_url.clone())
            .header(ACCEPT, "application/json")
            .json(grant)
            .send()
            .await
            .map_err(|err| auth_error(None, format!("token request failed: {err}"), ""))?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            auth_error(
                Some(status.as_u16()),
                format!("failed to read token response: {err}"),
                "",
            )
        })?;

        if !status.is_success() {
            let mapped = map_status(status, body);
            return Err(Error::Api(ApiError {
                kind: ErrorKind::Authentication,
                message: format!("token request rejected: {}", mapped.message),
                ..mapped
            }));
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|err| {
            auth_error(
                Some(status.as_u16()),
                format!("malformed token response: {err}"),
                &body,
            )
        })?;

        let ttl = i64::try_from(parsed.expires_in)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| {
                auth_error(
                    Some(status.as_u16()),
                    format!("token lifetime out of range: {}", parsed.expires_in),
                    &body,
                )
            })?;

        let expires_at = self.clock.now().checked_add_signed(ttl).ok_or_else(|| {
            auth_error(
                Some(status.as_u16()),
                "failed to calculate token expiry",
                &body,
            )
        })?;

        debug!(grant = grant.name(), %expires_at, "access token acquired");

        Ok(AccessToken {
            value: parsed.access_token,
            expires_at,
            refresh_token: parsed.refresh_token,
            token_type: parsed.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: parsed.scope,
        })
    }
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("client_id", &self.credentials.client_id)
            .field("token_url", &self.token_url.as_str())
            .finish_non_exhaustive()
    }
}

fn auth_error(status: Option<u16>, message: impl Into<String>, body: &str) -> Error {
    Error::Api(ApiError::authentication(status, message).with_body(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::task::JoinSet;
    use wiremock::matchers::{body_json, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn numbered_tokens(
        expires_in: u64,
    ) -> impl Fn(&Request) -> ResponseTemplate + Send + Sync + 'static {
        let issued = AtomicUsize::new(0);
        move |_: &Request| {
            let n = issued.fetch_add(1, Ordering::SeqCst) + 1;
            ResponseTemplate::new(200).set_body_json(json!({
                "access_token": format!("token-{n}"),
                "refresh_token": format!("refresh-{n}"),
                "scope": "fullAccess",
                "token_type": "Bearer",
                "expires_in": expires_in
            }))
        }
    }

    fn manager(server: &MockServer) -> TokenManager {
        let url = Url::parse(&format!("{}/oauth2/token", server.uri())).unwrap();
        TokenManager::new(
            Credentials::new("client-id", "client-secret"),
            reqwest::Client::new(),
            url,
        )
    }

    #[tokio::test]
    async fn first_call_exchanges_client_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_json(json!({
                "grant_type": "client_credentials",
                "client_id": "client-id",
                "client_secret": "client-secret"
            })))
            .respond_with(numbered_tokens(3600))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = manager(&server);
        let token = tokens.valid_token().await.unwrap();

        assert_eq!(token.value(), "token-1");
        assert_eq!(token.refresh_token(), Some("refresh-1"));
        assert_eq!(token.scope(), Some("fullAccess"));
        assert!(token.expires_at() > Utc::now());
    }

    #[tokio::test]
    async fn cached_token_is_reused_within_lifetime() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(numbered_tokens(3600))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = manager(&server);
        for _ in 0..5 {
            assert_eq!(tokens.valid_token().await.unwrap().value(), "token-1");
        }
    }

    #[tokio::test]
    async fn invalidate_renews_with_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_partial_json(json!({"grant_type": "client_credentials"})))
            .respond_with(numbered_tokens(3600))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_json(json!({
                "grant_type": "refresh_token",
                "refresh_token": "refresh-1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "renewed",
                "refresh_token": "refresh-2",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = manager(&server);
        let first = tokens.valid_token().await.unwrap();
        tokens.invalidate(&first);

        let second = tokens.valid_token().await.unwrap();
        assert_eq!(second.value(), "renewed");
        assert_eq!(tokens.valid_token().await.unwrap(), second);
    }

    #[tokio::test]
    async fn failed_refresh_grant_falls_back_to_client_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_partial_json(json!({"grant_type": "refresh_token"})))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "code": "unauthorized_request",
                "message": "refresh token expired"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_partial_json(json!({"grant_type": "client_credentials"})))
            .respond_with(numbered_tokens(3600))
            .expect(2)
            .mount(&server)
            .await;

        let tokens = manager(&server);
        let first = tokens.valid_token().await.unwrap();
        tokens.invalidate(&first);

        assert_eq!(tokens.valid_token().await.unwrap().value(), "token-2");
    }

    #[tokio::test]
    async fn invalidating_a_stale_token_keeps_the_current_one() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(numbered_tokens(3600))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = manager(&server);
        let current = tokens.valid_token().await.unwrap();
        let stale = AccessToken::new("token-0", Utc::now());

        tokens.invalidate(&stale);
        assert_eq!(tokens.valid_token().await.unwrap(), current);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "shared", "expires_in": 3600}))
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let tokens = Arc::new(manager(&server));
        let mut tasks = JoinSet::new();
        for _ in 0..8 {
            let tokens = Arc::clone(&tokens);
            tasks.spawn(async move { tokens.valid_token().await });
        }

        while let Some(result) = tasks.join_next().await {
            assert_eq!(result.unwrap().unwrap().value(), "shared");
        }
    }

    #[tokio::test]
    async fn concurrent_callers_after_invalidation_share_one_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(numbered_tokens(3600))
            .expect(2)
            .mount(&server)
            .await;

        let tokens = Arc::new(manager(&server));
        let first = tokens.valid_token().await.unwrap();

        let mut tasks = JoinSet::new();
        for _ in 0..8 {
            let tokens = Arc::clone(&tokens);
            let first = first.clone();
            tasks.spawn(async move {
                tokens.invalidate(&first);
                tokens.valid_token().await
            });
        }

        while let Some(result) = tasks.join_next().await {
            assert_eq!(result.unwrap().unwrap().value(), "token-2");
        }
    }

    #[tokio::test]
    async fn expired_token_is_renewed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(numbered_tokens(3600))
            .expect(2)
            .mount(&server)
            .await;

        let start = Utc::now();
        let now = Arc::new(std::sync::Mutex::new(start));
        let mut clock = MockClock::new();
        let shared = Arc::clone(&now);
        clock
            .expect_now()
            .returning(move || *shared.lock().unwrap());

        let tokens = manager(&server).with_clock(Arc::new(clock));
        let first = tokens.valid_token().await.unwrap();
        assert_eq!(first.expires_at(), start + TimeDelta::seconds(3600));

        *now.lock().unwrap() = start + TimeDelta::seconds(3599);
        assert_eq!(tokens.valid_token().await.unwrap(), first);

        // Expiry is inclusive.
        *now.lock().unwrap() = start + TimeDelta::seconds(3600);
        assert_eq!(tokens.valid_token().await.unwrap().value(), "token-2");
    }

    #[tokio::test]
    async fn rejected_exchange_is_an_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": "invalid_request",
                "message": "bad client secret"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = manager(&server).valid_token().await.unwrap_err();
        let api = err.api_error().unwrap();
        assert_eq!(api.kind, ErrorKind::Authentication);
        assert_eq!(api.status, Some(400));
        assert_eq!(api.code.as_deref(), Some("invalid_request"));
        assert!(api.message.contains("bad client secret"));
    }

    #[tokio::test]
    async fn malformed_token_response_is_an_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "x"})))
            .mount(&server)
            .await;

        let err = manager(&server).valid_token().await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Authentication));
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_failed_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(
                ResponseTemplate::new(503)
                    .set_body_string("maintenance")
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let tokens = Arc::new(manager(&server));
        let mut tasks = JoinSet::new();
        for _ in 0..8 {
            let tokens = Arc::clone(&tokens);
            tasks.spawn(async move { tokens.valid_token().await });
        }

        while let Some(result) = tasks.join_next().await {
            let err = result.unwrap().unwrap_err();
            let api = err.api_error().unwrap();
            assert_eq!(api.kind, ErrorKind::Authentication);
            assert_eq!(api.status, Some(503));
        }
    }

    #[tokio::test]
    async fn call_after_a_failed_exchange_tries_again() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(numbered_tokens(3600))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = manager(&server);
        assert!(tokens.valid_token().await.is_err());
        assert_eq!(tokens.valid_token().await.unwrap().value(), "token-1");
    }

    /// A URL on a local port nothing listens on.
    fn closed_port_url(path: &str) -> Url {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        Url::parse(&format!("http://127.0.0.1:{port}{path}")).unwrap()
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_authentication_error() {
        let tokens = TokenManager::new(
            Credentials::new("client-id", "client-secret"),
            reqwest::Client::new(),
            closed_port_url("/oauth2/token"),
        );

        let err = tokens.valid_token().await.unwrap_err();
        let api = err.api_error().unwrap();
        assert_eq!(api.kind, ErrorKind::Authentication);
        assert_eq!(api.status, None);
    }

    #[test]
    fn token_debug_redacts_value() {
        let token = AccessToken::new("super-secret", Utc::now());
        let debug = format!("{token:?}");
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn credentials_debug_redacts_secret() {
        let credentials = Credentials::new("id", "hunter2");
        assert!(!format!("{credentials:?}").contains("hunter2"));
    }
}
