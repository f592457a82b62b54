//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeDelta, Utc};
use datacrunch::DataCrunchClient;
use datacrunch_core::auth::Clock;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const TOKEN_PATH: &str = "/v1/oauth2/token";

/// Token endpoint handing out `token-1`, `token-2`, ... valid for `expires_in` seconds.
pub fn numbered_tokens(
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

pub async fn mount_token_endpoint(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(numbered_tokens(3600))
        .expect(expected)
        .mount(server)
        .await;
}

pub fn client(server: &MockServer) -> DataCrunchClient {
    DataCrunchClient::builder("client-id", "client-secret")
        .with_base_url(format!("{}/v1", server.uri()))
        .build()
        .unwrap()
}

pub fn client_with_clock(server: &MockServer, clock: Arc<ManualClock>) -> DataCrunchClient {
    DataCrunchClient::builder("client-id", "client-secret")
        .with_base_url(format!("{}/v1", server.uri()))
        .with_clock(clock)
        .build()
        .unwrap()
}

pub async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Utc::now()),
        })
    }

    pub fn advance(&self, seconds: i64) {
        let mut now = self.now.lock().unwrap();
        *now += TimeDelta::seconds(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
