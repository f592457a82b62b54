use crate::models::Balance;
use datacrunch_core::client::{HttpClient, RequestSpec};
use datacrunch_core::Result;

/// Account balance.
#[derive(Debug, Clone, Copy)]
pub struct BalanceService<'a> {
    http: &'a HttpClient,
}

impl<'a> BalanceService<'a> {
    /// Wrap a dispatcher.
    #[must_use]
    pub const fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    /// Fetch the current balance.
    pub async fn get(self) -> Result<Balance> {
        self.http.request(&RequestSpec::get("balance")).await?.json()
    }
}
