use crate::models::InstanceType;
use datacrunch_core::client::{HttpClient, RequestSpec};
use datacrunch_core::Result;

/// Instance types and their prices.
#[derive(Debug, Clone, Copy)]
pub struct InstanceTypesService<'a> {
    http: &'a HttpClient,
}

impl<'a> InstanceTypesService<'a> {
    /// Wrap a dispatcher.
    #[must_use]
    pub const fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    /// List all instance types.
    pub async fn get(self) -> Result<Vec<InstanceType>> {
        self.http
            .request(&RequestSpec::get("instance-types"))
            .await?
            .json()
    }
}
