use crate::models::Image;
use datacrunch_core::client::{HttpClient, RequestSpec};
use datacrunch_core::Result;

/// OS images available for deployment.
#[derive(Debug, Clone, Copy)]
pub struct ImagesService<'a> {
    http: &'a HttpClient,
}

impl<'a> ImagesService<'a> {
    /// Wrap a dispatcher.
    #[must_use]
    pub const fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    /// List all images.
    pub async fn get(self) -> Result<Vec<Image>> {
        self.http.request(&RequestSpec::get("images")).await?.json()
    }
}
