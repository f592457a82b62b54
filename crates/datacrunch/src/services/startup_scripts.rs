use super::single;
use crate::models::{CreateStartupScriptRequest, StartupScript};
use datacrunch_core::client::{HttpClient, RequestSpec};
use datacrunch_core::ids::StartupScriptId;
use datacrunch_core::Result;
use serde_json::json;
use validator::Validate;

/// Startup scripts stored in the account.
#[derive(Debug, Clone, Copy)]
pub struct StartupScriptsService<'a> {
    http: &'a HttpClient,
}

impl<'a> StartupScriptsService<'a> {
    /// Wrap a dispatcher.
    #[must_use]
    pub const fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    /// List all scripts.
    pub async fn get(self) -> Result<Vec<StartupScript>> {
        self.http.request(&RequestSpec::get("scripts")).await?.json()
    }

    /// Fetch a single script.
    pub async fn get_by_id(self, id: StartupScriptId) -> Result<StartupScript> {
        let scripts = self
            .http
            .request(&RequestSpec::get(format!("scripts/{id}")))
            .await?
            .json()?;
        single(scripts, "startup script", id)
    }

    /// Store a script and return its id.
    pub async fn create(
        self,
        name: impl Into<String>,
        script: impl Into<String>,
    ) -> Result<StartupScriptId> {
        let body = CreateStartupScriptRequest {
            name: name.into(),
            script: script.into(),
        };
        body.validate()?;

        let spec = RequestSpec::post("scripts").with_json(&body)?;
        self.http.request(&spec).await?.text()?.parse()
    }

    /// Delete several scripts.
    pub async fn delete(self, ids: &[StartupScriptId]) -> Result<()> {
        let spec = RequestSpec::delete("scripts").with_json(&json!({ "scripts": ids }))?;
        self.http.request(&spec).await.map(|_| ())
    }

    /// Delete one script.
    pub async fn delete_by_id(self, id: StartupScriptId) -> Result<()> {
        self.http
            .request(&RequestSpec::delete(format!("scripts/{id}")))
            .await
            .map(|_| ())
    }
}
