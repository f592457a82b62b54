use super::single;
use crate::models::{CreateSshKeyRequest, SshKey};
use datacrunch_core::client::{HttpClient, RequestSpec};
use datacrunch_core::ids::SshKeyId;
use datacrunch_core::Result;
use serde_json::json;
use validator::Validate;

/// SSH keys stored in the account.
#[derive(Debug, Clone, Copy)]
pub struct SshKeysService<'a> {
    http: &'a HttpClient,
}

impl<'a> SshKeysService<'a> {
    /// Wrap a dispatcher.
    #[must_use]
    pub const fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    /// List all keys.
    pub async fn get(self) -> Result<Vec<SshKey>> {
        self.http.request(&RequestSpec::get("sshkeys")).await?.json()
    }

    /// Fetch a single key.
    pub async fn get_by_id(self, id: SshKeyId) -> Result<SshKey> {
        let keys = self
            .http
            .request(&RequestSpec::get(format!("sshkeys/{id}")))
            .await?
            .json()?;
        single(keys, "ssh key", id)
    }

    /// Upload a public key and return its id.
    pub async fn create(self, name: impl Into<String>, key: impl Into<String>) -> Result<SshKeyId> {
        let body = CreateSshKeyRequest {
            name: name.into(),
            key: key.into(),
        };
        body.validate()?;

        let spec = RequestSpec::post("sshkeys").with_json(&body)?;
        self.http.request(&spec).await?.text()?.parse()
    }

    /// Delete several keys.
    pub async fn delete(self, ids: &[SshKeyId]) -> Result<()> {
        let spec = RequestSpec::delete("sshkeys").with_json(&json!({ "keys": ids }))?;
        self.http.request(&spec).await.map(|_| ())
    }

    /// Delete one key.
    pub async fn delete_by_id(self, id: SshKeyId) -> Result<()> {
        self.http
            .request(&RequestSpec::delete(format!("sshkeys/{id}")))
            .await
            .map(|_| ())
    }
}
