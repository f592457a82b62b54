use crate::models::{CreateInstanceRequest, Instance, InstanceActionRequest};
use datacrunch_core::client::{HttpClient, RequestSpec};
use datacrunch_core::constants::{InstanceAction, InstanceStatus};
use datacrunch_core::ids::{InstanceId, VolumeId};
use datacrunch_core::query::Query;
use datacrunch_core::{Error, Result};
use tracing::debug;
use validator::Validate;

/// Deploy, inspect and control instances.
#[derive(Debug, Clone, Copy)]
pub struct InstancesService<'a> {
    http: &'a HttpClient,
}

impl<'a> InstancesService<'a> {
    /// Wrap a dispatcher.
    #[must_use]
    pub const fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    /// List instances, optionally only those in `status`.
    pub async fn get(self, status: Option<InstanceStatus>) -> Result<Vec<Instance>> {
        let spec =
            RequestSpec::get("instances").with_query(Query::new().filter("status", status).into());
        self.http.request(&spec).await?.json()
    }

    /// Fetch a single instance.
    pub async fn get_by_id(self, id: InstanceId) -> Result<Instance> {
        self.http
            .request(&RequestSpec::get(format!("instances/{id}")))
            .await?
            .json()
    }

    /// Deploy a new instance and return its id.
    pub async fn create(self, request: &CreateInstanceRequest) -> Result<InstanceId> {
        request.validate()?;

        let spec = RequestSpec::post("instances").with_json(request)?;
        let id: InstanceId = self.http.request(&spec).await?.text()?.parse()?;

        debug!(%id, instance_type = %request.instance_type, "instance deployed");
        Ok(id)
    }

    /// Perform `action` on every instance in `ids`.
    pub async fn action(
        self,
        ids: &[InstanceId],
        action: InstanceAction,
        volume_ids: Option<&[VolumeId]>,
    ) -> Result<()> {
        if ids.is_empty() {
            return Err(Error::InvalidRequest(
                "at least one instance id is required".to_string(),
            ));
        }

        let body = InstanceActionRequest {
            action,
            id: ids.to_vec(),
            volume_ids: volume_ids.map(<[VolumeId]>::to_vec),
        };
        let spec = RequestSpec::put("instances").with_json(&body)?;
        self.http.request(&spec).await?;

        debug!(%action, count = ids.len(), "instance action accepted");
        Ok(())
    }

    /// Whether `instance_type` can currently be deployed.
    pub async fn is_available(self, instance_type: &str, is_spot: bool) -> Result<bool> {
        let spec = RequestSpec::get("instance-availability")
            .with_segment(instance_type)
            .with_query(Query::new().flag("is_spot", is_spot).into());
        self.http.request(&spec).await?.json()
    }
}
