//! Resource models returned and accepted by the DataCrunch API.

use chrono::{DateTime, Utc};
use datacrunch_core::constants::{InstanceAction, InstanceStatus, DEFAULT_LOCATION};
use datacrunch_core::ids::{
    ImageId, InstanceId, InstanceTypeId, SshKeyId, StartupScriptId, VolumeId,
};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// Account balance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Balance {
    /// Remaining credit.
    pub amount: f64,
    /// Currency of `amount` (e.g. `usd`).
    pub currency: String,
}

/// OS image that instances can be deployed from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Image {
    /// Image id.
    pub id: ImageId,
    /// Display name.
    pub name: String,
    /// Image type passed as `image` when deploying.
    pub image_type: String,
    /// Free-form details (installed drivers, frameworks).
    #[serde(default)]
    pub details: Vec<String>,
}

/// CPU description of an instance or instance type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CpuSpec {
    /// Human-readable summary.
    #[serde(default)]
    pub description: String,
    /// Number of cores.
    #[serde(default)]
    pub number_of_cores: u32,
}

/// GPU description of an instance or instance type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GpuSpec {
    /// Human-readable summary.
    #[serde(default)]
    pub description: String,
    /// Number of GPUs.
    #[serde(default)]
    pub number_of_gpus: u32,
}

/// Memory or storage size.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SizeSpec {
    /// Human-readable summary.
    #[serde(default)]
    pub description: String,
    /// Size in GB.
    #[serde(default)]
    pub size_in_gigabytes: u32,
}

/// Deployable machine configuration with its price.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceType {
    /// Instance type id.
    pub id: InstanceTypeId,
    /// Name used as `instance_type` when deploying (e.g. `1V100.6V`).
    pub instance_type: String,
    /// On-demand price per hour.
    #[serde(deserialize_with = "flexible_f64")]
    pub price_per_hour: f64,
    /// Spot price per hour.
    #[serde(default, deserialize_with = "flexible_opt_f64")]
    pub spot_price: Option<f64>,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// CPU.
    pub cpu: CpuSpec,
    /// GPU.
    pub gpu: GpuSpec,
    /// System memory.
    pub memory: SizeSpec,
    /// GPU memory.
    pub gpu_memory: SizeSpec,
    /// Local storage.
    pub storage: SizeSpec,
}

/// A deployed instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instance {
    /// Instance id.
    pub id: InstanceId,
    /// Instance type name.
    pub instance_type: String,
    /// Image type the instance was deployed from.
    pub image: String,
    /// Price per hour.
    #[serde(deserialize_with = "flexible_f64")]
    pub price_per_hour: f64,
    /// Hostname.
    pub hostname: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Public IP, once assigned.
    #[serde(default)]
    pub ip: Option<String>,
    /// Current status.
    pub status: InstanceStatus,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// SSH keys installed on the instance.
    #[serde(default)]
    pub ssh_key_ids: Vec<SshKeyId>,
    /// CPU.
    #[serde(default)]
    pub cpu: Option<CpuSpec>,
    /// GPU.
    #[serde(default)]
    pub gpu: Option<GpuSpec>,
    /// System memory.
    #[serde(default)]
    pub memory: Option<SizeSpec>,
    /// Local storage.
    #[serde(default)]
    pub storage: Option<SizeSpec>,
    /// GPU memory.
    #[serde(default)]
    pub gpu_memory: Option<SizeSpec>,
    /// OS volume.
    #[serde(default)]
    pub os_volume_id: Option<VolumeId>,
    /// Datacenter location code.
    #[serde(default = "default_location")]
    pub location: String,
    /// Startup script run on first boot.
    #[serde(default)]
    pub startup_script_id: Option<StartupScriptId>,
    /// Whether this is a spot instance.
    #[serde(default)]
    pub is_spot: bool,
}

/// OS volume settings for a new instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct OsVolume {
    /// Volume name.
    #[validate(length(min = 1))]
    pub name: String,
    /// Size in GB.
    #[validate(range(min = 1))]
    pub size: u32,
}

/// Body of `POST /instances`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Validate)]
pub struct CreateInstanceRequest {
    /// Instance type name (see [`InstanceType::instance_type`]).
    #[validate(length(min = 1))]
    pub instance_type: String,
    /// Image type (see [`Image::image_type`]).
    #[validate(length(min = 1))]
    pub image: String,
    /// Hostname.
    #[validate(length(min = 1))]
    pub hostname: String,
    /// Description.
    #[validate(length(min = 1))]
    pub description: String,
    /// SSH keys to install.
    pub ssh_key_ids: Vec<SshKeyId>,
    /// Datacenter location code.
    pub location_code: String,
    /// Startup script run on first boot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup_script_id: Option<StartupScriptId>,
    /// OS volume settings.
    #[validate(nested)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_volume: Option<OsVolume>,
    /// Deploy as a spot instance.
    pub is_spot: bool,
    /// Discount coupon.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<String>,
}

impl CreateInstanceRequest {
    /// A request with the required fields and defaults for the rest.
    #[must_use]
    pub fn new(
        instance_type: impl Into<String>,
        image: impl Into<String>,
        hostname: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            instance_type: instance_type.into(),
            image: image.into(),
            hostname: hostname.into(),
            description: description.into(),
            ssh_key_ids: Vec::new(),
            location_code: default_location(),
            startup_script_id: None,
            os_volume: None,
            is_spot: false,
            coupon: None,
        }
    }

    /// Install these SSH keys.
    #[must_use]
    pub fn with_ssh_keys(mut self, ids: impl IntoIterator<Item = SshKeyId>) -> Self {
        self.ssh_key_ids = ids.into_iter().collect();
        self
    }

    /// Deploy in another location.
    #[must_use]
    pub fn with_location(mut self, location_code: impl Into<String>) -> Self {
        self.location_code = location_code.into();
        self
    }

    /// Run a startup script on first boot.
    #[must_use]
    pub fn with_startup_script(mut self, id: StartupScriptId) -> Self {
        self.startup_script_id = Some(id);
        self
    }

    /// Configure the OS volume.
    #[must_use]
    pub fn with_os_volume(mut self, name: impl Into<String>, size: u32) -> Self {
        self.os_volume = Some(OsVolume {
            name: name.into(),
            size,
        });
        self
    }

    /// Deploy as a spot instance.
    #[must_use]
    pub const fn spot(mut self, is_spot: bool) -> Self {
        self.is_spot = is_spot;
        self
    }

    /// Apply a coupon.
    #[must_use]
    pub fn with_coupon(mut self, coupon: impl Into<String>) -> Self {
        self.coupon = Some(coupon.into());
        self
    }
}

/// Body of `PUT /instances`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InstanceActionRequest {
    /// Action to perform.
    pub action: InstanceAction,
    /// Target instances.
    pub id: Vec<InstanceId>,
    /// Volumes affected by the action (e.g. deleted together with the instance).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_ids: Option<Vec<VolumeId>>,
}

/// An SSH public key stored in the account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SshKey {
    /// Key id.
    pub id: SshKeyId,
    /// Key name.
    pub name: String,
    /// Public key.
    pub key: String,
}

/// Body of `POST /sshkeys`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Validate)]
pub struct CreateSshKeyRequest {
    /// Key name.
    #[validate(length(min = 1))]
    pub name: String,
    /// Public key.
    #[validate(length(min = 1))]
    pub key: String,
}

/// A startup script stored in the account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartupScript {
    /// Script id.
    pub id: StartupScriptId,
    /// Script name.
    pub name: String,
    /// Script contents.
    pub script: String,
}

/// Body of `POST /scripts`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Validate)]
pub struct CreateStartupScriptRequest {
    /// Script name.
    #[validate(length(min = 1))]
    pub name: String,
    /// Script contents.
    pub script: String,
}

fn default_location() -> String {
    DEFAULT_LOCATION.to_string()
}

// Prices arrive as JSON numbers or as decimal strings depending on the endpoint.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

impl NumberOrString {
    fn into_f64<E: serde::de::Error>(self) -> Result<f64, E> {
        match self {
            Self::Number(n) => Ok(n),
            Self::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid price: {s}"))),
        }
    }
}

fn flexible_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    NumberOrString::deserialize(deserializer)?.into_f64()
}

fn flexible_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<NumberOrString>::deserialize(deserializer)?
        .map(NumberOrString::into_f64)
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn instance_type_accepts_string_prices() {
        let instance_type: InstanceType = serde_json::from_value(json!({
            "id": "01cf5dc1-a5d2-4972-ae4e-d429115d055b",
            "instance_type": "1V100.6V",
            "price_per_hour": "0.89",
            "spot_price": 0.35,
            "description": "Dedicated GPU server",
            "cpu": {"description": "6 CPU", "number_of_cores": 6},
            "gpu": {"description": "1x Tesla V100 16GB", "number_of_gpus": 1},
            "memory": {"description": "23GB RAM", "size_in_gigabytes": 23},
            "gpu_memory": {"description": "16GB VRAM", "size_in_gigabytes": 16},
            "storage": {"description": "225GB NVME", "size_in_gigabytes": 225}
        }))
        .unwrap();

        assert!((instance_type.price_per_hour - 0.89).abs() < f64::EPSILON);
        assert_eq!(instance_type.spot_price, Some(0.35));
        assert_eq!(instance_type.gpu.number_of_gpus, 1);
    }

    #[test]
    fn instance_defaults_optional_fields() {
        let instance: Instance = serde_json::from_value(json!({
            "id": "1eeabba4-caf7-4b4a-9143-0107034cc7f5",
            "instance_type": "8V100.48V",
            "image": "ubuntu-22.04-cuda-12.0",
            "price_per_hour": 5.52,
            "hostname": "trainer",
            "status": "provisioning"
        }))
        .unwrap();

        assert_eq!(instance.status, InstanceStatus::Provisioning);
        assert_eq!(instance.location, DEFAULT_LOCATION);
        assert!(instance.ssh_key_ids.is_empty());
        assert!(instance.ip.is_none());
        assert!(!instance.is_spot);
    }

    #[test]
    fn create_instance_request_omits_unset_options() {
        let request = CreateInstanceRequest::new("1V100.6V", "ubuntu-22.04", "box", "test box");
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["location_code"], "FIN-01");
        assert_eq!(value["is_spot"], false);
        assert!(value.get("os_volume").is_none());
        assert!(value.get("startup_script_id").is_none());
        assert!(value.get("coupon").is_none());
    }

    #[test]
    fn create_instance_request_validation() {
        let request = CreateInstanceRequest::new("1V100.6V", "ubuntu-22.04", "", "test box");
        assert!(request.validate().is_err());

        let request = CreateInstanceRequest::new("1V100.6V", "ubuntu-22.04", "box", "test box")
            .with_os_volume("os", 0);
        assert!(request.validate().is_err());
    }

    #[test]
    fn instance_list_tolerates_new_statuses() {
        let instances: Vec<Instance> = serde_json::from_value(json!([
            {
                "id": "1eeabba4-caf7-4b4a-9143-0107034cc7f5",
                "instance_type": "1V100.6V",
                "image": "ubuntu-22.04",
                "price_per_hour": 0.89,
                "hostname": "a",
                "status": "running"
            },
            {
                "id": "2c1d6b9e-0f2a-4a77-9c61-3e4b8d2f7a10",
                "instance_type": "1V100.6V",
                "image": "ubuntu-22.04",
                "price_per_hour": 0.89,
                "hostname": "b",
                "status": "migrating"
            }
        ]))
        .unwrap();

        assert_eq!(instances[0].status, InstanceStatus::Running);
        assert_eq!(instances[1].status, InstanceStatus::Unknown);
    }

    #[test]
    fn action_request_serializes_wire_names() {
        let id = InstanceId::new_v4();
        let request = InstanceActionRequest {
            action: InstanceAction::Hibernate,
            id: vec![id],
            volume_ids: None,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"action": "hibernate", "id": [id.to_string()]})
        );
    }
}
