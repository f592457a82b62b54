//! Typed asynchronous client for the DataCrunch cloud API.
//!
//! ```no_run
//! # async fn run() -> datacrunch::Result<()> {
//! let client = datacrunch::DataCrunchClient::new("client-id", "client-secret")?;
//! let balance = client.balance().get().await?;
//! println!("{} {}", balance.amount, balance.currency);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

pub mod client;
pub mod models;
pub mod services;

pub use client::{DataCrunchClient, DataCrunchClientBuilder, VERSION};
pub use datacrunch_core::constants::{ErrorCode, InstanceAction, InstanceStatus};
pub use datacrunch_core::ids::{
    ImageId, InstanceId, InstanceTypeId, SshKeyId, StartupScriptId, VolumeId,
};
pub use datacrunch_core::{ApiError, Error, ErrorKind};
pub use models::{
    Balance, CpuSpec, CreateInstanceRequest, CreateSshKeyRequest, CreateStartupScriptRequest,
    GpuSpec, Image, Instance, InstanceActionRequest, InstanceType, OsVolume, SizeSpec, SshKey,
    StartupScript,
};

/// Convenient result alias using the shared DataCrunch error type.
pub type Result<T> = datacrunch_core::Result<T>;
