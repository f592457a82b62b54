//! Thin per-resource wrappers over [`HttpClient`].
//!
//! Each service borrows the client's dispatcher and only maps calls onto
//! paths and payloads; authentication, retry and error mapping all happen in
//! [`HttpClient::request`]. Services are `Copy` and their methods take
//! `self`, so a call such as `client.balance().get()` yields a future that
//! borrows only the client.

mod balance;
mod images;
mod instance_types;
mod instances;
mod ssh_keys;
mod startup_scripts;

pub use balance::BalanceService;
pub use images::ImagesService;
pub use instance_types::InstanceTypesService;
pub use instances::InstancesService;
pub use ssh_keys::SshKeysService;
pub use startup_scripts::StartupScriptsService;

use datacrunch_core::{ApiError, Error, ErrorKind, Result};
use std::fmt::Display;

/// Lookups by id answer with a list holding the single match.
fn single<T>(items: Vec<T>, what: &str, id: impl Display) -> Result<T> {
    items.into_iter().next().ok_or_else(|| {
        Error::Api(ApiError::new(
            ErrorKind::NotFound,
            None,
            format!("{what} {id} not found"),
            "[]",
        ))
    })
}
