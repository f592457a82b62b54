//! # datacrunch-core
//!
//! Authentication and request dispatch for the DataCrunch public API.
//!
//! This crate holds everything with real control flow: the OAuth2 token
//! lifecycle, the authenticated dispatcher that retries once on a rejected
//! token, and the mapping of HTTP failures onto a fixed error taxonomy.
//! Resource services in the `datacrunch` crate build on [`client::HttpClient`].
//!
//! ## Modules
//!
//! - [`auth`] - Credentials, access tokens and the token manager
//! - [`client`] - Authenticated dispatcher and transport configuration
//! - [`error`] - Error types and HTTP status code mapping
//! - [`constants`] - Instance actions, instance statuses and error codes
//! - [`ids`] - Strongly-typed resource ids
//! - [`config`] - Client configuration
//! - [`query`] - Query parameter builder

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod query;

// Re-export commonly used types
pub use auth::{AccessToken, Credentials, TokenManager};
pub use client::{ApiResponse, HttpClient, RequestSpec};
pub use error::{ApiError, Error, ErrorKind, Result};
