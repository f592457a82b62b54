//! Read-only value sets exposed by the DataCrunch API.
//!
//! Instance actions, instance statuses and provider error codes are fixed
//! string sets. Each is modelled as a closed enum with a static lookup
//! table, so callers never build these strings by hand.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Default base URL of the public API.
pub const DEFAULT_BASE_URL: &str = "https://api.datacrunch.io/v1";

/// Path of the OAuth2 token endpoint, relative to the base URL.
pub const TOKEN_ENDPOINT_PATH: &str = "oauth2/token";

/// Location used when a deploy request does not name one.
pub const DEFAULT_LOCATION: &str = "FIN-01";

/// Macro to generate a closed string value set.
macro_rules! constant_set {
    ($(#[$meta:meta])* $name:ident, $label:literal {
        $($(#[$vmeta:meta])* $variant:ident => $value:literal),+ $(,)?
    }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $value)]
                $variant,
            )+
        }

        impl $name {
            /// Returns the wire value.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $value,)+
                }
            }

            /// Returns every value in the set.
            #[must_use]
            pub const fn all() -> &'static [Self] {
                &[$(Self::$variant,)+]
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($value => Ok(Self::$variant),)+
                    _ => Err(Error::InvalidRequest(format!("Unknown {}: {s}", $label))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

constant_set!(
    /// Actions that can be performed on an instance.
    InstanceAction, "instance action" {
        /// Boot a stopped instance
        Start => "start",
        /// Shut the instance down
        Shutdown => "shutdown",
        /// Delete the instance
        Delete => "delete",
        /// Hibernate the instance, keeping its volumes
        Hibernate => "hibernate",
        /// Restore a hibernated instance
        Restore => "restore",
    }
);

constant_set!(
    /// Lifecycle states reported for an instance.
    InstanceStatus, "instance status" {
        /// Order accepted
        Ordered => "ordered",
        /// Instance is running
        Running => "running",
        /// Instance is being provisioned
        Provisioning => "provisioning",
        /// Instance is powered off
        Offline => "offline",
        /// Instance has been discontinued
        Discontinued => "discontinued",
        /// Instance could not be found
        NotFound => "notfound",
        /// Instance was just created
        New => "new",
        /// Instance is in an error state
        Error => "error",
        /// Instance is being deleted
        Deleting => "deleting",
        /// Order is being validated
        Validating => "validating",
        /// No capacity available for the requested type
        NoCapacity => "no_capacity",
        /// State could not be determined, or a status this client does not know
        #[serde(other)]
        Unknown => "unknown",
    }
);

constant_set!(
    /// Error codes returned in the API's JSON error envelope.
    ErrorCode, "error code" {
        /// Request was malformed
        InvalidRequest => "invalid_request",
        /// Credentials or token were rejected
        UnauthorizedRequest => "unauthorized_request",
        /// Account balance too low
        InsufficientFunds => "insufficient_funds",
        /// Action is not allowed
        ForbiddenAction => "forbidden_action",
        /// Resource does not exist
        NotFound => "not_found",
        /// Provider-side failure
        ServerError => "server_error",
        /// Service temporarily unavailable
        ServiceUnavailable => "service_unavailable",
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_values() {
        assert_eq!(InstanceAction::Start.as_str(), "start");
        assert_eq!(InstanceAction::Hibernate.to_string(), "hibernate");
        assert_eq!(InstanceAction::all().len(), 5);
    }

    #[test]
    fn test_status_round_trips_through_from_str() {
        for status in InstanceStatus::all() {
            assert_eq!(status.as_str().parse::<InstanceStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn test_status_irregular_wire_values() {
        assert_eq!(InstanceStatus::NotFound.as_str(), "notfound");
        assert_eq!(InstanceStatus::NoCapacity.as_str(), "no_capacity");
        let status: InstanceStatus = serde_json::from_str("\"no_capacity\"").unwrap();
        assert_eq!(status, InstanceStatus::NoCapacity);
    }

    #[test]
    fn test_unrecognized_status_decodes_as_unknown() {
        let status: InstanceStatus = serde_json::from_str("\"suspended\"").unwrap();
        assert_eq!(status, InstanceStatus::Unknown);
        assert_eq!(
            serde_json::to_string(&InstanceStatus::Unknown).unwrap(),
            "\"unknown\""
        );
    }

    #[test]
    fn test_unknown_value_rejected() {
        let err = "reboot".parse::<InstanceAction>().unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(msg) if msg.contains("instance action")));
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::InsufficientFunds).unwrap();
        assert_eq!(json, "\"insufficient_funds\"");
        assert_eq!(ErrorCode::all().len(), 7);
    }
}
