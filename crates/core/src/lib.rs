//! Shared primitives for all Rust crates in Ecumene.

#![forbid(unsafe_code)]

/// Invoking principal model shared across services.
pub mod actor;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use actor::Actor;

/// Result type used across Ecumene crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(u64);

        impl $name {
            /// Creates an identifier from a raw snowflake value.
            #[must_use]
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the raw snowflake value.
            #[must_use]
            pub const fn get(&self) -> u64 {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                value.trim().parse::<u64>().map(Self).map_err(|error| {
                    AppError::Validation(format!(
                        concat!("invalid ", $label, " '{}': {}"),
                        value, error
                    ))
                })
            }
        }
    };
}

snowflake_id!(
    /// Tenant (guild) identifier used as the partition key for grants, blacklists and records.
    TenantId,
    "tenant id"
);

snowflake_id!(
    /// Identifier of an invoking principal.
    ActorId,
    "actor id"
);

snowflake_id!(
    /// Identifier of a tenant role.
    RoleId,
    "role id"
);

snowflake_id!(
    /// Platform group identifier of a clan.
    ClanId,
    "clan id"
);

/// Platform membership identifier of an administrator holding a delegated credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AdminId(NonEmptyString);

impl AdminId {
    /// Creates a validated administrator identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        NonEmptyString::new(value).map(Self)
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for AdminId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Actor holds no matching grant or bypass for the command.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Actor or tenant is on a block list.
    #[error("blacklisted: {0}")]
    Blacklisted(String),

    /// A registration or context the command depends on is missing.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// An awaited confirmation step expired.
    #[error("interaction timed out: {0}")]
    InteractionTimeout(String),

    /// External platform returned a non-success response.
    #[error("provider error ({status}): {description}")]
    Provider {
        /// Status reported by the provider.
        status: u16,
        /// Provider error description.
        description: String,
    },

    /// Datastore unreachable or query failure.
    #[error("store error: {0}")]
    Store(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns whether the error is an authorization denial raised at the command gate.
    #[must_use]
    pub fn is_gate_denial(&self) -> bool {
        matches!(self, Self::PermissionDenied(_) | Self::Blacklisted(_))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{AdminId, AppError, NonEmptyString, RoleId, TenantId};

    #[test]
    fn non_empty_string_rejects_whitespace() {
        let result = NonEmptyString::new("   ");
        assert!(result.is_err());
    }

    #[test]
    fn snowflake_ids_parse_storage_values() {
        let tenant_id = TenantId::from_str("936212457281077258");
        assert_eq!(
            tenant_id.map(|value| value.get()).unwrap_or_default(),
            936_212_457_281_077_258
        );
        assert!(RoleId::from_str("not-a-role").is_err());
    }

    #[test]
    fn admin_id_rejects_empty_values() {
        assert!(AdminId::new("").is_err());
        assert_eq!(
            AdminId::new("4611686018467284386")
                .map(|value| value.to_string())
                .unwrap_or_default(),
            "4611686018467284386"
        );
    }

    #[test]
    fn gate_denials_are_classified() {
        assert!(AppError::Blacklisted("blocked".to_owned()).is_gate_denial());
        assert!(AppError::PermissionDenied("no grant".to_owned()).is_gate_denial());
        assert!(!AppError::Store("down".to_owned()).is_gate_denial());
    }
}
