use std::fmt::{Display, Formatter};
use std::str::FromStr;

use ecumene_core::{ActorId, AppError, AppResult, RoleId, TenantId};
use serde::{Deserialize, Serialize};

use crate::command::{COMMAND_SEPARATOR, WILDCARD_SUFFIX};

/// Dotted grant key naming a command (`guild.grant`) or a whole group (`guild.*`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionPath(String);

impl PermissionPath {
    /// Parses and validates a permission path.
    pub fn parse(value: &str) -> AppResult<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(AppError::Validation(
                "permission path must not be empty".to_owned(),
            ));
        }

        let segments: Vec<&str> = value.split(COMMAND_SEPARATOR).collect();
        let last_index = segments.len() - 1;
        for (index, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                return Err(AppError::Validation(format!(
                    "permission path '{value}' contains an empty segment"
                )));
            }
            if *segment == "*" && (index != last_index || index == 0) {
                return Err(AppError::Validation(format!(
                    "permission path '{value}' may only end in a group wildcard"
                )));
            }
            if *segment != "*" && segment.contains('*') {
                return Err(AppError::Validation(format!(
                    "permission path '{value}' contains a partial wildcard"
                )));
            }
        }

        Ok(Self(value.to_owned()))
    }

    /// Returns the storage value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns whether the path grants a whole group.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.0.ends_with(WILDCARD_SUFFIX)
    }

    /// Returns the command or group identifier the path points at.
    #[must_use]
    pub fn target_id(&self) -> &str {
        self.0.strip_suffix(WILDCARD_SUFFIX).unwrap_or(self.0.as_str())
    }
}

impl FromStr for PermissionPath {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Display for PermissionPath {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Stored authorization of one role for one command or group in a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermissionGrant {
    /// Tenant scope.
    pub tenant_id: TenantId,
    /// Role receiving the grant.
    pub role_id: RoleId,
    /// Granted path.
    pub path: PermissionPath,
}

/// Scope a block list entry applies in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlacklistScope {
    /// Applies only inside one tenant.
    Tenant(TenantId),
    /// Applies in every tenant.
    Global,
}

impl BlacklistScope {
    /// Storage value used for the global scope.
    pub const GLOBAL: &'static str = "global";

    /// Returns the storage value for this scope.
    #[must_use]
    pub fn storage_value(&self) -> String {
        match self {
            Self::Tenant(tenant_id) => tenant_id.to_string(),
            Self::Global => Self::GLOBAL.to_owned(),
        }
    }

    /// Parses a storage value into a scope.
    pub fn from_storage(value: &str) -> AppResult<Self> {
        if value == Self::GLOBAL {
            return Ok(Self::Global);
        }
        TenantId::from_str(value).map(Self::Tenant)
    }
}

/// Principal a block list entry names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockedSubject {
    /// A single actor.
    Actor(ActorId),
    /// A whole tenant, for cross-tenant interactions.
    Tenant(TenantId),
}

impl BlockedSubject {
    /// Returns the stable subject kind label.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Actor(_) => "actor",
            Self::Tenant(_) => "tenant",
        }
    }

    /// Returns the raw snowflake of the subject.
    #[must_use]
    pub fn raw_id(&self) -> u64 {
        match self {
            Self::Actor(actor_id) => actor_id.get(),
            Self::Tenant(tenant_id) => tenant_id.get(),
        }
    }

    /// Rebuilds a subject from its storage columns.
    pub fn from_storage(kind: &str, raw_id: &str) -> AppResult<Self> {
        match kind {
            "actor" => ActorId::from_str(raw_id).map(Self::Actor),
            "tenant" => TenantId::from_str(raw_id).map(Self::Tenant),
            _ => Err(AppError::Validation(format!(
                "unknown blacklist subject kind '{kind}'"
            ))),
        }
    }
}

/// Unconditional deny entry checked before any grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlacklistEntry {
    /// Where the block applies.
    pub scope: BlacklistScope,
    /// Who is blocked.
    pub subject: BlockedSubject,
}

impl BlacklistEntry {
    /// Returns the entries that would block `actor_id` acting in `tenant_id`.
    #[must_use]
    pub fn blocking_candidates(tenant_id: TenantId, actor_id: ActorId) -> [Self; 3] {
        [
            Self {
                scope: BlacklistScope::Tenant(tenant_id),
                subject: BlockedSubject::Actor(actor_id),
            },
            Self {
                scope: BlacklistScope::Global,
                subject: BlockedSubject::Actor(actor_id),
            },
            Self {
                scope: BlacklistScope::Global,
                subject: BlockedSubject::Tenant(tenant_id),
            },
        ]
    }
}
