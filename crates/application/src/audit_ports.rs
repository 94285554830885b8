use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ecumene_core::{ActorId, AppResult, TenantId};
use ecumene_domain::{AuditRecord, AuditStatus};

/// Command id filter for audit queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandFilter {
    /// Matches one command id exactly.
    Exact(String),
    /// Matches every command id starting with the prefix.
    Prefix(String),
}

impl CommandFilter {
    /// Builds a filter from a user pattern; a trailing `*` becomes a prefix match.
    #[must_use]
    pub fn from_pattern(pattern: &str) -> Self {
        match pattern.trim().strip_suffix('*') {
            Some(prefix) => Self::Prefix(prefix.to_owned()),
            None => Self::Exact(pattern.trim().to_owned()),
        }
    }

    /// Returns whether `command_id` satisfies the filter.
    #[must_use]
    pub fn matches(&self, command_id: &str) -> bool {
        match self {
            Self::Exact(value) => command_id == value,
            Self::Prefix(prefix) => command_id.starts_with(prefix.as_str()),
        }
    }
}

/// Query over finished audit records in one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecordQuery {
    /// Only records invoked at or after this instant.
    pub invoked_since: DateTime<Utc>,
    /// Optional command filter.
    pub command: Option<CommandFilter>,
    /// Optional invoking actor filter.
    pub actor_id: Option<ActorId>,
    /// Optional option-value filter matching `=<target>` in serialized options.
    pub target: Option<String>,
}

impl AuditRecordQuery {
    /// Returns whether a finished record satisfies the query.
    #[must_use]
    pub fn matches(&self, record: &AuditRecord) -> bool {
        record.status.is_terminal()
            && record.invoked_at >= self.invoked_since
            && self
                .command
                .as_ref()
                .is_none_or(|filter| filter.matches(record.command_id.as_str()))
            && self.actor_id.is_none_or(|actor_id| record.actor_id == actor_id)
            && self.target.as_deref().is_none_or(|target| {
                record
                    .command_options
                    .as_deref()
                    .is_some_and(|options| options.contains(format!("={target}").as_str()))
            })
    }
}

/// Repository port for audit record persistence.
#[async_trait]
pub trait AuditRecordRepository: Send + Sync {
    /// Inserts one record in whatever status it carries.
    async fn insert_record(&self, record: &AuditRecord) -> AppResult<()>;

    /// Moves a pending record to `status` and returns how many rows changed.
    async fn update_pending_status(&self, record_id: &str, status: AuditStatus) -> AppResult<u64>;

    /// Marks every record pending since `invoked_before` as expired.
    async fn expire_pending_before(&self, invoked_before: DateTime<Utc>) -> AppResult<u64>;

    /// Lists finished records for one tenant, most recent first.
    async fn list_records(
        &self,
        tenant_id: TenantId,
        query: &AuditRecordQuery,
    ) -> AppResult<Vec<AuditRecord>>;
}
