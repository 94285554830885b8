use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ecumene_application::{AuditRecordQuery, AuditRecordRepository, CommandFilter};
use ecumene_core::{ActorId, AppError, AppResult, TenantId};
use ecumene_domain::{AuditRecord, AuditStatus};

use sqlx::{FromRow, PgPool};


/// PostgreSQL-backed audit record repository.
#[derive(Clone)]
pub struct PostgresAuditRecordRepository {
    pool: PgPool,
}

impl PostgresAuditRecordRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditRecordRow {
    record_id: String,
    command_id: String,
    invoked_at: DateTime<Utc>,
    tenant_id: String,
    actor_id: String,
    command_options: Option<String>,
    status: String,
}

impl TryFrom<AuditRecordRow> for AuditRecord {
    type Error = AppError;

    fn try_from(row: AuditRecordRow) -> Result<Self, Self::Error> {
        let decode_error = |field: &str, error: AppError| {
            AppError::Internal(format!(
                "failed to decode {field} of audit record '{}': {error}",
                row.record_id
            ))
        };

        let tenant_id =
            TenantId::from_str(&row.tenant_id).map_err(|error| decode_error("tenant", error))?;
        let actor_id =
            ActorId::from_str(&row.actor_id).map_err(|error| decode_error("actor", error))?;
        let status =
            AuditStatus::from_str(&row.status).map_err(|error| decode_error("status", error))?;

        Ok(Self {
            record_id: row.record_id,
            command_id: row.command_id,
            invoked_at: row.invoked_at,
            tenant_id,
            actor_id,
            command_options: row.command_options,
            status,
        })
    }
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[async_trait]
impl AuditRecordRepository for PostgresAuditRecordRepository {
    async fn insert_record(&self, record: &AuditRecord) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO audit_record (
                record_id,
                command_id,
                invoked_at,
                tenant_id,
                actor_id,
                command_options,
                status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (record_id) DO NOTHING
            "#,
        )
        .bind(record.record_id.as_str())
        .bind(record.command_id.as_str())
        .bind(record.invoked_at)
        .bind(record.tenant_id.to_string())
        .bind(record.actor_id.to_string())
        .bind(record.command_options.as_deref())
        .bind(record.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to insert audit record: {error}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "audit record '{}' already exists",
                record.record_id
            )));
        }

        Ok(())
    }

    async fn update_pending_status(&self, record_id: &str, status: AuditStatus) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE audit_record
            SET status = $2
            WHERE record_id = $1
                AND status = 'pending'
            "#,
        )
        .bind(record_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to update audit record: {error}")))?;

        Ok(result.rows_affected())
    }

    async fn expire_pending_before(&self, invoked_before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE audit_record
            SET status = 'expired_or_unhandled'
            WHERE status = 'pending'
                AND invoked_at <= $1
            "#,
        )
        .bind(invoked_before)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to expire audit records: {error}")))?;

        Ok(result.rows_affected())
    }

    async fn list_records(
        &self,
        tenant_id: TenantId,
        query: &AuditRecordQuery,
    ) -> AppResult<Vec<AuditRecord>> {
        let (command_exact, command_prefix) = match &query.command {
            Some(CommandFilter::Exact(command_id)) => (Some(command_id.clone()), None),
            Some(CommandFilter::Prefix(prefix)) => {
                (None, Some(format!("{}%", escape_like(prefix))))
            }
            None => (None, None),
        };
        let target_pattern = query
            .target
            .as_deref()
            .map(|target| format!("%={}%", escape_like(target)));

        let rows = sqlx::query_as::<_, AuditRecordRow>(
            r#"
            SELECT
                record_id,
                command_id,
                invoked_at,
                tenant_id,
                actor_id,
                command_options,
                status
            FROM audit_record
            WHERE tenant_id = $1
                AND status <> 'pending'
                AND invoked_at >= $2
                AND ($3::TEXT IS NULL OR command_id = $3)
                AND ($4::TEXT IS NULL OR command_id LIKE $4 ESCAPE '\')
                AND ($5::TEXT IS NULL OR actor_id = $5)
                AND ($6::TEXT IS NULL OR command_options LIKE $6 ESCAPE '\')
            ORDER BY invoked_at DESC
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(query.invoked_since)
        .bind(command_exact)
        .bind(command_prefix)
        .bind(query.actor_id.map(|actor_id| actor_id.to_string()))
        .bind(target_pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to list audit records: {error}")))?;

        rows.into_iter().map(AuditRecord::try_from).collect()
    }
}
