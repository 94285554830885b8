use async_trait::async_trait;

use ecumene_application::BlacklistRepository;
use ecumene_core::{AppError, AppResult};
use ecumene_domain::BlacklistEntry;

use sqlx::PgPool;

#[cfg(test)]
mod tests;

/// PostgreSQL-backed block list repository.
#[derive(Clone)]
pub struct PostgresBlacklistRepository {
    pool: PgPool,
}

impl PostgresBlacklistRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlacklistRepository for PostgresBlacklistRepository {
    async fn contains_any(&self, entries: &[BlacklistEntry]) -> AppResult<bool> {
        if entries.is_empty() {
            return Ok(false);
        }

        let scopes: Vec<String> = entries
            .iter()
            .map(|entry| entry.scope.storage_value())
            .collect();
        let kinds: Vec<String> = entries
            .iter()
            .map(|entry| entry.subject.kind().to_owned())
            .collect();
        let subject_ids: Vec<String> = entries
            .iter()
            .map(|entry| entry.subject.raw_id().to_string())
            .collect();

        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM blacklist AS entries
                INNER JOIN UNNEST($1::TEXT[], $2::TEXT[], $3::TEXT[])
                    AS candidates (scope, subject_kind, subject_id)
                    ON entries.scope = candidates.scope
                    AND entries.subject_kind = candidates.subject_kind
                    AND entries.subject_id = candidates.subject_id
            )
            "#,
        )
        .bind(scopes)
        .bind(kinds)
        .bind(subject_ids)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to check block list: {error}")))
    }

    async fn insert_entry(&self, entry: &BlacklistEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO blacklist (scope, subject_kind, subject_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (scope, subject_kind, subject_id) DO NOTHING
            "#,
        )
        .bind(entry.scope.storage_value())
        .bind(entry.subject.kind())
        .bind(entry.subject.raw_id().to_string())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to insert block list entry: {error}")))?;

        Ok(())
    }

    async fn delete_entry(&self, entry: &BlacklistEntry) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM blacklist
            WHERE scope = $1
                AND subject_kind = $2
                AND subject_id = $3
            "#,
        )
        .bind(entry.scope.storage_value())
        .bind(entry.subject.kind())
        .bind(entry.subject.raw_id().to_string())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to delete block list entry: {error}")))?;

        Ok(result.rows_affected())
    }
}
