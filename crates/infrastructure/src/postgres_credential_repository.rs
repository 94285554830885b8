use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ecumene_application::CredentialRepository;
use ecumene_core::{AdminId, AppError, AppResult};
use ecumene_domain::Credential;

use sqlx::{FromRow, PgPool};


/// PostgreSQL-backed delegated credential repository.
#[derive(Clone)]
pub struct PostgresCredentialRepository {
    pool: PgPool,
}

impl PostgresCredentialRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct CredentialRow {
    admin_id: String,
    access_token: String,
    access_expires_at: DateTime<Utc>,
    refresh_token: String,
    refresh_expires_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct AdminRow {
    admin_id: String,
}

impl TryFrom<CredentialRow> for Credential {
    type Error = AppError;

    fn try_from(row: CredentialRow) -> Result<Self, Self::Error> {
        Ok(Self {
            admin_id: decode_admin_id(row.admin_id)?,
            access_token: row.access_token,
            access_expires_at: row.access_expires_at,
            refresh_token: row.refresh_token,
            refresh_expires_at: row.refresh_expires_at,
        })
    }
}

fn decode_admin_id(value: String) -> AppResult<AdminId> {
    AdminId::new(value)
        .map_err(|error| AppError::Internal(format!("failed to decode credential admin id: {error}")))
}

#[async_trait]
impl CredentialRepository for PostgresCredentialRepository {
    async fn find_credential(&self, admin_id: &AdminId) -> AppResult<Option<Credential>> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT admin_id, access_token, access_expires_at, refresh_token, refresh_expires_at
            FROM credential
            WHERE admin_id = $1
            "#,
        )
        .bind(admin_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!("failed to find credential for '{admin_id}': {error}"))
        })?;

        row.map(Credential::try_from).transpose()
    }

    async fn insert_credential(&self, credential: &Credential) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO credential (
                admin_id,
                access_token,
                access_expires_at,
                refresh_token,
                refresh_expires_at
            )
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (admin_id) DO UPDATE
            SET access_token = EXCLUDED.access_token,
                access_expires_at = EXCLUDED.access_expires_at,
                refresh_token = EXCLUDED.refresh_token,
                refresh_expires_at = EXCLUDED.refresh_expires_at,
                updated_at = now()
            "#,
        )
        .bind(credential.admin_id.as_str())
        .bind(credential.access_token.as_str())
        .bind(credential.access_expires_at)
        .bind(credential.refresh_token.as_str())
        .bind(credential.refresh_expires_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to insert credential: {error}")))?;

        Ok(())
    }

    async fn update_credential(&self, credential: &Credential) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE credential
            SET access_token = $2,
                access_expires_at = $3,
                refresh_token = $4,
                refresh_expires_at = $5,
                updated_at = now()
            WHERE admin_id = $1
            "#,
        )
        .bind(credential.admin_id.as_str())
        .bind(credential.access_token.as_str())
        .bind(credential.access_expires_at)
        .bind(credential.refresh_token.as_str())
        .bind(credential.refresh_expires_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to update credential: {error}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "credential for '{}' was removed before it could be updated",
                credential.admin_id
            )));
        }

        Ok(())
    }

    async fn list_refreshable_credentials(
        &self,
        access_expires_before: DateTime<Utc>,
        refresh_expires_after: DateTime<Utc>,
    ) -> AppResult<Vec<Credential>> {
        let rows = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT admin_id, access_token, access_expires_at, refresh_token, refresh_expires_at
            FROM credential
            WHERE access_expires_at <= $1
                AND refresh_expires_at > $2
                AND refresh_token <> ''
            ORDER BY access_expires_at
            "#,
        )
        .bind(access_expires_before)
        .bind(refresh_expires_after)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Store(format!("failed to list refreshable credentials: {error}"))
        })?;

        rows.into_iter().map(Credential::try_from).collect()
    }

    async fn list_dead_credentials(
        &self,
        refresh_expires_before: DateTime<Utc>,
    ) -> AppResult<Vec<Credential>> {
        let rows = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT admin_id, access_token, access_expires_at, refresh_token, refresh_expires_at
            FROM credential
            WHERE refresh_token = ''
                OR refresh_expires_at <= $1
            ORDER BY refresh_expires_at
            "#,
        )
        .bind(refresh_expires_before)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to list dead credentials: {error}")))?;

        rows.into_iter().map(Credential::try_from).collect()
    }

    async fn list_orphaned_admin_ids(&self) -> AppResult<Vec<AdminId>> {
        let rows = sqlx::query_as::<_, AdminRow>(
            r#"
            SELECT credential.admin_id
            FROM credential
            WHERE NOT EXISTS (
                SELECT 1
                FROM clan_binding
                WHERE clan_binding.admin_id = credential.admin_id
            )
            ORDER BY credential.admin_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to list orphaned credentials: {error}")))?;

        rows.into_iter()
            .map(|row| decode_admin_id(row.admin_id))
            .collect()
    }

    async fn delete_credentials(&self, admin_ids: &[AdminId]) -> AppResult<u64> {
        if admin_ids.is_empty() {
            return Ok(0);
        }

        let values: Vec<String> = admin_ids
            .iter()
            .map(|admin_id| admin_id.as_str().to_owned())
            .collect();
        let result = sqlx::query(
            r#"
            DELETE FROM credential
            WHERE admin_id = ANY($1)
            "#,
        )
        .bind(values)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to delete credentials: {error}")))?;

        Ok(result.rows_affected())
    }
}
