use std::str::FromStr;

use async_trait::async_trait;

use ecumene_application::ClanBindingRepository;
use ecumene_core::{AdminId, AppError, AppResult, ClanId, TenantId};
use ecumene_domain::ClanBinding;

use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed repository linking tenant clans to credentials.
#[derive(Clone)]
pub struct PostgresClanBindingRepository {
    pool: PgPool,
}

impl PostgresClanBindingRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ClanBindingRow {
    clan_id: String,
    clan_name: String,
    admin_id: String,
}

#[async_trait]
impl ClanBindingRepository for PostgresClanBindingRepository {
    async fn save_binding(&self, binding: &ClanBinding) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO clan_binding (tenant_id, clan_id, clan_name, admin_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tenant_id, clan_id) DO UPDATE
            SET clan_name = EXCLUDED.clan_name,
                admin_id = EXCLUDED.admin_id
            "#,
        )
        .bind(binding.tenant_id.to_string())
        .bind(binding.clan_id.to_string())
        .bind(binding.clan_name.as_str())
        .bind(binding.admin_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to save clan binding: {error}")))?;

        Ok(())
    }

    async fn delete_binding(&self, tenant_id: TenantId, clan_id: ClanId) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM clan_binding
            WHERE tenant_id = $1
                AND clan_id = $2
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(clan_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to delete clan binding: {error}")))?;

        Ok(result.rows_affected())
    }

    async fn list_bindings(&self, tenant_id: TenantId) -> AppResult<Vec<ClanBinding>> {
        let rows = sqlx::query_as::<_, ClanBindingRow>(
            r#"
            SELECT clan_id, clan_name, admin_id
            FROM clan_binding
            WHERE tenant_id = $1
            ORDER BY clan_name
            "#,
        )
        .bind(tenant_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to list clan bindings: {error}")))?;

        rows.into_iter()
            .map(|row| {
                let decode_error = |error: AppError| {
                    AppError::Internal(format!(
                        "failed to decode clan binding '{}' for tenant '{tenant_id}': {error}",
                        row.clan_id
                    ))
                };
                Ok(ClanBinding {
                    tenant_id,
                    clan_id: ClanId::from_str(&row.clan_id).map_err(decode_error)?,
                    clan_name: row.clan_name.clone(),
                    admin_id: AdminId::new(row.admin_id.as_str()).map_err(decode_error)?,
                })
            })
            .collect()
    }
}
