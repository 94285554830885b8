use std::str::FromStr;

use async_trait::async_trait;

use ecumene_application::PermissionGrantRepository;
use ecumene_core::{AppError, AppResult, RoleId, TenantId};
use ecumene_domain::{PermissionGrant, PermissionPath};

use sqlx::{FromRow, PgPool};

#[cfg(test)]
mod tests;

/// PostgreSQL-backed repository for role permission grants.
#[derive(Clone)]
pub struct PostgresGrantRepository {
    pool: PgPool,
}

impl PostgresGrantRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    role_id: String,
}

#[derive(Debug, FromRow)]
struct PathRow {
    permission_path: String,
}

#[async_trait]
impl PermissionGrantRepository for PostgresGrantRepository {
    async fn grant_exists(&self, grant: &PermissionGrant) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM permission_grant
                WHERE tenant_id = $1
                    AND role_id = $2
                    AND permission_path = $3
            )
            "#,
        )
        .bind(grant.tenant_id.to_string())
        .bind(grant.role_id.to_string())
        .bind(grant.path.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to look up grant: {error}")))
    }

    async fn insert_grant(&self, grant: &PermissionGrant) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO permission_grant (tenant_id, role_id, permission_path)
            VALUES ($1, $2, $3)
            ON CONFLICT (tenant_id, role_id, permission_path) DO NOTHING
            "#,
        )
        .bind(grant.tenant_id.to_string())
        .bind(grant.role_id.to_string())
        .bind(grant.path.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to insert grant: {error}")))?;

        Ok(())
    }

    async fn delete_grant(&self, grant: &PermissionGrant) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM permission_grant
            WHERE tenant_id = $1
                AND role_id = $2
                AND permission_path = $3
            "#,
        )
        .bind(grant.tenant_id.to_string())
        .bind(grant.role_id.to_string())
        .bind(grant.path.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to delete grant: {error}")))?;

        Ok(result.rows_affected())
    }

    async fn list_roles_for_paths(
        &self,
        tenant_id: TenantId,
        paths: &[String],
    ) -> AppResult<Vec<RoleId>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT DISTINCT role_id
            FROM permission_grant
            WHERE tenant_id = $1
                AND permission_path = ANY($2)
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(paths)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to load granted roles: {error}")))?;

        rows.into_iter()
            .map(|row| {
                RoleId::from_str(row.role_id.as_str()).map_err(|error| {
                    AppError::Internal(format!(
                        "failed to decode role '{}' for tenant '{tenant_id}': {error}",
                        row.role_id
                    ))
                })
            })
            .collect()
    }

    async fn list_paths_for_role(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
    ) -> AppResult<Vec<PermissionPath>> {
        let rows = sqlx::query_as::<_, PathRow>(
            r#"
            SELECT permission_path
            FROM permission_grant
            WHERE tenant_id = $1
                AND role_id = $2
            ORDER BY permission_path
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(role_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to load role grants: {error}")))?;

        rows.into_iter()
            .map(|row| {
                PermissionPath::parse(row.permission_path.as_str()).map_err(|error| {
                    AppError::Internal(format!(
                        "failed to decode permission path '{}' for role '{role_id}': {error}",
                        row.permission_path
                    ))
                })
            })
            .collect()
    }

    async fn delete_grants_for_role(&self, tenant_id: TenantId, role_id: RoleId) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM permission_grant
            WHERE tenant_id = $1
                AND role_id = $2
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(role_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to clear role grants: {error}")))?;

        Ok(result.rows_affected())
    }

    async fn delete_grants_for_path(
        &self,
        tenant_id: TenantId,
        path: &PermissionPath,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM permission_grant
            WHERE tenant_id = $1
                AND permission_path = $2
            "#,
        )
        .bind(tenant_id.to_string())
        .bind(path.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to clear command grants: {error}")))?;

        Ok(result.rows_affected())
    }

    async fn delete_grants_for_tenant(&self, tenant_id: TenantId) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM permission_grant
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to clear tenant grants: {error}")))?;

        Ok(result.rows_affected())
    }
}
