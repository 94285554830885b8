use async_trait::async_trait;
use ecumene_core::{AppResult, RoleId, TenantId};
use ecumene_domain::{BlacklistEntry, PermissionGrant, PermissionPath};

/// Repository port for stored role grants.
#[async_trait]
pub trait PermissionGrantRepository: Send + Sync {
    /// Returns whether the exact grant is stored.
    async fn grant_exists(&self, grant: &PermissionGrant) -> AppResult<bool>;

    /// Stores one grant.
    async fn insert_grant(&self, grant: &PermissionGrant) -> AppResult<()>;

    /// Removes one grant and returns how many rows were deleted.
    async fn delete_grant(&self, grant: &PermissionGrant) -> AppResult<u64>;

    /// Lists role ids granted any of `paths` in the tenant.
    async fn list_roles_for_paths(
        &self,
        tenant_id: TenantId,
        paths: &[String],
    ) -> AppResult<Vec<RoleId>>;

    /// Lists stored paths for one role in the tenant.
    async fn list_paths_for_role(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
    ) -> AppResult<Vec<PermissionPath>>;

    /// Removes every grant held by one role.
    async fn delete_grants_for_role(&self, tenant_id: TenantId, role_id: RoleId) -> AppResult<u64>;

    /// Removes every grant on one path.
    async fn delete_grants_for_path(
        &self,
        tenant_id: TenantId,
        path: &PermissionPath,
    ) -> AppResult<u64>;

    /// Removes every grant in the tenant.
    async fn delete_grants_for_tenant(&self, tenant_id: TenantId) -> AppResult<u64>;
}

/// Repository port for block list entries.
#[async_trait]
pub trait BlacklistRepository: Send + Sync {
    /// Returns whether any of `entries` is stored.
    async fn contains_any(&self, entries: &[BlacklistEntry]) -> AppResult<bool>;

    /// Stores one entry.
    async fn insert_entry(&self, entry: &BlacklistEntry) -> AppResult<()>;

    /// Removes one entry and returns how many rows were deleted.
    async fn delete_entry(&self, entry: &BlacklistEntry) -> AppResult<u64>;
}

/// Tenant role as seen by grant administration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantRole {
    /// Role identifier.
    pub role_id: RoleId,
    /// Role carries the native "manage tenant" capability.
    pub can_manage_tenant: bool,
}
