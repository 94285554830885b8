use std::collections::BTreeSet;

use ecumene_core::{AppResult, RoleId, TenantId};
use ecumene_domain::{PermissionGrant, PermissionPath};
use tracing::info;

use crate::TenantRole;

use super::AuthorizationService;

/// Result of a grant request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    /// A new grant was stored.
    Granted,
    /// The grant already existed; nothing changed.
    AlreadyGranted,
    /// The role manages the tenant and needs no grant.
    RoleBypasses,
}

/// Result of a revoke request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    /// The grant was removed.
    Revoked,
    /// No such grant was stored; nothing changed.
    NothingToRevoke,
    /// The role manages the tenant and cannot be restricted by grants.
    RoleBypasses,
}

impl AuthorizationService {
    /// Grants `path` to `role` in the tenant.
    pub async fn grant(
        &self,
        tenant_id: TenantId,
        role: TenantRole,
        path: &PermissionPath,
    ) -> AppResult<GrantOutcome> {
        self.commands.validate_path(path)?;

        if role.can_manage_tenant {
            return Ok(GrantOutcome::RoleBypasses);
        }

        let grant = PermissionGrant {
            tenant_id,
            role_id: role.role_id,
            path: path.clone(),
        };
        if self.grants.grant_exists(&grant).await? {
            return Ok(GrantOutcome::AlreadyGranted);
        }

        self.grants.insert_grant(&grant).await?;
        info!(
            tenant_id = %tenant_id,
            role_id = %role.role_id,
            path = %path,
            "granted command permission"
        );

        Ok(GrantOutcome::Granted)
    }

    /// Revokes `path` from `role` in the tenant.
    pub async fn revoke(
        &self,
        tenant_id: TenantId,
        role: TenantRole,
        path: &PermissionPath,
    ) -> AppResult<RevokeOutcome> {
        self.commands.validate_path(path)?;

        if role.can_manage_tenant {
            return Ok(RevokeOutcome::RoleBypasses);
        }

        let grant = PermissionGrant {
            tenant_id,
            role_id: role.role_id,
            path: path.clone(),
        };
        if !self.grants.grant_exists(&grant).await? {
            return Ok(RevokeOutcome::NothingToRevoke);
        }

        self.grants.delete_grant(&grant).await?;
        info!(
            tenant_id = %tenant_id,
            role_id = %role.role_id,
            path = %path,
            "revoked command permission"
        );

        Ok(RevokeOutcome::Revoked)
    }

    /// Removes every grant held by `role_id`.
    pub async fn clear_role(&self, tenant_id: TenantId, role_id: RoleId) -> AppResult<u64> {
        let removed = self.grants.delete_grants_for_role(tenant_id, role_id).await?;
        info!(tenant_id = %tenant_id, role_id = %role_id, removed, "cleared role grants");
        Ok(removed)
    }

    /// Removes every grant on `path`.
    pub async fn clear_command(&self, tenant_id: TenantId, path: &PermissionPath) -> AppResult<u64> {
        self.commands.validate_path(path)?;
        let removed = self.grants.delete_grants_for_path(tenant_id, path).await?;
        info!(tenant_id = %tenant_id, path = %path, removed, "cleared command grants");
        Ok(removed)
    }

    /// Removes every grant in the tenant.
    pub async fn clear_all(&self, tenant_id: TenantId) -> AppResult<u64> {
        let removed = self.grants.delete_grants_for_tenant(tenant_id).await?;
        info!(tenant_id = %tenant_id, removed, "cleared all tenant grants");
        Ok(removed)
    }

    /// Lists roles able to run `command_id` through any candidate path.
    ///
    /// Grants held by roles missing from `existing_roles` are skipped.
    pub async fn roles_for_command(
        &self,
        tenant_id: TenantId,
        command_id: &str,
        existing_roles: &BTreeSet<RoleId>,
    ) -> AppResult<Vec<RoleId>> {
        let candidate_paths = self.commands.candidate_paths(command_id)?;
        let roles: BTreeSet<RoleId> = self
            .grants
            .list_roles_for_paths(tenant_id, &candidate_paths)
            .await?
            .into_iter()
            .filter(|role_id| existing_roles.contains(role_id))
            .collect();

        Ok(roles.into_iter().collect())
    }

    /// Lists paths stored for `role_id`.
    pub async fn paths_for_role(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
    ) -> AppResult<Vec<PermissionPath>> {
        let mut paths = self.grants.list_paths_for_role(tenant_id, role_id).await?;
        paths.sort();
        paths.dedup();
        Ok(paths)
    }
}
