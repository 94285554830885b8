use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ecumene_core::{AdminId, AppResult, ClanId, TenantId};
use ecumene_domain::{ClanBinding, Credential, TokenGrant};

/// Repository port for delegated credentials.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Finds one credential by administrator.
    async fn find_credential(&self, admin_id: &AdminId) -> AppResult<Option<Credential>>;

    /// Inserts a new credential.
    async fn insert_credential(&self, credential: &Credential) -> AppResult<()>;

    /// Overwrites token values of an existing credential.
    async fn update_credential(&self, credential: &Credential) -> AppResult<()>;

    /// Lists credentials whose access token expires at or before `access_expires_before`
    /// and whose non-empty refresh token outlives `refresh_expires_after`.
    async fn list_refreshable_credentials(
        &self,
        access_expires_before: DateTime<Utc>,
        refresh_expires_after: DateTime<Utc>,
    ) -> AppResult<Vec<Credential>>;

    /// Lists credentials whose refresh token is empty or expires at or before
    /// `refresh_expires_before`.
    async fn list_dead_credentials(
        &self,
        refresh_expires_before: DateTime<Utc>,
    ) -> AppResult<Vec<Credential>>;

    /// Lists administrators whose credential no clan binding references.
    async fn list_orphaned_admin_ids(&self) -> AppResult<Vec<AdminId>>;

    /// Deletes credentials and returns how many rows were removed.
    async fn delete_credentials(&self, admin_ids: &[AdminId]) -> AppResult<u64>;
}

/// Repository port for links between tenant clans and administrator credentials.
#[async_trait]
pub trait ClanBindingRepository: Send + Sync {
    /// Stores or replaces the binding for one tenant clan.
    async fn save_binding(&self, binding: &ClanBinding) -> AppResult<()>;

    /// Removes one binding and returns how many rows were removed.
    async fn delete_binding(&self, tenant_id: TenantId, clan_id: ClanId) -> AppResult<u64>;

    /// Lists bindings in one tenant ordered by clan name.
    async fn list_bindings(&self, tenant_id: TenantId) -> AppResult<Vec<ClanBinding>>;
}

/// External platform client used to exchange refresh tokens.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Exchanges a refresh token for a new token pair.
    async fn refresh_credential(&self, refresh_token: &str) -> AppResult<TokenGrant>;
}

/// Credential that can no longer be refreshed and needs re-authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadCredential {
    /// Administrator holding the credential.
    pub admin_id: AdminId,
    /// When the refresh token expired or will expire.
    pub refresh_expires_at: DateTime<Utc>,
}

/// Outbound notification port for credential problems.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Reports administrators whose refresh failed in a pass.
    async fn refresh_failed(&self, admin_ids: &[AdminId]) -> AppResult<()>;

    /// Reports credentials that require a human re-authorization.
    async fn dead_credentials(&self, credentials: &[DeadCredential]) -> AppResult<()>;
}
