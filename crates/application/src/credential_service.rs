use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ecumene_core::{AdminId, AppError, AppResult, ClanId, TenantId};
use ecumene_domain::{ClanBinding, Credential, TokenGrant};
use tracing::{debug, info, warn};

use crate::{
    ClanBindingRepository, Clock, CredentialRepository, DeadCredential, Notifier, PlatformClient,
};


/// Timing knobs for the refresh pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Delay between passes when every refresh succeeded.
    pub interval: Duration,
    /// Delay after a pass with failures.
    pub urgent_interval: Duration,
    /// Extra margin before access expiry that still selects a credential.
    pub access_buffer: Duration,
    /// Minimum remaining refresh lifetime for a credential to be selected.
    pub refresh_buffer: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15 * 60),
            urgent_interval: Duration::from_secs(5 * 60),
            access_buffer: Duration::from_secs(5 * 60),
            refresh_buffer: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Timing knobs for the cleanup pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupPolicy {
    /// Delay between passes.
    pub interval: Duration,
    /// Refresh lifetime under which a credential counts as dead.
    pub refresh_buffer: Duration,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(24 * 60 * 60),
            refresh_buffer: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Summary of one refresh pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    /// Credentials selected for refresh.
    pub selected: usize,
    /// Credentials refreshed and stored.
    pub refreshed: usize,
    /// Credentials deleted by a concurrent cleanup before the new pair was stored.
    pub vanished: usize,
    /// Administrators whose refresh failed.
    pub failed: Vec<AdminId>,
    /// Delay before the next pass.
    pub next_delay: Duration,
}

/// Summary of one cleanup pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    /// Orphaned credentials deleted.
    pub orphans_deleted: u64,
    /// Credentials reported for re-authorization.
    pub dead: Vec<DeadCredential>,
}

/// Application service keeping delegated platform credentials usable.
#[derive(Clone)]
pub struct CredentialService {
    repository: Arc<dyn CredentialRepository>,
    bindings: Arc<dyn ClanBindingRepository>,
    platform: Arc<dyn PlatformClient>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl CredentialService {
    /// Creates a new credential service.
    #[must_use]
    pub fn new(
        repository: Arc<dyn CredentialRepository>,
        bindings: Arc<dyn ClanBindingRepository>,
        platform: Arc<dyn PlatformClient>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            bindings,
            platform,
            notifier,
            clock,
        }
    }

    /// Stores the token pair granted when an administrator delegates access.
    ///
    /// Expiries are anchored at `requested_at`, the instant the grant was requested.
    pub async fn store_delegated_credential(
        &self,
        admin_id: AdminId,
        grant: TokenGrant,
        requested_at: DateTime<Utc>,
    ) -> AppResult<Credential> {
        let credential = Credential::from_grant(admin_id, grant, requested_at)?;
        self.upsert(&credential).await?;
        info!(admin_id = %credential.admin_id, "stored delegated credential");
        Ok(credential)
    }

    /// Returns the stored credential for an administrator.
    pub async fn credential(&self, admin_id: &AdminId) -> AppResult<Credential> {
        self.repository
            .find_credential(admin_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("no credential stored for administrator '{admin_id}'"))
            })
    }

    /// Links a tenant clan to an administrator who has delegated access.
    pub async fn bind_clan(&self, binding: ClanBinding) -> AppResult<()> {
        if self
            .repository
            .find_credential(&binding.admin_id)
            .await?
            .is_none()
        {
            return Err(AppError::PreconditionFailed(format!(
                "administrator '{}' has not delegated platform access",
                binding.admin_id
            )));
        }

        self.bindings.save_binding(&binding).await?;
        info!(
            tenant_id = %binding.tenant_id,
            clan_id = %binding.clan_id,
            admin_id = %binding.admin_id,
            "bound clan to administrator credential"
        );
        Ok(())
    }

    /// Removes a clan link; the credential becomes an orphan once no link references it.
    pub async fn unbind_clan(&self, tenant_id: TenantId, clan_id: ClanId) -> AppResult<bool> {
        let removed = self.bindings.delete_binding(tenant_id, clan_id).await?;
        Ok(removed > 0)
    }

    /// Lists clans bound in a tenant.
    pub async fn clans(&self, tenant_id: TenantId) -> AppResult<Vec<ClanBinding>> {
        self.bindings.list_bindings(tenant_id).await
    }

    /// Refreshes every credential whose access token expires before the next pass.
    ///
    /// Failures are isolated per credential; the pass errors only when selection fails.
    pub async fn refresh_tokens(&self, policy: &RefreshPolicy) -> AppResult<RefreshReport> {
        let now = self.clock.now();
        let access_expires_before = offset(offset(now, policy.interval)?, policy.access_buffer)?;
        let refresh_expires_after = offset(now, policy.refresh_buffer)?;

        let selected = self
            .repository
            .list_refreshable_credentials(access_expires_before, refresh_expires_after)
            .await?;

        let mut refreshed = 0;
        let mut vanished = 0;
        let mut failed = Vec::new();
        for credential in &selected {
            match self.refresh_one(credential).await {
                Ok(()) => refreshed += 1,
                Err(AppError::NotFound(reason)) => {
                    debug!(
                        admin_id = %credential.admin_id,
                        reason,
                        "credential removed during refresh pass"
                    );
                    vanished += 1;
                }
                Err(error) => {
                    warn!(
                        admin_id = %credential.admin_id,
                        error = %error,
                        "failed to refresh delegated credential"
                    );
                    failed.push(credential.admin_id.clone());
                }
            }
        }

        if !failed.is_empty()
            && let Err(error) = self.notifier.refresh_failed(&failed).await
        {
            warn!(error = %error, "failed to notify about refresh failures");
        }

        let next_delay = if failed.is_empty() {
            policy.interval
        } else {
            policy.urgent_interval
        };
        info!(
            selected = selected.len(),
            refreshed,
            vanished,
            failed = failed.len(),
            next_delay_secs = next_delay.as_secs(),
            "completed credential refresh pass"
        );

        Ok(RefreshReport {
            selected: selected.len(),
            refreshed,
            vanished,
            failed,
            next_delay,
        })
    }

    /// Deletes orphaned credentials and reports dead ones without deleting them.
    pub async fn clean_admin_cache(&self, policy: &CleanupPolicy) -> AppResult<CleanupReport> {
        let refresh_expires_before = offset(self.clock.now(), policy.refresh_buffer)?;
        let orphans = self.repository.list_orphaned_admin_ids().await?;
        let orphans_deleted = if orphans.is_empty() {
            0
        } else {
            self.repository.delete_credentials(&orphans).await?
        };

        let dead: Vec<DeadCredential> = self
            .repository
            .list_dead_credentials(refresh_expires_before)
            .await?
            .into_iter()
            .map(|credential| DeadCredential {
                admin_id: credential.admin_id,
                refresh_expires_at: credential.refresh_expires_at,
            })
            .collect();

        if !dead.is_empty()
            && let Err(error) = self.notifier.dead_credentials(&dead).await
        {
            warn!(error = %error, "failed to notify about dead credentials");
        }

        info!(
            orphans_deleted,
            dead = dead.len(),
            "completed credential cleanup pass"
        );

        Ok(CleanupReport {
            orphans_deleted,
            dead,
        })
    }

    async fn refresh_one(&self, credential: &Credential) -> AppResult<()> {
        let requested_at = self.clock.now();
        let grant = self
            .platform
            .refresh_credential(&credential.refresh_token)
            .await?;
        let refreshed = Credential::from_grant(credential.admin_id.clone(), grant, requested_at)?;
        self.repository.update_credential(&refreshed).await
    }

    async fn upsert(&self, credential: &Credential) -> AppResult<()> {
        if self
            .repository
            .find_credential(&credential.admin_id)
            .await?
            .is_some()
        {
            self.repository.update_credential(credential).await
        } else {
            self.repository.insert_credential(credential).await
        }
    }
}

fn offset(instant: DateTime<Utc>, duration: Duration) -> AppResult<DateTime<Utc>> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|duration| instant.checked_add_signed(duration))
        .ok_or_else(|| AppError::Validation(format!("duration {duration:?} out of range")))
}
