use ecumene_core::{Actor, ActorId, AppError, AppResult, TenantId};
use ecumene_domain::{BlacklistEntry, BlacklistScope, BlockedSubject};
use tracing::info;

use super::AuthorizationService;

/// Result of a block request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// The entry was stored.
    Blocked,
    /// The entry already existed.
    AlreadyBlocked,
}

/// Result of an unblock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnblockOutcome {
    /// The entry was removed.
    Unblocked,
    /// No entry existed.
    NotBlocked,
}

impl AuthorizationService {
    /// Blocks `target` in the tenant on behalf of `actor`.
    ///
    /// Actors cannot block themselves, the tenant owner, or a manager.
    pub async fn block_actor(&self, actor: &Actor, target: &Actor) -> AppResult<BlockOutcome> {
        if actor.actor_id() == target.actor_id() {
            return Err(AppError::Validation(
                "actors cannot block themselves".to_owned(),
            ));
        }
        if target.has_bypass() {
            return Err(AppError::PermissionDenied(format!(
                "actor '{}' owns or manages tenant '{}' and cannot be blocked",
                target.actor_id(),
                actor.tenant_id()
            )));
        }

        let entry = BlacklistEntry {
            scope: BlacklistScope::Tenant(actor.tenant_id()),
            subject: BlockedSubject::Actor(target.actor_id()),
        };
        let outcome = self.insert_blacklist_entry(entry).await?;
        info!(
            tenant_id = %actor.tenant_id(),
            actor_id = %actor.actor_id(),
            target_id = %target.actor_id(),
            outcome = ?outcome,
            "processed tenant block request"
        );

        Ok(outcome)
    }

    /// Removes a tenant-scoped block on `target_id`.
    pub async fn unblock_actor(
        &self,
        tenant_id: TenantId,
        target_id: ActorId,
    ) -> AppResult<UnblockOutcome> {
        self.delete_blacklist_entry(BlacklistEntry {
            scope: BlacklistScope::Tenant(tenant_id),
            subject: BlockedSubject::Actor(target_id),
        })
        .await
    }

    /// Blocks an actor or a whole tenant everywhere.
    pub async fn block_globally(&self, subject: BlockedSubject) -> AppResult<BlockOutcome> {
        self.insert_blacklist_entry(BlacklistEntry {
            scope: BlacklistScope::Global,
            subject,
        })
        .await
    }

    /// Removes a global block.
    pub async fn unblock_globally(&self, subject: BlockedSubject) -> AppResult<UnblockOutcome> {
        self.delete_blacklist_entry(BlacklistEntry {
            scope: BlacklistScope::Global,
            subject,
        })
        .await
    }

    async fn insert_blacklist_entry(&self, entry: BlacklistEntry) -> AppResult<BlockOutcome> {
        if self.blacklist.contains_any(&[entry]).await? {
            return Ok(BlockOutcome::AlreadyBlocked);
        }

        self.blacklist.insert_entry(&entry).await?;
        Ok(BlockOutcome::Blocked)
    }

    async fn delete_blacklist_entry(&self, entry: BlacklistEntry) -> AppResult<UnblockOutcome> {
        if !self.blacklist.contains_any(&[entry]).await? {
            return Ok(UnblockOutcome::NotBlocked);
        }

        self.blacklist.delete_entry(&entry).await?;
        info!(
            scope = %entry.scope.storage_value(),
            subject_kind = entry.subject.kind(),
            subject_id = entry.subject.raw_id(),
            "removed blacklist entry"
        );
        Ok(UnblockOutcome::Unblocked)
    }
}
