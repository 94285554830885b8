use std::collections::BTreeSet;
use std::sync::Arc;

use ecumene_core::{Actor, AppError, AppResult, RoleId, TenantId};
use ecumene_domain::{BlacklistEntry, CommandTree};
use tracing::{debug, info};

use crate::{BlacklistRepository, PermissionGrantRepository};

mod administration;
mod blacklist;


pub use administration::{GrantOutcome, RevokeOutcome};
pub use blacklist::{BlockOutcome, UnblockOutcome};

/// Application service deciding whether actors may invoke commands.
#[derive(Clone)]
pub struct AuthorizationService {
    commands: Arc<CommandTree>,
    grants: Arc<dyn PermissionGrantRepository>,
    blacklist: Arc<dyn BlacklistRepository>,
}

/// Reason behind one authorization decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationDecision {
    /// Actor or tenant is blocked; grants were not consulted.
    Blacklisted,
    /// Actor owns or manages the tenant.
    Bypass,
    /// Actor holds a role granted on a candidate path.
    Granted(RoleId),
    /// No grant matched.
    Denied,
}

impl AuthorizationDecision {
    /// Returns whether the decision allows the invocation.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Bypass | Self::Granted(_))
    }
}

impl AuthorizationService {
    /// Creates a new authorization service.
    #[must_use]
    pub fn new(
        commands: Arc<CommandTree>,
        grants: Arc<dyn PermissionGrantRepository>,
        blacklist: Arc<dyn BlacklistRepository>,
    ) -> Self {
        Self {
            commands,
            grants,
            blacklist,
        }
    }

    /// Returns the command tree used for lineage resolution.
    #[must_use]
    pub fn commands(&self) -> &CommandTree {
        self.commands.as_ref()
    }

    /// Returns whether `actor` may invoke `command_id` in `tenant_id`.
    pub async fn is_authorized(
        &self,
        tenant_id: TenantId,
        command_id: &str,
        actor: &Actor,
    ) -> AppResult<bool> {
        Ok(self.decide(tenant_id, command_id, actor).await?.is_allowed())
    }

    /// Ensures `actor` may invoke `command_id`, failing with a gate denial otherwise.
    pub async fn require_authorized(
        &self,
        tenant_id: TenantId,
        command_id: &str,
        actor: &Actor,
    ) -> AppResult<AuthorizationDecision> {
        match self.decide(tenant_id, command_id, actor).await? {
            AuthorizationDecision::Blacklisted => Err(AppError::Blacklisted(format!(
                "actor '{}' is blocked in tenant '{tenant_id}'",
                actor.actor_id()
            ))),
            AuthorizationDecision::Denied => Err(AppError::PermissionDenied(format!(
                "actor '{}' holds no grant for '{command_id}' in tenant '{tenant_id}'",
                actor.actor_id()
            ))),
            decision => Ok(decision),
        }
    }

    /// Ensures neither `actor` nor the tenant is blacklisted.
    ///
    /// Commands without role grants still pass through this check.
    pub async fn require_not_blacklisted(
        &self,
        tenant_id: TenantId,
        actor: &Actor,
    ) -> AppResult<()> {
        if self.is_blacklisted(tenant_id, actor).await? {
            info!(
                tenant_id = %tenant_id,
                actor_id = %actor.actor_id(),
                "denied blacklisted actor on open command"
            );
            return Err(AppError::Blacklisted(format!(
                "actor '{}' is blocked in tenant '{tenant_id}'",
                actor.actor_id()
            )));
        }

        Ok(())
    }

    async fn is_blacklisted(&self, tenant_id: TenantId, actor: &Actor) -> AppResult<bool> {
        self.blacklist
            .contains_any(&BlacklistEntry::blocking_candidates(
                tenant_id,
                actor.actor_id(),
            ))
            .await
    }

    /// Resolves the full authorization decision.
    pub async fn decide(
        &self,
        tenant_id: TenantId,
        command_id: &str,
        actor: &Actor,
    ) -> AppResult<AuthorizationDecision> {
        if self.is_blacklisted(tenant_id, actor).await? {
            info!(
                tenant_id = %tenant_id,
                actor_id = %actor.actor_id(),
                command_id,
                "denied blacklisted actor"
            );
            return Ok(AuthorizationDecision::Blacklisted);
        }

        if actor.has_bypass() {
            debug!(
                tenant_id = %tenant_id,
                actor_id = %actor.actor_id(),
                command_id,
                "authorized through tenant bypass"
            );
            return Ok(AuthorizationDecision::Bypass);
        }

        let candidate_paths = self.commands.candidate_paths(command_id)?;
        debug!(
            tenant_id = %tenant_id,
            command_id,
            candidate_paths = ?candidate_paths,
            "checking role grants"
        );

        let granted_roles: BTreeSet<RoleId> = self
            .grants
            .list_roles_for_paths(tenant_id, &candidate_paths)
            .await?
            .into_iter()
            .collect();

        // Roles deleted from the tenant can never appear in the actor's set.
        let decision = actor
            .role_ids()
            .intersection(&granted_roles)
            .next()
            .map_or(AuthorizationDecision::Denied, |role_id| {
                AuthorizationDecision::Granted(*role_id)
            });

        info!(
            tenant_id = %tenant_id,
            actor_id = %actor.actor_id(),
            command_id,
            allowed = decision.is_allowed(),
            "resolved role grant check"
        );

        Ok(decision)
    }
}
