use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{ActorId, RoleId, TenantId};

/// Invoking principal as supplied by the host bot framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    actor_id: ActorId,
    tenant_id: TenantId,
    role_ids: BTreeSet<RoleId>,
    is_tenant_owner: bool,
    can_manage_tenant: bool,
}

impl Actor {
    /// Creates an actor without bypass capabilities.
    #[must_use]
    pub fn new(
        actor_id: ActorId,
        tenant_id: TenantId,
        role_ids: impl IntoIterator<Item = RoleId>,
    ) -> Self {
        Self {
            actor_id,
            tenant_id,
            role_ids: role_ids.into_iter().collect(),
            is_tenant_owner: false,
            can_manage_tenant: false,
        }
    }

    /// Marks the actor as the tenant owner.
    #[must_use]
    pub fn with_tenant_owner(mut self, is_tenant_owner: bool) -> Self {
        self.is_tenant_owner = is_tenant_owner;
        self
    }

    /// Marks the actor as holding the native "manage tenant" capability.
    #[must_use]
    pub fn with_manage_tenant(mut self, can_manage_tenant: bool) -> Self {
        self.can_manage_tenant = can_manage_tenant;
        self
    }

    /// Returns the actor identifier.
    #[must_use]
    pub fn actor_id(&self) -> ActorId {
        self.actor_id
    }

    /// Returns the tenant the actor invoked from.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the roles held by the actor in the tenant.
    #[must_use]
    pub fn role_ids(&self) -> &BTreeSet<RoleId> {
        &self.role_ids
    }

    /// Returns whether the actor holds a built-in bypass capability.
    #[must_use]
    pub fn has_bypass(&self) -> bool {
        self.is_tenant_owner || self.can_manage_tenant
    }
}
