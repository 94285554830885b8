use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use ecumene_application::{
    AuditRecordQuery, AuditRecordRepository, BlacklistRepository, ClanBindingRepository,
    CredentialRepository, PermissionGrantRepository,
};
use ecumene_core::{AdminId, AppError, AppResult, ClanId, RoleId, TenantId};
use ecumene_domain::{
    AuditRecord, AuditStatus, BlacklistEntry, ClanBinding, Credential, PermissionGrant,
    PermissionPath,
};


type RoleGrants = BTreeMap<RoleId, BTreeSet<PermissionPath>>;

/// In-memory store implementing every persistence port, for local runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    grants: RwLock<HashMap<TenantId, RoleGrants>>,
    blacklist: RwLock<HashSet<BlacklistEntry>>,
    audit_records: RwLock<HashMap<String, AuditRecord>>,
    credentials: RwLock<HashMap<AdminId, Credential>>,
    clan_bindings: RwLock<HashMap<TenantId, BTreeMap<ClanId, ClanBinding>>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn count(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

#[async_trait]
impl PermissionGrantRepository for InMemoryStore {
    async fn grant_exists(&self, grant: &PermissionGrant) -> AppResult<bool> {
        let grants = self.grants.read().await;

        Ok(grants
            .get(&grant.tenant_id)
            .and_then(|roles| roles.get(&grant.role_id))
            .is_some_and(|paths| paths.contains(&grant.path)))
    }

    async fn insert_grant(&self, grant: &PermissionGrant) -> AppResult<()> {
        self.grants
            .write()
            .await
            .entry(grant.tenant_id)
            .or_default()
            .entry(grant.role_id)
            .or_default()
            .insert(grant.path.clone());
        Ok(())
    }

    async fn delete_grant(&self, grant: &PermissionGrant) -> AppResult<u64> {
        let mut grants = self.grants.write().await;
        let Some(roles) = grants.get_mut(&grant.tenant_id) else {
            return Ok(0);
        };
        let Some(paths) = roles.get_mut(&grant.role_id) else {
            return Ok(0);
        };

        let removed = paths.remove(&grant.path);
        if paths.is_empty() {
            roles.remove(&grant.role_id);
        }

        Ok(u64::from(removed))
    }

    async fn list_roles_for_paths(
        &self,
        tenant_id: TenantId,
        paths: &[String],
    ) -> AppResult<Vec<RoleId>> {
        let grants = self.grants.read().await;
        let Some(roles) = grants.get(&tenant_id) else {
            return Ok(Vec::new());
        };

        Ok(roles
            .iter()
            .filter(|(_, granted)| {
                granted
                    .iter()
                    .any(|path| paths.iter().any(|candidate| candidate == path.as_str()))
            })
            .map(|(role_id, _)| *role_id)
            .collect())
    }

    async fn list_paths_for_role(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
    ) -> AppResult<Vec<PermissionPath>> {
        let grants = self.grants.read().await;

        Ok(grants
            .get(&tenant_id)
            .and_then(|roles| roles.get(&role_id))
            .map(|paths| paths.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_grants_for_role(&self, tenant_id: TenantId, role_id: RoleId) -> AppResult<u64> {
        let mut grants = self.grants.write().await;

        Ok(grants
            .get_mut(&tenant_id)
            .and_then(|roles| roles.remove(&role_id))
            .map_or(0, |paths| count(paths.len())))
    }

    async fn delete_grants_for_path(
        &self,
        tenant_id: TenantId,
        path: &PermissionPath,
    ) -> AppResult<u64> {
        let mut grants = self.grants.write().await;
        let Some(roles) = grants.get_mut(&tenant_id) else {
            return Ok(0);
        };

        let mut removed = 0;
        for paths in roles.values_mut() {
            removed += u64::from(paths.remove(path));
        }
        roles.retain(|_, paths| !paths.is_empty());

        Ok(removed)
    }

    async fn delete_grants_for_tenant(&self, tenant_id: TenantId) -> AppResult<u64> {
        let removed = self.grants.write().await.remove(&tenant_id);

        Ok(removed.map_or(0, |roles| {
            roles.values().map(|paths| count(paths.len())).sum()
        }))
    }
}

#[async_trait]
impl BlacklistRepository for InMemoryStore {
    async fn contains_any(&self, entries: &[BlacklistEntry]) -> AppResult<bool> {
        let blacklist = self.blacklist.read().await;
        Ok(entries.iter().any(|entry| blacklist.contains(entry)))
    }

    async fn insert_entry(&self, entry: &BlacklistEntry) -> AppResult<()> {
        self.blacklist.write().await.insert(*entry);
        Ok(())
    }

    async fn delete_entry(&self, entry: &BlacklistEntry) -> AppResult<u64> {
        Ok(u64::from(self.blacklist.write().await.remove(entry)))
    }
}

#[async_trait]
impl AuditRecordRepository for InMemoryStore {
    async fn insert_record(&self, record: &AuditRecord) -> AppResult<()> {
        let mut records = self.audit_records.write().await;

        if records.contains_key(&record.record_id) {
            return Err(AppError::Conflict(format!(
                "audit record '{}' already exists",
                record.record_id
            )));
        }

        records.insert(record.record_id.clone(), record.clone());
        Ok(())
    }

    async fn update_pending_status(&self, record_id: &str, status: AuditStatus) -> AppResult<u64> {
        let mut records = self.audit_records.write().await;

        Ok(match records.get_mut(record_id) {
            Some(record) if record.status == AuditStatus::Pending => {
                record.status = status;
                1
            }
            _ => 0,
        })
    }

    async fn expire_pending_before(&self, invoked_before: DateTime<Utc>) -> AppResult<u64> {
        let mut records = self.audit_records.write().await;
        let mut expired = 0;

        for record in records
            .values_mut()
            .filter(|record| record.status == AuditStatus::Pending)
            .filter(|record| record.invoked_at <= invoked_before)
        {
            record.status = AuditStatus::ExpiredOrUnhandled;
            expired += 1;
        }

        Ok(expired)
    }

    async fn list_records(
        &self,
        tenant_id: TenantId,
        query: &AuditRecordQuery,
    ) -> AppResult<Vec<AuditRecord>> {
        let records = self.audit_records.read().await;

        let mut values: Vec<AuditRecord> = records
            .values()
            .filter(|record| record.tenant_id == tenant_id && query.matches(record))
            .cloned()
            .collect();
        values.sort_by(|left, right| {
            right
                .invoked_at
                .cmp(&left.invoked_at)
                .then_with(|| left.record_id.cmp(&right.record_id))
        });

        Ok(values)
    }
}

#[async_trait]
impl CredentialRepository for InMemoryStore {
    async fn find_credential(&self, admin_id: &AdminId) -> AppResult<Option<Credential>> {
        Ok(self.credentials.read().await.get(admin_id).cloned())
    }

    async fn insert_credential(&self, credential: &Credential) -> AppResult<()> {
        self.credentials
            .write()
            .await
            .insert(credential.admin_id.clone(), credential.clone());
        Ok(())
    }

    async fn update_credential(&self, credential: &Credential) -> AppResult<()> {
        let mut credentials = self.credentials.write().await;
        let Some(stored) = credentials.get_mut(&credential.admin_id) else {
            return Err(AppError::NotFound(format!(
                "credential for '{}' was removed before it could be updated",
                credential.admin_id
            )));
        };

        *stored = credential.clone();
        Ok(())
    }

    async fn list_refreshable_credentials(
        &self,
        access_expires_before: DateTime<Utc>,
        refresh_expires_after: DateTime<Utc>,
    ) -> AppResult<Vec<Credential>> {
        let credentials = self.credentials.read().await;

        let mut values: Vec<Credential> = credentials
            .values()
            .filter(|credential| {
                credential.access_expires_at <= access_expires_before
                    && credential.refresh_expires_at > refresh_expires_after
                    && !credential.refresh_token.is_empty()
            })
            .cloned()
            .collect();
        values.sort_by_key(|credential| credential.access_expires_at);

        Ok(values)
    }

    async fn list_dead_credentials(
        &self,
        refresh_expires_before: DateTime<Utc>,
    ) -> AppResult<Vec<Credential>> {
        let credentials = self.credentials.read().await;

        let mut values: Vec<Credential> = credentials
            .values()
            .filter(|credential| {
                credential.refresh_token.is_empty()
                    || credential.refresh_expires_at <= refresh_expires_before
            })
            .cloned()
            .collect();
        values.sort_by_key(|credential| credential.refresh_expires_at);

        Ok(values)
    }

    async fn list_orphaned_admin_ids(&self) -> AppResult<Vec<AdminId>> {
        let bound: HashSet<AdminId> = self
            .clan_bindings
            .read()
            .await
            .values()
            .flat_map(BTreeMap::values)
            .map(|binding| binding.admin_id.clone())
            .collect();

        let mut orphans: Vec<AdminId> = self
            .credentials
            .read()
            .await
            .keys()
            .filter(|admin_id| !bound.contains(*admin_id))
            .cloned()
            .collect();
        orphans.sort();

        Ok(orphans)
    }

    async fn delete_credentials(&self, admin_ids: &[AdminId]) -> AppResult<u64> {
        let mut credentials = self.credentials.write().await;
        let mut removed = 0;

        for admin_id in admin_ids {
            if credentials.remove(admin_id).is_some() {
                removed += 1;
            }
        }

        Ok(removed)
    }
}

#[async_trait]
impl ClanBindingRepository for InMemoryStore {
    async fn save_binding(&self, binding: &ClanBinding) -> AppResult<()> {
        self.clan_bindings
            .write()
            .await
            .entry(binding.tenant_id)
            .or_default()
            .insert(binding.clan_id, binding.clone());
        Ok(())
    }

    async fn delete_binding(&self, tenant_id: TenantId, clan_id: ClanId) -> AppResult<u64> {
        let mut bindings = self.clan_bindings.write().await;

        Ok(bindings
            .get_mut(&tenant_id)
            .and_then(|clans| clans.remove(&clan_id))
            .map_or(0, |_| 1))
    }

    async fn list_bindings(&self, tenant_id: TenantId) -> AppResult<Vec<ClanBinding>> {
        let bindings = self.clan_bindings.read().await;

        let mut values: Vec<ClanBinding> = bindings
            .get(&tenant_id)
            .map(|clans| clans.values().cloned().collect())
            .unwrap_or_default();
        values.sort_by(|left, right| {
            left.clan_name
                .cmp(&right.clan_name)
                .then_with(|| left.clan_id.cmp(&right.clan_id))
        });

        Ok(values)
    }
}
