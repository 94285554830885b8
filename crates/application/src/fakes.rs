//! In-crate fakes shared by service tests.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use ecumene_core::{AdminId, AppError, AppResult, ClanId, RoleId, TenantId};
use ecumene_domain::{
    AuditRecord, AuditStatus, BlacklistEntry, ClanBinding, CommandNode, CommandTree, Credential,
    PermissionGrant, PermissionPath, TokenGrant,
};
use tokio::sync::Mutex;

use crate::{
    AuditRecordQuery, AuditRecordRepository, BlacklistRepository, ClanBindingRepository,
    CredentialRepository, DeadCredential, Notifier, PermissionGrantRepository, PlatformClient,
};

pub(crate) fn epoch() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000)
        .single()
        .unwrap_or_default()
}

pub(crate) fn admin(value: &str) -> AdminId {
    AdminId::new(value).unwrap_or_else(|error| panic!("invalid admin fixture: {error}"))
}

pub(crate) fn path(value: &str) -> PermissionPath {
    PermissionPath::parse(value).unwrap_or_else(|error| panic!("invalid path fixture: {error}"))
}

pub(crate) fn bot_commands() -> CommandTree {
    CommandTree::new([
        CommandNode::root_group("guild"),
        CommandNode::command("guild", "grant"),
        CommandNode::command("guild", "revoke"),
        CommandNode::group("guild", "clear"),
        CommandNode::command("guild.clear", "role"),
        CommandNode::command("guild.clear", "all"),
        CommandNode::root_group("clan"),
        CommandNode::command("clan", "kick"),
        CommandNode::command("clan", "list"),
        CommandNode::root_command("ping"),
    ])
    .unwrap_or_else(|error| panic!("invalid command fixture: {error}"))
}

#[derive(Default)]
pub(crate) struct FakeStore {
    pub(crate) grants: Mutex<BTreeSet<PermissionGrant>>,
    pub(crate) blacklist: Mutex<BTreeSet<BlacklistEntry>>,
    pub(crate) records: Mutex<BTreeMap<String, AuditRecord>>,
    pub(crate) credentials: Mutex<BTreeMap<AdminId, Credential>>,
    pub(crate) bindings: Mutex<BTreeMap<(TenantId, ClanId), ClanBinding>>,
    pub(crate) fail_writes: Mutex<bool>,
}

impl FakeStore {
    async fn check_writable(&self) -> AppResult<()> {
        if *self.fail_writes.lock().await {
            return Err(AppError::Store("datastore unavailable".to_owned()));
        }
        Ok(())
    }

    pub(crate) async fn record(&self, record_id: &str) -> Option<AuditRecord> {
        self.records.lock().await.get(record_id).cloned()
    }
}

#[async_trait]
impl PermissionGrantRepository for FakeStore {
    async fn grant_exists(&self, grant: &PermissionGrant) -> AppResult<bool> {
        Ok(self.grants.lock().await.contains(grant))
    }

    async fn insert_grant(&self, grant: &PermissionGrant) -> AppResult<()> {
        self.check_writable().await?;
        self.grants.lock().await.insert(grant.clone());
        Ok(())
    }

    async fn delete_grant(&self, grant: &PermissionGrant) -> AppResult<u64> {
        Ok(u64::from(self.grants.lock().await.remove(grant)))
    }

    async fn list_roles_for_paths(
        &self,
        tenant_id: TenantId,
        paths: &[String],
    ) -> AppResult<Vec<RoleId>> {
        Ok(self
            .grants
            .lock()
            .await
            .iter()
            .filter(|grant| {
                grant.tenant_id == tenant_id
                    && paths.iter().any(|value| value == grant.path.as_str())
            })
            .map(|grant| grant.role_id)
            .collect())
    }

    async fn list_paths_for_role(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
    ) -> AppResult<Vec<PermissionPath>> {
        Ok(self
            .grants
            .lock()
            .await
            .iter()
            .filter(|grant| grant.tenant_id == tenant_id && grant.role_id == role_id)
            .map(|grant| grant.path.clone())
            .collect())
    }

    async fn delete_grants_for_role(&self, tenant_id: TenantId, role_id: RoleId) -> AppResult<u64> {
        let mut grants = self.grants.lock().await;
        let before = grants.len();
        grants.retain(|grant| !(grant.tenant_id == tenant_id && grant.role_id == role_id));
        Ok((before - grants.len()) as u64)
    }

    async fn delete_grants_for_path(
        &self,
        tenant_id: TenantId,
        path: &PermissionPath,
    ) -> AppResult<u64> {
        let mut grants = self.grants.lock().await;
        let before = grants.len();
        grants.retain(|grant| !(grant.tenant_id == tenant_id && &grant.path == path));
        Ok((before - grants.len()) as u64)
    }

    async fn delete_grants_for_tenant(&self, tenant_id: TenantId) -> AppResult<u64> {
        let mut grants = self.grants.lock().await;
        let before = grants.len();
        grants.retain(|grant| grant.tenant_id != tenant_id);
        Ok((before - grants.len()) as u64)
    }
}

#[async_trait]
impl BlacklistRepository for FakeStore {
    async fn contains_any(&self, entries: &[BlacklistEntry]) -> AppResult<bool> {
        let blacklist = self.blacklist.lock().await;
        Ok(entries.iter().any(|entry| blacklist.contains(entry)))
    }

    async fn insert_entry(&self, entry: &BlacklistEntry) -> AppResult<()> {
        self.blacklist.lock().await.insert(*entry);
        Ok(())
    }

    async fn delete_entry(&self, entry: &BlacklistEntry) -> AppResult<u64> {
        Ok(u64::from(self.blacklist.lock().await.remove(entry)))
    }
}

#[async_trait]
impl AuditRecordRepository for FakeStore {
    async fn insert_record(&self, record: &AuditRecord) -> AppResult<()> {
        self.check_writable().await?;
        let mut records = self.records.lock().await;
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
        self.check_writable().await?;
        let mut records = self.records.lock().await;
        match records.get_mut(record_id) {
            Some(record) if record.status == AuditStatus::Pending => {
                record.status = status;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn expire_pending_before(&self, invoked_before: DateTime<Utc>) -> AppResult<u64> {
        let mut expired = 0;
        for record in self.records.lock().await.values_mut() {
            if record.status == AuditStatus::Pending && record.invoked_at <= invoked_before {
                record.status = AuditStatus::ExpiredOrUnhandled;
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn list_records(
        &self,
        tenant_id: TenantId,
        query: &AuditRecordQuery,
    ) -> AppResult<Vec<AuditRecord>> {
        let mut records: Vec<AuditRecord> = self
            .records
            .lock()
            .await
            .values()
            .filter(|record| record.tenant_id == tenant_id && query.matches(record))
            .cloned()
            .collect();
        records.sort_by(|left, right| right.invoked_at.cmp(&left.invoked_at));
        Ok(records)
    }
}

#[async_trait]
impl CredentialRepository for FakeStore {
    async fn find_credential(&self, admin_id: &AdminId) -> AppResult<Option<Credential>> {
        Ok(self.credentials.lock().await.get(admin_id).cloned())
    }

    async fn insert_credential(&self, credential: &Credential) -> AppResult<()> {
        self.check_writable().await?;
        self.credentials
            .lock()
            .await
            .insert(credential.admin_id.clone(), credential.clone());
        Ok(())
    }

    async fn update_credential(&self, credential: &Credential) -> AppResult<()> {
        self.check_writable().await?;
        match self.credentials.lock().await.get_mut(&credential.admin_id) {
            Some(stored) => {
                *stored = credential.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(format!(
                "credential for '{}' was removed before it could be updated",
                credential.admin_id
            ))),
        }
    }

    async fn list_refreshable_credentials(
        &self,
        access_expires_before: DateTime<Utc>,
        refresh_expires_after: DateTime<Utc>,
    ) -> AppResult<Vec<Credential>> {
        Ok(self
            .credentials
            .lock()
            .await
            .values()
            .filter(|credential| {
                credential.access_expires_at <= access_expires_before
                    && credential.refresh_expires_at > refresh_expires_after
                    && !credential.refresh_token.is_empty()
            })
            .cloned()
            .collect())
    }

    async fn list_dead_credentials(
        &self,
        refresh_expires_before: DateTime<Utc>,
    ) -> AppResult<Vec<Credential>> {
        Ok(self
            .credentials
            .lock()
            .await
            .values()
            .filter(|credential| {
                credential.refresh_token.is_empty()
                    || credential.refresh_expires_at <= refresh_expires_before
            })
            .cloned()
            .collect())
    }

    async fn list_orphaned_admin_ids(&self) -> AppResult<Vec<AdminId>> {
        let bound: BTreeSet<AdminId> = self
            .bindings
            .lock()
            .await
            .values()
            .map(|binding| binding.admin_id.clone())
            .collect();
        Ok(self
            .credentials
            .lock()
            .await
            .keys()
            .filter(|admin_id| !bound.contains(*admin_id))
            .cloned()
            .collect())
    }

    async fn delete_credentials(&self, admin_ids: &[AdminId]) -> AppResult<u64> {
        let mut credentials = self.credentials.lock().await;
        Ok(admin_ids
            .iter()
            .filter(|admin_id| credentials.remove(*admin_id).is_some())
            .count() as u64)
    }
}

#[async_trait]
impl ClanBindingRepository for FakeStore {
    async fn save_binding(&self, binding: &ClanBinding) -> AppResult<()> {
        self.bindings
            .lock()
            .await
            .insert((binding.tenant_id, binding.clan_id), binding.clone());
        Ok(())
    }

    async fn delete_binding(&self, tenant_id: TenantId, clan_id: ClanId) -> AppResult<u64> {
        Ok(u64::from(
            self.bindings
                .lock()
                .await
                .remove(&(tenant_id, clan_id))
                .is_some(),
        ))
    }

    async fn list_bindings(&self, tenant_id: TenantId) -> AppResult<Vec<ClanBinding>> {
        Ok(self
            .bindings
            .lock()
            .await
            .values()
            .filter(|binding| binding.tenant_id == tenant_id)
            .cloned()
            .collect())
    }
}

/// Platform fake answering per refresh token, failing unknown tokens.
#[derive(Default)]
pub(crate) struct FakePlatformClient {
    pub(crate) grants: Mutex<HashMap<String, TokenGrant>>,
    pub(crate) calls: Mutex<VecDeque<String>>,
}

#[async_trait]
impl PlatformClient for FakePlatformClient {
    async fn refresh_credential(&self, refresh_token: &str) -> AppResult<TokenGrant> {
        self.calls.lock().await.push_back(refresh_token.to_owned());
        self.grants
            .lock()
            .await
            .get(refresh_token)
            .cloned()
            .ok_or_else(|| AppError::Provider {
                status: 400,
                description: "AuthorizationRecordExpired".to_owned(),
            })
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub(crate) refresh_failures: Mutex<Vec<Vec<AdminId>>>,
    pub(crate) dead: Mutex<Vec<Vec<DeadCredential>>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn refresh_failed(&self, admin_ids: &[AdminId]) -> AppResult<()> {
        self.refresh_failures.lock().await.push(admin_ids.to_vec());
        Ok(())
    }

    async fn dead_credentials(&self, credentials: &[DeadCredential]) -> AppResult<()> {
        self.dead.lock().await.push(credentials.to_vec());
        Ok(())
    }
}
