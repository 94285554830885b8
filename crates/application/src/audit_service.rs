use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use ecumene_core::{ActorId, AppError, AppResult, TenantId};
use ecumene_domain::{AuditRecord, AuditStatus, CommandTree, serialize_command_options};
use tracing::{debug, info, warn};

use crate::{AuditRecordQuery, AuditRecordRepository, Clock, CommandFilter, Invocation};


/// Application service recording the lifecycle of gated invocations.
#[derive(Clone)]
pub struct AuditService {
    commands: Arc<CommandTree>,
    repository: Arc<dyn AuditRecordRepository>,
    clock: Arc<dyn Clock>,
}

impl AuditService {
    /// Creates a new audit service.
    #[must_use]
    pub fn new(
        commands: Arc<CommandTree>,
        repository: Arc<dyn AuditRecordRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            commands,
            repository,
            clock,
        }
    }

    /// Inserts a pending record for an invocation about to run and returns its id.
    pub async fn begin(&self, invocation: &Invocation) -> AppResult<String> {
        let record = self.build_record(invocation, AuditStatus::Pending);
        self.repository.insert_record(&record).await?;
        debug!(
            record_id = %record.record_id,
            command_id = %record.command_id,
            tenant_id = %record.tenant_id,
            "opened audit record"
        );

        Ok(record.record_id)
    }

    /// Moves a pending record to its terminal status.
    ///
    /// Returns `false` when the record was no longer pending.
    pub async fn finish(&self, record_id: &str, status: AuditStatus) -> AppResult<bool> {
        if !status.is_terminal() {
            return Err(AppError::Validation(format!(
                "audit record '{record_id}' cannot be finished as '{}'",
                status.as_str()
            )));
        }

        let updated = self
            .repository
            .update_pending_status(record_id, status)
            .await?;
        if updated == 0 {
            warn!(
                record_id,
                status = status.as_str(),
                "audit record was not pending, status left unchanged"
            );
            return Ok(false);
        }

        debug!(record_id, status = status.as_str(), "closed audit record");
        Ok(true)
    }

    /// Inserts a terminal record for an invocation rejected before its handler ran.
    pub async fn fail_at_gate(
        &self,
        invocation: &Invocation,
        status: AuditStatus,
    ) -> AppResult<String> {
        if !status.is_terminal() {
            return Err(AppError::Validation(format!(
                "gate failures must be terminal, got '{}'",
                status.as_str()
            )));
        }

        let record = self.build_record(invocation, status);
        self.repository.insert_record(&record).await?;
        info!(
            record_id = %record.record_id,
            command_id = %record.command_id,
            tenant_id = %record.tenant_id,
            actor_id = %record.actor_id,
            status = status.as_str(),
            "recorded gate failure"
        );

        Ok(record.record_id)
    }

    /// Expires records left pending for at least `max_age`.
    pub async fn sweep_stale(&self, max_age: Duration) -> AppResult<u64> {
        let cutoff = self.cutoff(max_age)?;
        let expired = self.repository.expire_pending_before(cutoff).await?;
        if expired > 0 {
            warn!(expired, cutoff = %cutoff, "expired unfinished audit records");
        }

        Ok(expired)
    }

    /// Lists finished records invoked within `lookback`.
    pub async fn records_in_period(
        &self,
        tenant_id: TenantId,
        lookback: Duration,
    ) -> AppResult<Vec<AuditRecord>> {
        let query = self.query(lookback)?;
        self.repository.list_records(tenant_id, &query).await
    }

    /// Lists finished records for one command; a trailing `*` matches descendants.
    pub async fn records_for_command(
        &self,
        tenant_id: TenantId,
        lookback: Duration,
        command_pattern: &str,
    ) -> AppResult<Vec<AuditRecord>> {
        let query = AuditRecordQuery {
            command: Some(CommandFilter::from_pattern(command_pattern)),
            ..self.query(lookback)?
        };
        self.repository.list_records(tenant_id, &query).await
    }

    /// Lists finished records invoked by one actor.
    pub async fn records_for_actor(
        &self,
        tenant_id: TenantId,
        lookback: Duration,
        actor_id: ActorId,
    ) -> AppResult<Vec<AuditRecord>> {
        let query = AuditRecordQuery {
            actor_id: Some(actor_id),
            ..self.query(lookback)?
        };
        self.repository.list_records(tenant_id, &query).await
    }

    /// Lists finished records whose options carry `target` as a value.
    pub async fn records_for_target(
        &self,
        tenant_id: TenantId,
        lookback: Duration,
        target: &str,
    ) -> AppResult<Vec<AuditRecord>> {
        let query = AuditRecordQuery {
            target: Some(target.trim().to_owned()),
            ..self.query(lookback)?
        };
        self.repository.list_records(tenant_id, &query).await
    }

    fn query(&self, lookback: Duration) -> AppResult<AuditRecordQuery> {
        Ok(AuditRecordQuery {
            invoked_since: self.cutoff(lookback)?,
            command: None,
            actor_id: None,
            target: None,
        })
    }

    fn cutoff(&self, age: Duration) -> AppResult<DateTime<Utc>> {
        self.clock
            .now()
            .checked_sub_signed(age)
            .ok_or_else(|| AppError::Validation(format!("age {age} is out of range")))
    }

    fn build_record(&self, invocation: &Invocation, status: AuditStatus) -> AuditRecord {
        AuditRecord {
            record_id: invocation.record_id(),
            command_id: self.dotted_command_id(&invocation.command_id),
            invoked_at: self.clock.now(),
            tenant_id: invocation.tenant_id(),
            actor_id: invocation.actor.actor_id(),
            command_options: serialize_command_options(&invocation.options),
            status,
        }
    }

    fn dotted_command_id(&self, command_id: &str) -> String {
        match self.commands.lineage(command_id) {
            Ok(lineage) => lineage.join("."),
            Err(error) => {
                warn!(command_id, error = %error, "recording command outside the tree");
                command_id.to_owned()
            }
        }
    }
}
