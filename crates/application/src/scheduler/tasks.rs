use std::time::Duration;

use async_trait::async_trait;
use ecumene_core::{AppError, AppResult};

use crate::{AuditService, CleanupPolicy, CredentialService, RefreshPolicy};

use super::{ScheduledTask, TaskPriority};

/// Refreshes delegated credentials, backing off to the urgent interval on failure.
pub struct RefreshTokensTask {
    service: CredentialService,
    policy: RefreshPolicy,
}

impl RefreshTokensTask {
    /// Creates the refresh task.
    #[must_use]
    pub fn new(service: CredentialService, policy: RefreshPolicy) -> Self {
        Self { service, policy }
    }
}

#[async_trait]
impl ScheduledTask for RefreshTokensTask {
    fn name(&self) -> &'static str {
        "refresh_tokens"
    }

    fn priority(&self) -> TaskPriority {
        TaskPriority::REFRESH
    }

    async fn run(&self) -> AppResult<Duration> {
        let report = self.service.refresh_tokens(&self.policy).await?;
        Ok(report.next_delay)
    }

    fn retry_delay(&self) -> Duration {
        self.policy.urgent_interval
    }
}

/// Deletes orphaned credentials and reports dead ones.
pub struct CleanAdminCacheTask {
    service: CredentialService,
    policy: CleanupPolicy,
}

impl CleanAdminCacheTask {
    /// Creates the cleanup task.
    #[must_use]
    pub fn new(service: CredentialService, policy: CleanupPolicy) -> Self {
        Self { service, policy }
    }
}

#[async_trait]
impl ScheduledTask for CleanAdminCacheTask {
    fn name(&self) -> &'static str {
        "clean_admin_cache"
    }

    fn priority(&self) -> TaskPriority {
        TaskPriority::CLEANUP
    }

    async fn run(&self) -> AppResult<Duration> {
        self.service.clean_admin_cache(&self.policy).await?;
        Ok(self.policy.interval)
    }

    fn retry_delay(&self) -> Duration {
        self.policy.interval
    }
}

/// Expires audit records left pending past their staleness window.
pub struct SweepAuditTask {
    service: AuditService,
    interval: Duration,
    max_age: Duration,
}

impl SweepAuditTask {
    /// Creates the sweep task.
    #[must_use]
    pub fn new(service: AuditService, interval: Duration, max_age: Duration) -> Self {
        Self {
            service,
            interval,
            max_age,
        }
    }
}

#[async_trait]
impl ScheduledTask for SweepAuditTask {
    fn name(&self) -> &'static str {
        "sweep_audit"
    }

    fn priority(&self) -> TaskPriority {
        TaskPriority::AUDIT_SWEEP
    }

    async fn run(&self) -> AppResult<Duration> {
        let max_age = chrono::Duration::from_std(self.max_age).map_err(|error| {
            AppError::Validation(format!("audit staleness window out of range: {error}"))
        })?;
        self.service.sweep_stale(max_age).await?;
        Ok(self.interval)
    }

    fn retry_delay(&self) -> Duration {
        self.interval
    }
}
