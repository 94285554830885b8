//! Ecumene credential scheduler runtime.

#![forbid(unsafe_code)]

mod scheduler_config;

use std::sync::Arc;
use std::time::Duration;

use ecumene_application::{
    AuditService, CleanAdminCacheTask, Clock, CredentialService, RefreshTokensTask, Scheduler,
    SweepAuditTask, SystemClock,
};
use ecumene_core::{AppError, AppResult};
use ecumene_domain::CommandTree;
use ecumene_infrastructure::{
    HttpPlatformClient, MIGRATOR, PostgresAuditRecordRepository, PostgresClanBindingRepository,
    PostgresCredentialRepository, TracingNotifier,
};

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::scheduler_config::{SchedulerConfig, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = SchedulerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    MIGRATOR
        .run(&pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to run migrations: {error}")))?;

    let scheduler = build_scheduler(&config, pool.clone())?;

    info!(
        endpoint = %config.platform.endpoint,
        refresh_interval_secs = config.refresh.interval.as_secs(),
        urgent_interval_secs = config.refresh.urgent_interval.as_secs(),
        cleanup_interval_secs = config.cleanup.interval.as_secs(),
        audit_sweep_interval_secs = config.audit_sweep_interval.as_secs(),
        "ecumene-scheduler started"
    );

    scheduler
        .run_until(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                warn!(error = %error, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutdown requested");
        })
        .await;

    pool.close().await;
    Ok(())
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Store(format!("failed to connect to database: {error}")))
}

fn build_scheduler(config: &SchedulerConfig, pool: PgPool) -> AppResult<Scheduler> {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let credential_service = CredentialService::new(
        Arc::new(PostgresCredentialRepository::new(pool.clone())),
        Arc::new(PostgresClanBindingRepository::new(pool.clone())),
        Arc::new(HttpPlatformClient::new(http_client, config.platform.clone())),
        Arc::new(TracingNotifier),
        clock.clone(),
    );
    let audit_service = AuditService::new(
        Arc::new(CommandTree::default()),
        Arc::new(PostgresAuditRecordRepository::new(pool)),
        clock,
    );

    let mut scheduler = Scheduler::new();
    scheduler.schedule_now(Arc::new(RefreshTokensTask::new(
        credential_service.clone(),
        config.refresh,
    )));
    scheduler.schedule_now(Arc::new(CleanAdminCacheTask::new(
        credential_service,
        config.cleanup,
    )));
    scheduler.schedule_now(Arc::new(SweepAuditTask::new(
        audit_service,
        config.audit_sweep_interval,
        config.audit_stale_after,
    )));

    Ok(scheduler)
}
