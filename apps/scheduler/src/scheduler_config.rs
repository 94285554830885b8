use std::env;
use std::time::Duration;

use ecumene_application::{CleanupPolicy, RefreshPolicy};
use ecumene_core::{AppError, AppResult};
use ecumene_infrastructure::PlatformApplication;
use tracing_subscriber::EnvFilter;

const DEFAULT_ENDPOINT: &str = "https://www.bungie.net";
const MAX_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

/// Runtime configuration of the credential scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub database_url: String,
    pub platform: PlatformApplication,
    pub refresh: RefreshPolicy,
    pub cleanup: CleanupPolicy,
    pub audit_sweep_interval: Duration,
    pub audit_stale_after: Duration,
}

impl SchedulerConfig {
    /// Loads configuration from the process environment.
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = required_env(&lookup, "DATABASE_URL")?;
        let endpoint = lookup("BNET_ENDPOINT")
            .map(|value| value.trim().trim_end_matches('/').to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned());
        let api_key = required_env(&lookup, "BNET_API_KEY")?;
        let client_id = required_env(&lookup, "BNET_CLIENT_ID")?;
        let client_secret = required_env(&lookup, "BNET_CLIENT_SECRET")?;
        let application_name = lookup("APPLICATION_NAME")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_owned());
        let application_version = lookup("APPLICATION_VERSION")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_owned());

        let refresh = RefreshPolicy {
            interval: parse_seconds(&lookup, "REFRESH_INTERVAL_SECONDS", 900)?,
            urgent_interval: parse_seconds(&lookup, "REFRESH_URGENT_INTERVAL_SECONDS", 300)?,
            access_buffer: parse_seconds(&lookup, "REFRESH_ACCESS_BUFFER_SECONDS", 300)?,
            refresh_buffer: parse_seconds(&lookup, "REFRESH_REFRESH_BUFFER_SECONDS", 86_400)?,
        };
        if refresh.urgent_interval > refresh.interval {
            return Err(AppError::Validation(
                "REFRESH_URGENT_INTERVAL_SECONDS must not exceed REFRESH_INTERVAL_SECONDS"
                    .to_owned(),
            ));
        }

        let cleanup = CleanupPolicy {
            interval: parse_seconds(&lookup, "CLEANUP_INTERVAL_SECONDS", 86_400)?,
            refresh_buffer: refresh.refresh_buffer,
        };

        Ok(Self {
            database_url,
            platform: PlatformApplication {
                endpoint,
                api_key,
                client_id,
                client_secret,
                user_agent: format!("{application_name}/{application_version}"),
            },
            refresh,
            cleanup,
            audit_sweep_interval: parse_seconds(&lookup, "AUDIT_SWEEP_INTERVAL_SECONDS", 900)?,
            audit_stale_after: parse_seconds(&lookup, "AUDIT_STALE_AFTER_SECONDS", 1_800)?,
        })
    }
}

/// Installs the global tracing subscriber.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env<F>(lookup: &F, name: &str) -> AppResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

fn parse_seconds<F>(lookup: &F, name: &str, default: u64) -> AppResult<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let seconds = match lookup(name) {
        Some(value) => value.trim().parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        })?,
        None => default,
    };

    if seconds == 0 {
        return Err(AppError::Validation(format!(
            "{name} must be greater than zero"
        )));
    }
    if seconds > MAX_SECONDS {
        return Err(AppError::Validation(format!(
            "{name} must not exceed {MAX_SECONDS} seconds"
        )));
    }

    Ok(Duration::from_secs(seconds))
}
