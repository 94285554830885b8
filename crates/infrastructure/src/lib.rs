//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_platform_client;
mod in_memory_store;
mod postgres_audit_record_repository;
mod postgres_blacklist_repository;
mod postgres_clan_binding_repository;
mod postgres_credential_repository;
mod postgres_grant_repository;
mod tracing_notifier;

pub use http_platform_client::{HttpPlatformClient, PlatformApplication};
pub use in_memory_store::InMemoryStore;
pub use postgres_audit_record_repository::PostgresAuditRecordRepository;
pub use postgres_blacklist_repository::PostgresBlacklistRepository;
pub use postgres_clan_binding_repository::PostgresClanBindingRepository;
pub use postgres_credential_repository::PostgresCredentialRepository;
pub use postgres_grant_repository::PostgresGrantRepository;
pub use tracing_notifier::TracingNotifier;

/// Embedded schema migrations for the Postgres adapters.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
