//! Application services and ports.

#![forbid(unsafe_code)]

mod audit_ports;
mod audit_service;
mod authorization_ports;
mod authorization_service;
mod clock;
mod command_gate;
mod credential_ports;
mod credential_service;
mod invocation;
mod scheduler;

#[cfg(test)]
mod fakes;

pub use audit_ports::{AuditRecordQuery, AuditRecordRepository, CommandFilter};
pub use audit_service::AuditService;
pub use authorization_ports::{BlacklistRepository, PermissionGrantRepository, TenantRole};
pub use authorization_service::{
    AuthorizationDecision, AuthorizationService, BlockOutcome, GrantOutcome, RevokeOutcome,
    UnblockOutcome,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use command_gate::{
    CommandAccess, CommandGate, CommandHandler, CommandRegistry, CommandRegistryBuilder,
    GENERIC_ERROR_MESSAGE, GateResponse, HandlerOutcome, INSUFFICIENT_PRIVILEGES_MESSAGE,
};
pub use credential_ports::{
    ClanBindingRepository, CredentialRepository, DeadCredential, Notifier, PlatformClient,
};
pub use credential_service::{
    CleanupPolicy, CleanupReport, CredentialService, RefreshPolicy, RefreshReport,
};
pub use invocation::Invocation;
pub use scheduler::{
    CleanAdminCacheTask, RefreshTokensTask, ScheduledTask, Scheduler, SweepAuditTask,
    TaskPriority, TaskRun,
};
