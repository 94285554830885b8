//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod audit;
mod command;
mod credential;
mod permission;

pub use audit::{AuditRecord, AuditStatus, CommandOption, serialize_command_options};
pub use command::{
    COMMAND_SEPARATOR, CommandKind, CommandNode, CommandTree, WILDCARD_SUFFIX, candidate_paths,
};
pub use credential::{ClanBinding, Credential, TokenGrant};
pub use permission::{
    BlacklistEntry, BlacklistScope, BlockedSubject, PermissionGrant, PermissionPath,
};
