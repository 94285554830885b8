use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use ecumene_core::{AppError, AppResult};
use ecumene_domain::{AuditStatus, CommandKind, CommandTree};
use tracing::{error, info, warn};

use crate::{AuditService, AuthorizationService, Invocation};

#[cfg(test)]
mod tests;

/// Reply shown to actors rejected by the permission check.
pub const INSUFFICIENT_PRIVILEGES_MESSAGE: &str = "Insufficient privileges to perform this action.";

/// Reply shown when a handler fails unexpectedly.
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred. Please don't yell at the developer!";

/// How a handler finished when it did not raise an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The command did its work.
    Completed,
    /// The actor cancelled a confirmation step.
    Cancelled,
    /// The actor or a referenced resource is not registered with the bot.
    Unregistered,
}

impl HandlerOutcome {
    fn audit_status(self) -> AuditStatus {
        match self {
            Self::Completed => AuditStatus::Success,
            Self::Cancelled => AuditStatus::Cancelled,
            Self::Unregistered => AuditStatus::FailedUnregistered,
        }
    }
}

/// Command body invoked after the gate admits an invocation.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Runs the command.
    async fn handle(&self, invocation: &Invocation) -> AppResult<HandlerOutcome>;
}

/// Whether a command requires a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAccess {
    /// Blacklist and grant checks run before the handler.
    Gated,
    /// Only the blacklist check runs; the command is still audited.
    Open,
}

struct Registration {
    access: CommandAccess,
    handler: Arc<dyn CommandHandler>,
}

/// Static map from command id to access mode and handler.
pub struct CommandRegistry {
    commands: Arc<CommandTree>,
    registrations: BTreeMap<String, Registration>,
}

impl CommandRegistry {
    /// Starts a registry over `commands`.
    #[must_use]
    pub fn builder(commands: Arc<CommandTree>) -> CommandRegistryBuilder {
        CommandRegistryBuilder {
            commands,
            registrations: BTreeMap::new(),
            duplicates: Vec::new(),
        }
    }

    /// Returns the access mode of a registered command.
    #[must_use]
    pub fn access(&self, command_id: &str) -> Option<CommandAccess> {
        self.registrations
            .get(command_id)
            .map(|registration| registration.access)
    }

    /// Returns the command tree the registry was validated against.
    #[must_use]
    pub fn commands(&self) -> &CommandTree {
        self.commands.as_ref()
    }
}

/// Builder validating registrations before the gate accepts traffic.
pub struct CommandRegistryBuilder {
    commands: Arc<CommandTree>,
    registrations: BTreeMap<String, Registration>,
    duplicates: Vec<String>,
}

impl CommandRegistryBuilder {
    /// Registers a command that requires a grant.
    #[must_use]
    pub fn gated(self, command_id: impl Into<String>, handler: Arc<dyn CommandHandler>) -> Self {
        self.register(command_id.into(), CommandAccess::Gated, handler)
    }

    /// Registers a command anyone may invoke.
    #[must_use]
    pub fn open(self, command_id: impl Into<String>, handler: Arc<dyn CommandHandler>) -> Self {
        self.register(command_id.into(), CommandAccess::Open, handler)
    }

    /// Validates the registrations against the command tree.
    ///
    /// Every tree command must be registered exactly once, every registration must
    /// name a tree command, and every gated command must resolve permission paths.
    pub fn build(self) -> AppResult<CommandRegistry> {
        if let Some(command_id) = self.duplicates.first() {
            return Err(AppError::Conflict(format!(
                "command '{command_id}' is registered more than once"
            )));
        }

        for (command_id, registration) in &self.registrations {
            match self.commands.node(command_id) {
                Some(node) if node.kind() == CommandKind::Command => {}
                Some(_) => {
                    return Err(AppError::Validation(format!(
                        "'{command_id}' is a group and cannot have a handler"
                    )));
                }
                None => {
                    return Err(AppError::NotFound(format!(
                        "handler registered for unknown command '{command_id}'"
                    )));
                }
            }

            if registration.access == CommandAccess::Gated
                && self.commands.candidate_paths(command_id)?.is_empty()
            {
                return Err(AppError::Validation(format!(
                    "command '{command_id}' resolves no permission path"
                )));
            }
        }

        if let Some(missing) = self
            .commands
            .commands()
            .find(|node| !self.registrations.contains_key(node.id()))
        {
            return Err(AppError::Validation(format!(
                "command '{}' has no handler",
                missing.id()
            )));
        }

        Ok(CommandRegistry {
            commands: self.commands,
            registrations: self.registrations,
        })
    }

    fn register(
        mut self,
        command_id: String,
        access: CommandAccess,
        handler: Arc<dyn CommandHandler>,
    ) -> Self {
        if self.registrations.contains_key(&command_id) {
            self.duplicates.push(command_id);
            return self;
        }

        self.registrations
            .insert(command_id, Registration { access, handler });
        self
    }
}

/// What the host should tell the actor after dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateResponse {
    /// Audit record written for the invocation, absent when recording failed.
    pub record_id: Option<String>,
    /// Final audit status.
    pub status: AuditStatus,
    /// Reply for the actor, absent when the handler replied itself.
    pub message: Option<&'static str>,
}

/// Runs invocations through authorization, auditing and their handler.
#[derive(Clone)]
pub struct CommandGate {
    registry: Arc<CommandRegistry>,
    authorization: AuthorizationService,
    audit: AuditService,
}

impl CommandGate {
    /// Creates a new command gate.
    #[must_use]
    pub fn new(
        registry: Arc<CommandRegistry>,
        authorization: AuthorizationService,
        audit: AuditService,
    ) -> Self {
        Self {
            registry,
            authorization,
            audit,
        }
    }

    /// Dispatches one invocation.
    ///
    /// Errors only when the pending record cannot be written; the handler does
    /// not run in that case.
    pub async fn dispatch(&self, invocation: &Invocation) -> AppResult<GateResponse> {
        let Some(registration) = self.registry.registrations.get(&invocation.command_id) else {
            warn!(
                command_id = %invocation.command_id,
                "invocation for unregistered command"
            );
            return Ok(self
                .reject(invocation, AuditStatus::FailedContext, GENERIC_ERROR_MESSAGE)
                .await);
        };

        let check = match registration.access {
            CommandAccess::Gated => self
                .authorization
                .require_authorized(
                    invocation.tenant_id(),
                    &invocation.command_id,
                    &invocation.actor,
                )
                .await
                .map(|_| ()),
            CommandAccess::Open => {
                self.authorization
                    .require_not_blacklisted(invocation.tenant_id(), &invocation.actor)
                    .await
            }
        };
        if let Err(check_error) = check {
            let message = if check_error.is_gate_denial() {
                INSUFFICIENT_PRIVILEGES_MESSAGE
            } else {
                error!(
                    command_id = %invocation.command_id,
                    error = %check_error,
                    "permission check failed"
                );
                GENERIC_ERROR_MESSAGE
            };
            return Ok(self
                .reject(invocation, AuditStatus::FailedCheck, message)
                .await);
        }

        let record_id = self.audit.begin(invocation).await?;
        let (status, message) = match registration.handler.handle(invocation).await {
            Ok(outcome) => (outcome.audit_status(), None),
            Err(handler_error) => {
                let status = status_for_error(&handler_error);
                if status == AuditStatus::FailedError {
                    error!(
                        record_id = %record_id,
                        command_id = %invocation.command_id,
                        error = %handler_error,
                        "command handler failed"
                    );
                    (status, Some(GENERIC_ERROR_MESSAGE))
                } else {
                    info!(
                        record_id = %record_id,
                        command_id = %invocation.command_id,
                        error = %handler_error,
                        "command handler stopped early"
                    );
                    (status, None)
                }
            }
        };

        if let Err(finish_error) = self.audit.finish(&record_id, status).await {
            error!(
                record_id = %record_id,
                error = %finish_error,
                "failed to close audit record, leaving it to the staleness sweep"
            );
        }

        Ok(GateResponse {
            record_id: Some(record_id),
            status,
            message,
        })
    }

    async fn reject(
        &self,
        invocation: &Invocation,
        status: AuditStatus,
        message: &'static str,
    ) -> GateResponse {
        let record_id = match self.audit.fail_at_gate(invocation, status).await {
            Ok(record_id) => Some(record_id),
            Err(record_error) => {
                error!(
                    command_id = %invocation.command_id,
                    error = %record_error,
                    "failed to record gate rejection"
                );
                None
            }
        };

        GateResponse {
            record_id,
            status,
            message: Some(message),
        }
    }
}

fn status_for_error(error: &AppError) -> AuditStatus {
    match error {
        AppError::PreconditionFailed(_) => AuditStatus::FailedContext,
        AppError::InteractionTimeout(_) => AuditStatus::FailedTimeout,
        AppError::NotFound(_) => AuditStatus::FailedUnregistered,
        AppError::PermissionDenied(_) | AppError::Blacklisted(_) => AuditStatus::FailedCheck,
        AppError::Validation(_)
        | AppError::Conflict(_)
        | AppError::Provider { .. }
        | AppError::Store(_)
        | AppError::Internal(_) => AuditStatus::FailedError,
    }
}
