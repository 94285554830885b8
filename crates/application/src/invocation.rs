use ecumene_core::{Actor, TenantId};
use ecumene_domain::CommandOption;

/// One command invocation as delivered by the host bot.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Host-assigned interaction identifier, reused as the audit record id.
    pub invocation_id: u64,
    /// Leaf or dotted command identifier.
    pub command_id: String,
    /// Invoking actor with tenant context.
    pub actor: Actor,
    /// Options supplied with the invocation, in declaration order.
    pub options: Vec<CommandOption>,
}

impl Invocation {
    /// Creates an invocation without options.
    #[must_use]
    pub fn new(invocation_id: u64, command_id: impl Into<String>, actor: Actor) -> Self {
        Self {
            invocation_id,
            command_id: command_id.into(),
            actor,
            options: Vec::new(),
        }
    }

    /// Appends one option.
    #[must_use]
    pub fn with_option(mut self, option: CommandOption) -> Self {
        self.options.push(option);
        self
    }

    /// Returns the tenant the invocation happened in.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.actor.tenant_id()
    }

    /// Returns the audit record id for this invocation.
    #[must_use]
    pub fn record_id(&self) -> String {
        self.invocation_id.to_string()
    }
}
