use std::collections::BTreeMap;

use ecumene_core::{AppError, AppResult};

use crate::PermissionPath;

/// Separator between command lineage segments.
pub const COMMAND_SEPARATOR: char = '.';

/// Suffix marking a group-level wildcard permission path.
pub const WILDCARD_SUFFIX: &str = ".*";

/// Whether a node is a command group or an invocable command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Group holding subgroups or commands.
    Group,
    /// Invocable leaf command.
    Command,
}

/// One node in the static command namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandNode {
    id: String,
    name: String,
    parent_id: Option<String>,
    kind: CommandKind,
}

impl CommandNode {
    /// Creates a top-level group.
    #[must_use]
    pub fn root_group(name: impl Into<String>) -> Self {
        Self::new(None, name.into(), CommandKind::Group)
    }

    /// Creates a top-level command without a group.
    #[must_use]
    pub fn root_command(name: impl Into<String>) -> Self {
        Self::new(None, name.into(), CommandKind::Command)
    }

    /// Creates a subgroup under `parent_id`.
    #[must_use]
    pub fn group(parent_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(Some(parent_id.into()), name.into(), CommandKind::Group)
    }

    /// Creates a command under `parent_id`.
    #[must_use]
    pub fn command(parent_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(Some(parent_id.into()), name.into(), CommandKind::Command)
    }

    fn new(parent_id: Option<String>, name: String, kind: CommandKind) -> Self {
        let id = match parent_id.as_deref() {
            Some(parent_id) => format!("{parent_id}{COMMAND_SEPARATOR}{name}"),
            None => name.clone(),
        };

        Self {
            id,
            name,
            parent_id,
            kind,
        }
    }

    /// Returns the stable dotted identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Returns the leaf name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the parent identifier, if any.
    #[must_use]
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    /// Returns the node kind.
    #[must_use]
    pub fn kind(&self) -> CommandKind {
        self.kind
    }
}

/// Statically built command namespace keyed by dotted identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandTree {
    nodes: BTreeMap<String, CommandNode>,
}

impl CommandTree {
    /// Builds and validates a tree.
    ///
    /// Every parent must exist and be a group, names must be non-empty and free
    /// of the separator, and identifiers must be unique.
    pub fn new(nodes: impl IntoIterator<Item = CommandNode>) -> AppResult<Self> {
        let mut indexed = BTreeMap::new();
        for node in nodes {
            if node.name.trim().is_empty() || node.name.contains(COMMAND_SEPARATOR) {
                return Err(AppError::Validation(format!(
                    "invalid command name '{}'",
                    node.name
                )));
            }
            if node.name == "*" {
                return Err(AppError::Validation(
                    "command name '*' is reserved for wildcard grants".to_owned(),
                ));
            }
            if indexed.contains_key(&node.id) {
                return Err(AppError::Conflict(format!(
                    "command '{}' is declared more than once",
                    node.id
                )));
            }
            indexed.insert(node.id.clone(), node);
        }

        for node in indexed.values() {
            if let Some(parent_id) = node.parent_id.as_deref() {
                match indexed.get(parent_id) {
                    Some(parent) if parent.kind == CommandKind::Group => {}
                    Some(_) => {
                        return Err(AppError::Validation(format!(
                            "command '{}' has parent '{parent_id}' which is not a group",
                            node.id
                        )));
                    }
                    None => {
                        return Err(AppError::Validation(format!(
                            "command '{}' references unknown parent '{parent_id}'",
                            node.id
                        )));
                    }
                }
            }
        }

        Ok(Self { nodes: indexed })
    }

    /// Looks up one node by identifier.
    #[must_use]
    pub fn node(&self, command_id: &str) -> Option<&CommandNode> {
        self.nodes.get(command_id)
    }

    /// Iterates invocable commands in identifier order.
    pub fn commands(&self) -> impl Iterator<Item = &CommandNode> {
        self.nodes
            .values()
            .filter(|node| node.kind == CommandKind::Command)
    }

    /// Returns root-to-leaf name segments by walking parent identifiers.
    pub fn lineage(&self, command_id: &str) -> AppResult<Vec<String>> {
        let mut lineage = Vec::new();
        let mut cursor = Some(command_id);

        while let Some(current_id) = cursor {
            let node = self.nodes.get(current_id).ok_or_else(|| {
                AppError::NotFound(format!("command '{current_id}' is not registered"))
            })?;
            lineage.push(node.name.clone());

            // Parent ids are strict prefixes, so the walk always shortens.
            if lineage.len() > self.nodes.len() {
                return Err(AppError::Internal(format!(
                    "command lineage for '{command_id}' does not terminate"
                )));
            }
            cursor = node.parent_id.as_deref();
        }

        lineage.reverse();
        Ok(lineage)
    }

    /// Returns every grant key that could authorize `command_id`.
    pub fn candidate_paths(&self, command_id: &str) -> AppResult<Vec<String>> {
        let lineage = self.lineage(command_id)?;
        Ok(candidate_paths(&lineage))
    }

    /// Ensures a permission path names an existing group wildcard or command.
    pub fn validate_path(&self, path: &PermissionPath) -> AppResult<()> {
        let expected_kind = if path.is_wildcard() {
            CommandKind::Group
        } else {
            CommandKind::Command
        };

        match self.nodes.get(path.target_id()) {
            Some(node) if node.kind == expected_kind => Ok(()),
            Some(_) if path.is_wildcard() => Err(AppError::Validation(format!(
                "'{}' is a command, wildcard grants require a group",
                path.target_id()
            ))),
            Some(_) => Err(AppError::Validation(format!(
                "'{}' is a group, use '{}{WILDCARD_SUFFIX}' to grant it",
                path.target_id(),
                path.target_id()
            ))),
            None => Err(AppError::NotFound(format!(
                "permission path '{}' does not match any registered command",
                path.as_str()
            ))),
        }
    }
}

/// Builds candidate grant keys for root-to-leaf segments.
///
/// Ancestor prefixes carry a trailing wildcard; the full lineage is the exact path.
#[must_use]
pub fn candidate_paths<S: AsRef<str>>(lineage: &[S]) -> Vec<String> {
    let members = lineage.len();
    (1..=members)
        .map(|length| {
            let mut path = lineage[..length]
                .iter()
                .map(AsRef::as_ref)
                .collect::<Vec<_>>()
                .join(".");
            if length < members {
                path.push_str(WILDCARD_SUFFIX);
            }
            path
        })
        .collect()
}
