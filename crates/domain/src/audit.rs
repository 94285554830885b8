use std::str::FromStr;

use chrono::{DateTime, Utc};
use ecumene_core::{ActorId, AppError, TenantId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of one audited command invocation.
///
/// `Pending` is the only non-terminal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// Invocation accepted, handler not finished.
    Pending,
    /// Handler completed.
    Success,
    /// Actor cancelled a confirmation step.
    Cancelled,
    /// Authorization denied at the gate.
    FailedCheck,
    /// Command context or registration missing.
    FailedContext,
    /// Actor or resource not registered with the bot.
    FailedUnregistered,
    /// Confirmation step timed out.
    #[serde(rename = "failed_timed_out")]
    FailedTimeout,
    /// Handler raised an error.
    FailedError,
    /// Record left pending past the staleness window.
    ExpiredOrUnhandled,
}

impl AuditStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Cancelled => "cancelled",
            Self::FailedCheck => "failed_check",
            Self::FailedContext => "failed_context",
            Self::FailedUnregistered => "failed_unregistered",
            Self::FailedTimeout => "failed_timed_out",
            Self::FailedError => "failed_error",
            Self::ExpiredOrUnhandled => "expired_or_unhandled",
        }
    }

    /// Returns whether no further transition is allowed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl FromStr for AuditStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "cancelled" => Ok(Self::Cancelled),
            "failed_check" => Ok(Self::FailedCheck),
            "failed_context" => Ok(Self::FailedContext),
            "failed_unregistered" => Ok(Self::FailedUnregistered),
            "failed_timed_out" => Ok(Self::FailedTimeout),
            "failed_error" => Ok(Self::FailedError),
            "expired_or_unhandled" => Ok(Self::ExpiredOrUnhandled),
            _ => Err(AppError::Validation(format!(
                "unknown audit status value '{value}'"
            ))),
        }
    }
}

/// One option supplied with a command invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOption {
    /// Option name.
    pub name: String,
    /// Supplied value.
    pub value: Value,
}

impl CommandOption {
    /// Creates an option from anything convertible into a JSON value.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Flattens options into `name=value;name=value`.
///
/// Lists are joined with `,`. Nulls render as `None` and booleans as `True` or
/// `False`. Objects and nested lists are not represented; an object-valued
/// option is omitted.
#[must_use]
pub fn serialize_command_options(options: &[CommandOption]) -> Option<String> {
    let rendered: Vec<String> = options
        .iter()
        .filter_map(|option| {
            render_option_value(&option.value).map(|value| format!("{}={value}", option.name))
        })
        .collect();

    if rendered.is_empty() {
        return None;
    }

    Some(rendered.join(";"))
}

fn render_option_value(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(render_primitive)
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => None,
        primitive => render_primitive(primitive),
    }
}

fn render_primitive(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some("None".to_owned()),
        Value::Bool(true) => Some("True".to_owned()),
        Value::Bool(false) => Some("False".to_owned()),
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) => Some(text.clone()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Durable row tracking one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    /// Identifier derived from the invocation, assigned once.
    pub record_id: String,
    /// Dotted command lineage.
    pub command_id: String,
    /// Invocation timestamp.
    pub invoked_at: DateTime<Utc>,
    /// Tenant the command was invoked in.
    pub tenant_id: TenantId,
    /// Invoking actor.
    pub actor_id: ActorId,
    /// Flattened option string, absent when no options were supplied.
    pub command_options: Option<String>,
    /// Current lifecycle status.
    pub status: AuditStatus,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use serde_json::{Value, json};

    use super::{AuditStatus, CommandOption, serialize_command_options};

    #[test]
    fn status_roundtrip_storage_value() {
        let status = AuditStatus::FailedTimeout;
        assert_eq!(status.as_str(), "failed_timed_out");
        assert_eq!(AuditStatus::from_str(status.as_str()).ok(), Some(status));
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!AuditStatus::Pending.is_terminal());
        assert!(AuditStatus::ExpiredOrUnhandled.is_terminal());
        assert!(AuditStatus::FailedCheck.is_terminal());
    }

    #[test]
    fn options_flatten_in_order() {
        let options = vec![
            CommandOption::new("role", "1049"),
            CommandOption::new("members", json!([12, 34])),
            CommandOption::new("silent", true),
            CommandOption::new("reason", Value::Null),
        ];

        assert_eq!(
            serialize_command_options(&options).as_deref(),
            Some("role=1049;members=12,34;silent=True;reason=None")
        );
    }

    #[test]
    fn falsy_values_keep_their_own_rendering() {
        let options = vec![
            CommandOption::new("silent", false),
            CommandOption::new("count", 0),
            CommandOption::new("flags", json!([true, false])),
        ];

        assert_eq!(
            serialize_command_options(&options).as_deref(),
            Some("silent=False;count=0;flags=True,False")
        );
    }

    #[test]
    fn object_options_are_not_represented() {
        let options = vec![
            CommandOption::new("payload", json!({"nested": 1})),
            CommandOption::new("ids", json!([1, [2, 3], "x"])),
        ];

        assert_eq!(serialize_command_options(&options).as_deref(), Some("ids=1,x"));
        assert_eq!(serialize_command_options(&[]), None);
    }
}
