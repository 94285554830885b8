use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use ecumene_core::{Actor, ActorId, AppError, AppResult, RoleId, TenantId};
use ecumene_domain::{AuditStatus, BlockedSubject, CommandNode, CommandTree};

use crate::fakes::{FakeStore, bot_commands, epoch, path};
use crate::{AuditService, AuthorizationService, Invocation, ManualClock, TenantRole};

use super::{
    CommandAccess, CommandGate, CommandHandler, CommandRegistry, GENERIC_ERROR_MESSAGE,
    HandlerOutcome, INSUFFICIENT_PRIVILEGES_MESSAGE,
};

const TENANT: TenantId = TenantId::new(1);
const OFFICER: RoleId = RoleId::new(3);

enum Script {
    Outcome(HandlerOutcome),
    Fail(fn() -> AppError),
}

struct ScriptedHandler {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedHandler {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
        })
    }

    fn completed() -> Arc<Self> {
        Self::new(Script::Outcome(HandlerOutcome::Completed))
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandHandler for ScriptedHandler {
    async fn handle(&self, _invocation: &Invocation) -> AppResult<HandlerOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Outcome(outcome) => Ok(*outcome),
            Script::Fail(make_error) => Err(make_error()),
        }
    }
}

struct Fixture {
    store: Arc<FakeStore>,
    authorization: AuthorizationService,
    gate: CommandGate,
}

fn fixture(kick: Arc<dyn CommandHandler>) -> Fixture {
    let commands = Arc::new(bot_commands());
    let store = Arc::new(FakeStore::default());
    let authorization =
        AuthorizationService::new(commands.clone(), store.clone(), store.clone());
    let audit = AuditService::new(
        commands.clone(),
        store.clone(),
        Arc::new(ManualClock::new(epoch())),
    );
    let mut builder = CommandRegistry::builder(commands.clone()).gated("clan.kick", kick);
    for node in commands.commands() {
        if node.id() == "clan.kick" {
            continue;
        }
        builder = if node.id() == "ping" {
            builder.open(node.id(), ScriptedHandler::completed())
        } else {
            builder.gated(node.id(), ScriptedHandler::completed())
        };
    }
    let registry = builder
        .build()
        .unwrap_or_else(|error| panic!("registry should build: {error}"));

    Fixture {
        store,
        authorization: authorization.clone(),
        gate: CommandGate::new(Arc::new(registry), authorization, audit),
    }
}

fn invocation(invocation_id: u64, command_id: &str, roles: &[RoleId]) -> Invocation {
    Invocation::new(
        invocation_id,
        command_id,
        Actor::new(ActorId::new(500), TENANT, roles.iter().copied()),
    )
}

async fn grant_kick(fixture: &Fixture) {
    let role = TenantRole {
        role_id: OFFICER,
        can_manage_tenant: false,
    };
    assert!(
        fixture
            .authorization
            .grant(TENANT, role, &path("clan.*"))
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn denied_invocation_records_failed_check_without_running_handler() {
    let handler = ScriptedHandler::completed();
    let fixture = fixture(handler.clone());

    let response = fixture.gate.dispatch(&invocation(1, "clan.kick", &[OFFICER])).await;

    let Ok(response) = response else {
        panic!("dispatch should respond");
    };
    assert_eq!(response.status, AuditStatus::FailedCheck);
    assert_eq!(response.message, Some(INSUFFICIENT_PRIVILEGES_MESSAGE));
    assert_eq!(handler.calls(), 0);
    assert_eq!(
        fixture.store.record("1").await.map(|record| record.status),
        Some(AuditStatus::FailedCheck)
    );
}

#[tokio::test]
async fn granted_invocation_runs_handler_and_records_success() {
    let handler = ScriptedHandler::completed();
    let fixture = fixture(handler.clone());
    grant_kick(&fixture).await;

    let response = fixture.gate.dispatch(&invocation(2, "clan.kick", &[OFFICER])).await;

    assert!(response.is_ok_and(|response| {
        response.status == AuditStatus::Success
            && response.message.is_none()
            && response.record_id.as_deref() == Some("2")
    }));
    assert_eq!(handler.calls(), 1);
    assert_eq!(
        fixture.store.record("2").await.map(|record| record.status),
        Some(AuditStatus::Success)
    );
}

#[tokio::test]
async fn revoking_wildcard_turns_success_into_failed_check() {
    let fixture = fixture(ScriptedHandler::completed());
    grant_kick(&fixture).await;
    let first = fixture.gate.dispatch(&invocation(3, "clan.kick", &[OFFICER])).await;
    assert!(first.is_ok_and(|response| response.status == AuditStatus::Success));

    let role = TenantRole {
        role_id: OFFICER,
        can_manage_tenant: false,
    };
    assert!(
        fixture
            .authorization
            .revoke(TENANT, role, &path("clan.*"))
            .await
            .is_ok()
    );
    let second = fixture.gate.dispatch(&invocation(4, "clan.kick", &[OFFICER])).await;

    assert!(second.is_ok_and(|response| response.status == AuditStatus::FailedCheck));
}

#[tokio::test]
async fn handler_errors_map_to_terminal_statuses() {
    let cases: [(fn() -> AppError, AuditStatus, Option<&str>); 4] = [
        (
            || AppError::PreconditionFailed("clan not linked".to_owned()),
            AuditStatus::FailedContext,
            None,
        ),
        (
            || AppError::InteractionTimeout("confirmation expired".to_owned()),
            AuditStatus::FailedTimeout,
            None,
        ),
        (
            || AppError::NotFound("member not registered".to_owned()),
            AuditStatus::FailedUnregistered,
            None,
        ),
        (
            || AppError::Provider {
                status: 500,
                description: "SystemDisabled".to_owned(),
            },
            AuditStatus::FailedError,
            Some(GENERIC_ERROR_MESSAGE),
        ),
    ];

    for (index, (make_error, expected_status, expected_message)) in cases.into_iter().enumerate()
    {
        let fixture = fixture(ScriptedHandler::new(Script::Fail(make_error)));
        grant_kick(&fixture).await;
        let invocation_id = 10 + index as u64;

        let response = fixture
            .gate
            .dispatch(&invocation(invocation_id, "clan.kick", &[OFFICER]))
            .await;

        assert!(response.is_ok_and(|response| {
            response.status == expected_status && response.message == expected_message
        }));
        assert_eq!(
            fixture
                .store
                .record(&invocation_id.to_string())
                .await
                .map(|record| record.status),
            Some(expected_status)
        );
    }
}

#[tokio::test]
async fn cancelled_outcome_is_recorded() {
    let fixture = fixture(ScriptedHandler::new(Script::Outcome(
        HandlerOutcome::Cancelled,
    )));
    grant_kick(&fixture).await;

    let response = fixture.gate.dispatch(&invocation(20, "clan.kick", &[OFFICER])).await;

    assert!(response.is_ok_and(|response| response.status == AuditStatus::Cancelled));
}

#[tokio::test]
async fn open_commands_need_no_grant() {
    let fixture = fixture(ScriptedHandler::completed());

    let response = fixture.gate.dispatch(&invocation(21, "ping", &[])).await;

    assert!(response.is_ok_and(|response| response.status == AuditStatus::Success));
}

#[tokio::test]
async fn open_commands_still_reject_blacklisted_actors() {
    let fixture = fixture(ScriptedHandler::completed());
    assert!(
        fixture
            .authorization
            .block_globally(BlockedSubject::Actor(ActorId::new(500)))
            .await
            .is_ok()
    );

    let response = fixture.gate.dispatch(&invocation(24, "ping", &[])).await;

    assert!(response.is_ok_and(|response| {
        response.status == AuditStatus::FailedCheck
            && response.message == Some(INSUFFICIENT_PRIVILEGES_MESSAGE)
    }));
    assert_eq!(
        fixture.store.record("24").await.map(|record| record.status),
        Some(AuditStatus::FailedCheck)
    );
}

#[tokio::test]
async fn open_commands_reject_blacklisted_tenants() {
    let fixture = fixture(ScriptedHandler::completed());
    assert!(
        fixture
            .authorization
            .block_globally(BlockedSubject::Tenant(TENANT))
            .await
            .is_ok()
    );

    let response = fixture.gate.dispatch(&invocation(25, "ping", &[])).await;

    assert!(response.is_ok_and(|response| response.status == AuditStatus::FailedCheck));
}

#[tokio::test]
async fn failing_begin_prevents_handler_run() {
    let handler = ScriptedHandler::completed();
    let fixture = fixture(handler.clone());
    grant_kick(&fixture).await;
    *fixture.store.fail_writes.lock().await = true;

    let response = fixture.gate.dispatch(&invocation(22, "clan.kick", &[OFFICER])).await;

    assert!(matches!(response, Err(AppError::Store(_))));
    assert_eq!(handler.calls(), 0);
}

#[tokio::test]
async fn unknown_command_records_failed_context() {
    let fixture = fixture(ScriptedHandler::completed());

    let response = fixture.gate.dispatch(&invocation(23, "raid.start", &[])).await;

    assert!(response.is_ok_and(|response| {
        response.status == AuditStatus::FailedContext
            && response.message == Some(GENERIC_ERROR_MESSAGE)
    }));
}

#[test]
fn registry_requires_a_handler_for_every_command() {
    let commands = Arc::new(bot_commands());

    let result = CommandRegistry::builder(commands)
        .gated("clan.kick", ScriptedHandler::completed())
        .build();

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[test]
fn registry_rejects_unknown_groups_and_duplicates() {
    let commands = Arc::new(
        CommandTree::new([
            CommandNode::root_group("clan"),
            CommandNode::command("clan", "kick"),
        ])
        .unwrap_or_else(|error| panic!("invalid fixture: {error}")),
    );

    let unknown = CommandRegistry::builder(commands.clone())
        .gated("clan.kick", ScriptedHandler::completed())
        .gated("clan.ban", ScriptedHandler::completed())
        .build();
    let group = CommandRegistry::builder(commands.clone())
        .gated("clan.kick", ScriptedHandler::completed())
        .gated("clan", ScriptedHandler::completed())
        .build();
    let duplicate = CommandRegistry::builder(commands.clone())
        .gated("clan.kick", ScriptedHandler::completed())
        .open("clan.kick", ScriptedHandler::completed())
        .build();
    let valid = CommandRegistry::builder(commands)
        .gated("clan.kick", ScriptedHandler::completed())
        .build();

    assert!(matches!(unknown, Err(AppError::NotFound(_))));
    assert!(matches!(group, Err(AppError::Validation(_))));
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));
    assert!(valid.is_ok_and(|registry| registry.access("clan.kick") == Some(CommandAccess::Gated)));
}
