use chrono::Utc;
use ecumene_application::BlacklistRepository;
use ecumene_core::{ActorId, TenantId};
use ecumene_domain::{BlacklistEntry, BlacklistScope, BlockedSubject};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::PostgresBlacklistRepository;
use crate::MIGRATOR;

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres block list tests: {error}");
    }

    Some(pool)
}

fn unique_ids() -> (TenantId, ActorId) {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default().unsigned_abs();
    (TenantId::new(nanos), ActorId::new(nanos.wrapping_add(1)))
}

#[tokio::test]
async fn each_blocking_candidate_is_matched() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresBlacklistRepository::new(pool);
    let (tenant_id, actor_id) = unique_ids();
    let candidates = BlacklistEntry::blocking_candidates(tenant_id, actor_id);

    assert!(
        repository
            .contains_any(&candidates)
            .await
            .is_ok_and(|blocked| !blocked)
    );

    for entry in candidates {
        assert!(repository.insert_entry(&entry).await.is_ok());
        assert!(
            repository
                .contains_any(&candidates)
                .await
                .is_ok_and(|blocked| blocked),
            "{entry:?}"
        );
        assert_eq!(repository.delete_entry(&entry).await.unwrap_or_default(), 1);
        assert!(
            repository
                .contains_any(&candidates)
                .await
                .is_ok_and(|blocked| !blocked)
        );
    }
}

#[tokio::test]
async fn entries_in_other_scopes_do_not_match() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresBlacklistRepository::new(pool);
    let (tenant_id, actor_id) = unique_ids();
    let other_tenant = TenantId::new(tenant_id.get().wrapping_add(7));
    let elsewhere = BlacklistEntry {
        scope: BlacklistScope::Tenant(other_tenant),
        subject: BlockedSubject::Actor(actor_id),
    };
    let tenant_as_actor = BlacklistEntry {
        scope: BlacklistScope::Global,
        subject: BlockedSubject::Actor(ActorId::new(tenant_id.get())),
    };

    for entry in [elsewhere, tenant_as_actor] {
        assert!(repository.insert_entry(&entry).await.is_ok());
    }

    let blocked = repository
        .contains_any(&BlacklistEntry::blocking_candidates(tenant_id, actor_id))
        .await;
    assert!(blocked.is_ok_and(|blocked| !blocked));
    assert!(repository.contains_any(&[]).await.is_ok_and(|blocked| !blocked));

    for entry in [elsewhere, tenant_as_actor] {
        assert!(repository.delete_entry(&entry).await.is_ok());
    }
}

#[tokio::test]
async fn duplicate_entries_are_stored_once() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresBlacklistRepository::new(pool);
    let (tenant_id, actor_id) = unique_ids();
    let entry = BlacklistEntry {
        scope: BlacklistScope::Tenant(tenant_id),
        subject: BlockedSubject::Actor(actor_id),
    };

    assert!(repository.insert_entry(&entry).await.is_ok());
    assert!(repository.insert_entry(&entry).await.is_ok());

    assert_eq!(repository.delete_entry(&entry).await.unwrap_or_default(), 1);
    assert_eq!(repository.delete_entry(&entry).await.unwrap_or_default(), 0);
}
