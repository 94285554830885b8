use chrono::Utc;
use ecumene_application::PermissionGrantRepository;
use ecumene_core::{RoleId, TenantId};
use ecumene_domain::{PermissionGrant, PermissionPath};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::PostgresGrantRepository;
use crate::MIGRATOR;

const MODERATOR: RoleId = RoleId::new(10);
const OFFICER: RoleId = RoleId::new(20);
const MEMBER: RoleId = RoleId::new(30);

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
        panic!("failed to run migrations for postgres grant tests: {error}");
    }

    Some(pool)
}

fn unique_tenant() -> TenantId {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    TenantId::new(nanos.unsigned_abs())
}

fn grant(tenant_id: TenantId, role_id: RoleId, value: &str) -> PermissionGrant {
    PermissionGrant {
        tenant_id,
        role_id,
        path: PermissionPath::parse(value)
            .unwrap_or_else(|error| panic!("invalid path fixture: {error}")),
    }
}

#[tokio::test]
async fn candidate_paths_match_wildcards_and_leaves() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresGrantRepository::new(pool);
    let tenant_id = unique_tenant();
    let other_tenant = TenantId::new(tenant_id.get().wrapping_add(1));

    for value in [
        grant(tenant_id, MODERATOR, "clan.*"),
        grant(tenant_id, OFFICER, "clan.kick"),
        grant(tenant_id, MEMBER, "guild.*"),
        grant(other_tenant, MEMBER, "clan.kick"),
    ] {
        assert!(repository.insert_grant(&value).await.is_ok());
    }

    let candidates = vec!["clan.*".to_owned(), "clan.kick".to_owned()];
    let mut roles = repository
        .list_roles_for_paths(tenant_id, &candidates)
        .await
        .unwrap_or_default();
    roles.sort();
    assert_eq!(roles, vec![MODERATOR, OFFICER]);

    let leaf_only = repository
        .list_roles_for_paths(tenant_id, &["clan.list".to_owned()])
        .await
        .unwrap_or_default();
    assert!(leaf_only.is_empty());

    let none = repository.list_roles_for_paths(tenant_id, &[]).await;
    assert!(none.is_ok_and(|roles| roles.is_empty()));

    assert!(repository.delete_grants_for_tenant(tenant_id).await.is_ok());
    assert!(repository.delete_grants_for_tenant(other_tenant).await.is_ok());
}

#[tokio::test]
async fn duplicate_grants_are_stored_once() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresGrantRepository::new(pool);
    let tenant_id = unique_tenant();
    let value = grant(tenant_id, MODERATOR, "guild.clear.*");

    assert!(repository.insert_grant(&value).await.is_ok());
    assert!(repository.insert_grant(&value).await.is_ok());
    assert!(repository.grant_exists(&value).await.is_ok_and(|exists| exists));

    let paths = repository
        .list_paths_for_role(tenant_id, MODERATOR)
        .await
        .unwrap_or_default();
    assert_eq!(paths, vec![value.path.clone()]);

    assert_eq!(repository.delete_grant(&value).await.unwrap_or_default(), 1);
    assert_eq!(repository.delete_grant(&value).await.unwrap_or_default(), 0);
    assert!(repository.grant_exists(&value).await.is_ok_and(|exists| !exists));
}

#[tokio::test]
async fn bulk_deletes_are_scoped() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresGrantRepository::new(pool);
    let tenant_id = unique_tenant();

    for value in [
        grant(tenant_id, MODERATOR, "clan.*"),
        grant(tenant_id, MODERATOR, "ping"),
        grant(tenant_id, OFFICER, "clan.*"),
        grant(tenant_id, MEMBER, "ping"),
    ] {
        assert!(repository.insert_grant(&value).await.is_ok());
    }

    let by_role = repository.delete_grants_for_role(tenant_id, MODERATOR).await;
    assert_eq!(by_role.unwrap_or_default(), 2);

    let clan = PermissionPath::parse("clan.*")
        .unwrap_or_else(|error| panic!("invalid path fixture: {error}"));
    let by_path = repository.delete_grants_for_path(tenant_id, &clan).await;
    assert_eq!(by_path.unwrap_or_default(), 1);

    let remaining = repository.delete_grants_for_tenant(tenant_id).await;
    assert_eq!(remaining.unwrap_or_default(), 1);
}
