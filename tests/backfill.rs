mod common;

use anyhow::Result;

use estate_authz::authz::catalogue::{self, MANAGE_PRICES, VIEW_DASHBOARD};
use estate_authz::authz::Role;
use estate_authz::db::grants::{backfill_employee_defaults, BackfillReport};

use common::setup;

#[tokio::test]
async fn backfill_restores_defaults_and_keeps_extras() -> Result<()> {
    let t = setup().await?;
    let stripped = t.user("stripped", Role::Employee).await?;
    let complete = t.user("complete", Role::Employee).await?;
    let missing = t.user("missing", Role::Employee).await?;
    let customer = t.user("customer", Role::User).await?;

    t.grant(&stripped, &[VIEW_DASHBOARD, MANAGE_PRICES]).await?;
    let mut full: Vec<&str> = catalogue::DEFAULT_EMPLOYEE_PERMISSIONS.to_vec();
    full.push(MANAGE_PRICES);
    t.grant(&complete, &full).await?;

    let report = backfill_employee_defaults(&t.pool, t.state.grants.as_ref()).await?;
    assert_eq!(report, BackfillReport { processed: 3, updated: 2, failed: 0 });

    let defaults = catalogue::default_employee_grants();
    for emp in [&stripped, &complete, &missing] {
        assert!(t.state.grants.load(emp.id).await?.is_superset_of(&defaults));
    }
    assert!(t.state.grants.load(stripped.id).await?.contains(MANAGE_PRICES));
    assert_eq!(t.state.grants.load(missing.id).await?, defaults);
    assert!(t.state.grants.find(customer.id).await?.is_none());

    // nothing left to do on a second pass
    let again = backfill_employee_defaults(&t.pool, t.state.grants.as_ref()).await?;
    assert_eq!(again.updated, 0);

    Ok(())
}

#[tokio::test]
async fn corrupt_record_is_counted_and_skipped() -> Result<()> {
    let t = setup().await?;
    let broken = t.user("broken", Role::Employee).await?;
    let fine = t.user("fine", Role::Employee).await?;

    sqlx::query("INSERT INTO user_permissions (user_id, permissions, created_at, updated_at) VALUES (?, 'not json', ?, ?)")
        .bind(broken.id.to_string())
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&t.pool)
        .await?;

    let report = backfill_employee_defaults(&t.pool, t.state.grants.as_ref()).await?;
    assert_eq!(report, BackfillReport { processed: 2, updated: 1, failed: 1 });
    assert_eq!(t.state.grants.load(fine.id).await?, catalogue::default_employee_grants());

    Ok(())
}
