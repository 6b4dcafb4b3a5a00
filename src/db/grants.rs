//! Grant set storage: at most one record per identity.
//!
//! The store does not check tokens against the catalogue; which tokens may be
//! granted to whom is decided by the administration routes.
//!
//! Concurrent writers to the same identity are last-write-wins. Each write is
//! a single-row statement, so a record is never half-updated, but there is no
//! optimistic concurrency check either.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::row_parsers::user_permissions_from_row;
use super::users;
use crate::authz::catalogue;
use crate::authz::Role;
use crate::errors::{AppError, AppResult};
use crate::models::permission::{GrantSet, UserPermissions};
use crate::utils::utc_now;

#[async_trait]
pub trait GrantStore: Send + Sync {
    /// The stored record, if any.
    async fn find(&self, user_id: Uuid) -> AppResult<Option<UserPermissions>>;

    /// Full replace; creates the record when absent.
    async fn replace(&self, user_id: Uuid, grants: &GrantSet) -> AppResult<UserPermissions>;

    /// Create once. Conflict when a record already exists.
    async fn create(&self, user_id: Uuid, grants: &GrantSet) -> AppResult<UserPermissions>;

    /// Remove the record. Not found when there is none.
    async fn delete(&self, user_id: Uuid) -> AppResult<UserPermissions>;

    /// Grants held by `user_id`. A missing record is an empty set.
    async fn load(&self, user_id: Uuid) -> AppResult<GrantSet> {
        Ok(self
            .find(user_id)
            .await?
            .map(|record| record.permissions)
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone)]
pub struct SqliteGrantStore {
    pool: SqlitePool,
}

impl SqliteGrantStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn encode(grants: &GrantSet) -> AppResult<String> {
    serde_json::to_string(grants).map_err(|e| AppError::internal(format!("failed to encode permissions: {e}")))
}

#[async_trait]
impl GrantStore for SqliteGrantStore {
    async fn find(&self, user_id: Uuid) -> AppResult<Option<UserPermissions>> {
        let row = sqlx::query("SELECT user_id, permissions, created_at, updated_at FROM user_permissions WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_permissions_from_row).transpose()
    }

    async fn replace(&self, user_id: Uuid, grants: &GrantSet) -> AppResult<UserPermissions> {
        let now = utc_now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO user_permissions (user_id, permissions, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET permissions = excluded.permissions, updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id.to_string())
        .bind(encode(grants)?)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.find(user_id)
            .await?
            .ok_or_else(|| AppError::internal("grant record vanished after write"))
    }

    async fn create(&self, user_id: Uuid, grants: &GrantSet) -> AppResult<UserPermissions> {
        let now = utc_now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO user_permissions (user_id, permissions, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id.to_string())
        .bind(encode(grants)?)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => self
                .find(user_id)
                .await?
                .ok_or_else(|| AppError::internal("grant record vanished after write")),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(AppError::conflict("permissions already exist for this user"))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, user_id: Uuid) -> AppResult<UserPermissions> {
        let existing = self
            .find(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("permissions not found"))?;

        let result = sqlx::query("DELETE FROM user_permissions WHERE user_id = ?")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("permissions not found"));
        }

        Ok(existing)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub processed: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Give every employee the full default set, keeping whatever else they hold.
///
/// Records are processed one at a time; a failure is logged and counted and
/// the batch carries on.
pub async fn backfill_employee_defaults(pool: &SqlitePool, store: &dyn GrantStore) -> AppResult<BackfillReport> {
    let employees = users::list(pool, Some(Role::Employee)).await?;
    let mut report = BackfillReport::default();

    for employee in employees {
        report.processed += 1;

        let outcome = async {
            let current = store.load(employee.id).await?;
            let defaults = catalogue::default_employee_grants();
            if current.is_superset_of(&defaults) {
                return Ok::<bool, AppError>(false);
            }
            let mut merged = current;
            merged.extend(defaults.iter());
            store.replace(employee.id, &merged).await?;
            Ok(true)
        }
        .await;

        match outcome {
            Ok(true) => {
                report.updated += 1;
                tracing::info!(user_id = %employee.id, "restored default employee permissions");
            }
            Ok(false) => {}
            Err(err) => {
                report.failed += 1;
                tracing::warn!(user_id = %employee.id, error = %err, "failed to backfill employee permissions");
            }
        }
    }

    tracing::info!(
        processed = report.processed,
        updated = report.updated,
        failed = report.failed,
        "employee default backfill finished"
    );

    Ok(report)
}
