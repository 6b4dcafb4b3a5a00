//! Identity records. Role and status only change through [`set_role`] and
//! [`set_status`]; nothing here deletes an identity.

use sqlx::SqlitePool;
use uuid::Uuid;

use super::row_parsers::db_user_from_row;
use crate::authz::{AccountStatus, Role};
use crate::errors::{AppError, AppResult};
use crate::models::user::DbUser;
use crate::utils::utc_now;

const USER_COLUMNS: &str = "id, name, email, password_hash, role, status, created_at, updated_at";

pub async fn find_by_id(pool: &SqlitePool, user_id: Uuid) -> AppResult<Option<DbUser>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(db_user_from_row).transpose()
}

pub async fn get_by_id(pool: &SqlitePool, user_id: Uuid) -> AppResult<DbUser> {
    find_by_id(pool, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<DbUser>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
    let row = sqlx::query(&sql).bind(email).fetch_optional(pool).await?;

    row.as_ref().map(db_user_from_row).transpose()
}

pub async fn insert(pool: &SqlitePool, name: &str, email: &str, password_hash: &str, role: Role) -> AppResult<DbUser> {
    let id = Uuid::new_v4();
    let now = utc_now().to_rfc3339();

    let result = sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(role.as_str())
    .bind(AccountStatus::Active.as_str())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await;

    match result {
        Ok(_) => get_by_id(pool, id).await,
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
            Err(AppError::conflict("email already in use"))
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn list(pool: &SqlitePool, role: Option<Role>) -> AppResult<Vec<DbUser>> {
    let rows = match role {
        Some(role) => {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE role = ? ORDER BY created_at");
            sqlx::query(&sql).bind(role.as_str()).fetch_all(pool).await?
        }
        None => {
            let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at");
            sqlx::query(&sql).fetch_all(pool).await?
        }
    };

    rows.iter().map(db_user_from_row).collect()
}

pub async fn set_role(pool: &SqlitePool, user_id: Uuid, role: Role) -> AppResult<DbUser> {
    let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
        .bind(role.as_str())
        .bind(utc_now().to_rfc3339())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("user not found"));
    }

    get_by_id(pool, user_id).await
}

pub async fn set_status(pool: &SqlitePool, user_id: Uuid, status: AccountStatus) -> AppResult<DbUser> {
    let result = sqlx::query("UPDATE users SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(utc_now().to_rfc3339())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("user not found"));
    }

    get_by_id(pool, user_id).await
}
