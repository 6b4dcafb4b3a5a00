//! Revocation list for credentials invalidated before they expire (logout).
//! Entries are keyed by [`crate::jwt::fingerprint`].

use chrono::{SecondsFormat, TimeZone, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::utils::utc_now;

pub async fn revoke(pool: &SqlitePool, token_hash: &str, user_id: Uuid, expires_at: i64) -> AppResult<()> {
    let expires_at = Utc
        .timestamp_opt(expires_at, 0)
        .single()
        .ok_or_else(|| AppError::internal("credential expiry out of range"))?;

    sqlx::query(
        "INSERT OR IGNORE INTO revoked_tokens (token_hash, user_id, expires_at, revoked_at) VALUES (?, ?, ?, ?)",
    )
    .bind(token_hash)
    .bind(user_id.to_string())
    .bind(expires_at.to_rfc3339_opts(SecondsFormat::Secs, true))
    .bind(utc_now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn is_revoked(pool: &SqlitePool, token_hash: &str) -> AppResult<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM revoked_tokens WHERE token_hash = ?")
        .bind(token_hash)
        .fetch_one(pool)
        .await?;

    Ok(count > 0)
}

/// Drop entries whose credential has expired anyway. Returns how many went.
pub async fn purge_expired(pool: &SqlitePool) -> AppResult<u64> {
    // same fixed-width format as `revoke`, so the string comparison orders by time
    let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < ?")
        .bind(utc_now().to_rfc3339_opts(SecondsFormat::Secs, true))
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
