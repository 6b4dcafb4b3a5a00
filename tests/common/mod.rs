#![allow(dead_code)]

use std::path::Path;

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt;

use estate_authz::authz::{enforce, Gate, GateOptions, Role};
use estate_authz::db::users;
use estate_authz::jwt::JwtConfig;
use estate_authz::models::permission::GrantSet;
use estate_authz::models::user::User;
use estate_authz::utils::hash_password;
use estate_authz::{router, AppState};

pub const PASSWORD: &str = "password123";
pub const SECRET: &str = "test-secret";

pub struct TestApp {
    _dir: TempDir,
    pub pool: SqlitePool,
    pub state: AppState,
    pub app: Router,
}

pub async fn setup() -> Result<TestApp> {
    let dir = tempdir().context("failed to create tempdir")?;
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    let state = AppState::new(pool.clone(), JwtConfig::new(SECRET));
    let app = router(state.clone());

    Ok(TestApp { _dir: dir, pool, state, app })
}

impl TestApp {
    pub async fn user(&self, name: &str, role: Role) -> Result<User> {
        let hash = hash_password(PASSWORD)?;
        let email = format!("{}@example.com", name);
        Ok(users::insert(&self.pool, name, &email, &hash, role).await?.into())
    }

    pub fn token(&self, user: &User) -> Result<String> {
        Ok(self.state.jwt.issue_access(user)?)
    }

    pub async fn grant(&self, user: &User, tokens: &[&str]) -> Result<()> {
        let grants: GrantSet = tokens.iter().copied().collect();
        self.state.grants.replace(user.id, &grants).await?;
        Ok(())
    }

    /// A single `GET /probe` route behind a gate with `options`.
    pub fn probe(&self, options: GateOptions) -> Router {
        Router::new()
            .route("/probe", get(|| async { "ok" }))
            .route_layer(from_fn_with_state(Gate::new(self.state.clone(), options), enforce))
    }

    pub async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        send(&self.app, method, uri, token, body).await
    }
}

pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }

    let req = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let resp = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };

    Ok((status, value))
}
