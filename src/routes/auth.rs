use axum::extract::State;
use axum::http::StatusCode;

use crate::app::AppState;
use crate::authz::{AccountStatus, Role};
use crate::db::{revocations, users};
use crate::errors::{AppError, AppResult, TokenError};
use crate::jwt::{fingerprint, AuthUser, TokenKind};
use crate::models::user::{
    AuthResponse, LoginRequest, LogoutRequest, MeResponse, RefreshRequest, RegisterRequest, SessionResponse,
    TokenResponse, User,
};
use crate::response::{ApiJson, ApiResponse};
use crate::utils::{hash_password, verify_password};

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Password too short"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, ApiResponse<AuthResponse>)> {
    let name = payload.name.trim();
    let email = payload.email.trim().to_lowercase();
    if name.is_empty() || email.is_empty() {
        return Err(AppError::bad_request("name and email are required"));
    }

    let password_hash = hash_password(&payload.password)?;
    let user: User = users::insert(&state.pool, name, &email, &password_hash, Role::User).await?.into();

    tracing::info!(user_id = %user.id, "user registered");

    let body = AuthResponse {
        access_token: state.jwt.issue_access(&user)?,
        refresh_token: state.jwt.issue_refresh(&user)?,
        user,
    };

    Ok((StatusCode::CREATED, ApiResponse::ok("registered", body)))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account banned")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<ApiResponse<AuthResponse>> {
    let email = payload.email.trim().to_lowercase();
    let db_user = users::find_by_email(&state.pool, &email)
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    if !verify_password(&payload.password, &db_user.password_hash)? {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let user: User = db_user.into();
    if user.is_banned() {
        tracing::warn!(user_id = %user.id, "login refused: account banned");
        return Err(AppError::Banned);
    }

    let body = AuthResponse {
        access_token: state.jwt.issue_access(&user)?,
        refresh_token: state.jwt.issue_refresh(&user)?,
        user,
    };

    Ok(ApiResponse::ok("logged in", body))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "Auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access credential", body = TokenResponse),
        (status = 401, description = "Refresh credential expired, invalid or revoked"),
        (status = 403, description = "Account banned")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> AppResult<ApiResponse<TokenResponse>> {
    let token = payload.refresh_token.trim();

    if revocations::is_revoked(&state.pool, &fingerprint(token)).await? {
        return Err(AppError::Token(TokenError::Blacklisted));
    }

    let claims = state.jwt.decode(token, TokenKind::Refresh)?;

    // role may have changed since the refresh credential was issued
    let user: User = users::find_by_id(&state.pool, claims.sub)
        .await?
        .ok_or(AppError::Token(TokenError::Invalid))?
        .into();

    if user.status == AccountStatus::Banned {
        return Err(AppError::Banned);
    }

    let access_token = state.jwt.issue_access(&user)?;
    Ok(ApiResponse::ok("credential refreshed", TokenResponse { access_token }))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    request_body(content = LogoutRequest, description = "Optional refresh credential to revoke as well"),
    responses(
        (status = 200, description = "Credential revoked"),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearerAuth" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Option<ApiJson<LogoutRequest>>,
) -> AppResult<ApiResponse<()>> {
    revocations::revoke(&state.pool, &auth.fingerprint, auth.user_id, auth.expires_at).await?;

    let refresh_token = body.and_then(|ApiJson(req)| req.refresh_token);
    if let Some(token) = refresh_token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        // Only a refresh credential of the same caller is revoked; anything else is ignored.
        match state.jwt.decode(token, TokenKind::Refresh) {
            Ok(claims) if claims.sub == auth.user_id => {
                revocations::revoke(&state.pool, &fingerprint(token), auth.user_id, claims.exp).await?;
            }
            _ => tracing::debug!(user_id = %auth.user_id, "ignored refresh credential on logout"),
        }
    }

    tracing::info!(user_id = %auth.user_id, "logged out");
    Ok(ApiResponse::message("logged out"))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user and held permissions", body = MeResponse),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<ApiResponse<MeResponse>> {
    let user: User = users::get_by_id(&state.pool, auth.user_id).await?.into();
    let permissions = state.grants.load(auth.user_id).await?.to_vec();

    Ok(ApiResponse::ok("current user", MeResponse { user, permissions }))
}

#[utoipa::path(
    get,
    path = "/auth/session",
    tag = "Auth",
    responses(
        (status = 200, description = "Whether a valid credential was presented", body = SessionResponse),
        (status = 401, description = "Presented credential expired, invalid or revoked")
    )
)]
pub async fn session(auth: Option<AuthUser>) -> ApiResponse<SessionResponse> {
    let body = match auth {
        Some(user) => SessionResponse {
            authenticated: true,
            user_id: Some(user.user_id),
            role: Some(user.role),
        },
        None => SessionResponse {
            authenticated: false,
            user_id: None,
            role: None,
        },
    };

    ApiResponse::ok("session", body)
}
