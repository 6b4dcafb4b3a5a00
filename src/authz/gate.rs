use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use super::evaluator::{authorize, Decision};
use super::{AccountStatus, MatchMode, Role};
use crate::app::AppState;
use crate::db::{revocations, users};
use crate::errors::{AppError, AppResult, TokenError};
use crate::jwt::{extract_credential, fingerprint, AuthUser, TokenKind};

/// What a route demands of its caller.
#[derive(Debug, Clone, Default)]
pub struct GateOptions {
    pub require_auth: bool,
    pub require_admin: bool,
    pub permissions: Vec<String>,
    pub mode: MatchMode,
}

impl GateOptions {
    /// Anonymous callers pass; a presented credential is still verified.
    pub fn public() -> Self {
        Self::default()
    }

    pub fn authenticated() -> Self {
        Self {
            require_auth: true,
            ..Self::default()
        }
    }

    pub fn admin() -> Self {
        Self {
            require_auth: true,
            require_admin: true,
            ..Self::default()
        }
    }

    /// Every listed capability is required.
    pub fn all_of(permissions: &[&str]) -> Self {
        Self {
            require_auth: true,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            mode: MatchMode::All,
            ..Self::default()
        }
    }

    /// One of the listed capabilities is enough.
    pub fn any_of(permissions: &[&str]) -> Self {
        Self {
            mode: MatchMode::Any,
            ..Self::all_of(permissions)
        }
    }

    fn demands_identity(&self) -> bool {
        self.require_auth || self.require_admin || !self.permissions.is_empty()
    }
}

/// One configured checkpoint. Build one per route group at startup and hand
/// it to [`enforce`] through `axum::middleware::from_fn_with_state`.
#[derive(Clone)]
pub struct Gate {
    state: AppState,
    options: Arc<GateOptions>,
}

impl Gate {
    pub fn new(state: AppState, options: GateOptions) -> Self {
        Self {
            state,
            options: Arc::new(options),
        }
    }

    /// Run every check for one request. `Ok(None)` means an anonymous caller
    /// on a route that allows one.
    pub async fn check(&self, headers: &HeaderMap) -> AppResult<Option<AuthUser>> {
        let options = &self.options;
        let pool = &self.state.pool;

        let Some(token) = extract_credential(headers, &self.state.jwt.cookie_name) else {
            if options.demands_identity() {
                tracing::debug!("rejected: no credential");
                return Err(AppError::MissingCredential);
            }
            return Ok(None);
        };

        // A revoked credential is refused even where auth is optional.
        if revocations::is_revoked(pool, &fingerprint(token)).await? {
            tracing::debug!("rejected: credential invalidated");
            return Err(AppError::Token(TokenError::Blacklisted));
        }

        let claims = self.state.jwt.decode(token, TokenKind::Access)?;
        let mut user = AuthUser::from_claims(claims, token);

        if options.demands_identity() {
            // Role and status can change after issue, so re-read them every time.
            let identity = users::find_by_id(pool, user.user_id)
                .await?
                .ok_or(AppError::Token(TokenError::Invalid))?;

            if identity.status == AccountStatus::Banned {
                tracing::warn!(user_id = %user.user_id, "rejected: account banned");
                return Err(AppError::Banned);
            }

            if identity.role != user.role {
                tracing::debug!(user_id = %user.user_id, issued = %user.role, live = %identity.role, "credential role is stale");
                user.role = identity.role;
            }
        }

        if options.require_admin && user.role != Role::Admin {
            tracing::debug!(user_id = %user.user_id, role = %user.role, "rejected: admin role required");
            return Err(AppError::forbidden("admin role required"));
        }

        if !options.permissions.is_empty() {
            let grants = &self.state.grants;
            let decision = authorize(user.role, options.permissions.as_slice(), options.mode, || grants.load(user.user_id)).await?;

            if let Decision::Deny(reason) = decision {
                tracing::debug!(
                    user_id = %user.user_id,
                    required = ?options.permissions,
                    mode = ?options.mode,
                    "rejected: {reason}"
                );
                return Err(AppError::Forbidden(reason));
            }
        }

        Ok(Some(user))
    }
}

/// Middleware entrypoint. Attaches the verified [`AuthUser`] to the request
/// extensions on success; otherwise the request ends here.
pub async fn enforce(State(gate): State<Gate>, mut request: Request, next: Next) -> Result<Response, AppError> {
    if let Some(user) = gate.check(request.headers()).await? {
        request.extensions_mut().insert(user);
    }

    Ok(next.run(request).await)
}
