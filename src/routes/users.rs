use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Role;
use crate::db::users;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, RequestContext};
use crate::jwt::AuthUser;
use crate::models::user::{ListUsersQuery, UpdateRoleRequest, UpdateStatusRequest, User};
use crate::response::{ApiJson, ApiResponse};

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Identities", body = [User]),
        (status = 403, description = "Missing view_users")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> AppResult<ApiResponse<Vec<User>>> {
    let rows: Vec<User> = users::list(&state.pool, query.role)
        .await?
        .into_iter()
        .map(User::from)
        .collect();

    Ok(ApiResponse::ok("users", rows))
}

#[utoipa::path(
    put,
    path = "/users/{id}/status",
    tag = "Users",
    params(("id" = Uuid, Path, description = "Identity id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = User),
        (status = 400, description = "Cannot change your own status"),
        (status = 403, description = "Missing ban_users, or target is an admin"),
        (status = 404, description = "Identity not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    ApiJson(payload): ApiJson<UpdateStatusRequest>,
) -> AppResult<ApiResponse<User>> {
    if user_id == auth.user_id {
        return Err(AppError::bad_request("you cannot change your own status"));
    }

    let before: User = users::get_by_id(&state.pool, user_id).await?.into();
    if before.role == Role::Admin && auth.role != Role::Admin {
        return Err(AppError::forbidden("only an admin can change an admin's status"));
    }

    let after: User = users::set_status(&state.pool, user_id, payload.status).await?.into();

    // Outstanding credentials stay valid on paper; the gate's live check refuses them.
    tracing::info!(actor_id = %auth.user_id, user_id = %user_id, status = payload.status.as_str(), "status changed");
    log_activity(
        &state.event_bus,
        "status_changed",
        auth.user_id,
        Some(&after),
        Some(&before),
        RequestContext::from_headers(&headers),
    );

    Ok(ApiResponse::ok("status updated", after))
}

#[utoipa::path(
    put,
    path = "/users/{id}/role",
    tag = "Users",
    params(("id" = Uuid, Path, description = "Identity id")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role changed", body = User),
        (status = 400, description = "Cannot change your own role"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Identity not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    ApiJson(payload): ApiJson<UpdateRoleRequest>,
) -> AppResult<ApiResponse<User>> {
    if user_id == auth.user_id {
        return Err(AppError::bad_request("you cannot change your own role"));
    }

    let before: User = users::get_by_id(&state.pool, user_id).await?.into();
    let after: User = users::set_role(&state.pool, user_id, payload.role).await?.into();

    tracing::info!(actor_id = %auth.user_id, user_id = %user_id, from = %before.role, to = %after.role, "role changed");
    log_activity(
        &state.event_bus,
        "role_changed",
        auth.user_id,
        Some(&after),
        Some(&before),
        RequestContext::from_headers(&headers),
    );

    Ok(ApiResponse::ok("role updated", after))
}
