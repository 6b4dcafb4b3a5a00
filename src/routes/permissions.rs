//! Grant administration. Every route here except the read of a single
//! record sits behind the `manage_permissions` gate (see `app::router`).

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::catalogue::{self, DEFAULT_EMPLOYEE_PERMISSIONS, GROUPS, MANAGEABLE_EMPLOYEE_PERMISSIONS};
use crate::authz::{can_view_grants_of, Role};
use crate::db::users;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, RequestContext};
use crate::jwt::AuthUser;
use crate::models::permission::{
    AvailablePermissions, CreatePermissionsRequest, EmployeeCatalogue, EmployeeList, EmployeePermissions, GrantSet,
    PermissionsData, PermissionsRequest, UserPermissions,
};
use crate::models::user::DbUser;
use crate::response::{ApiJson, ApiResponse};
use crate::utils::normalize_tokens;

fn employee_catalogue() -> EmployeeCatalogue {
    EmployeeCatalogue {
        default: DEFAULT_EMPLOYEE_PERMISSIONS.to_vec(),
        manageable: MANAGEABLE_EMPLOYEE_PERMISSIONS.to_vec(),
    }
}

/// Grants for a write, after trimming. A user-role target is allowed but logged.
fn grants_for(target: &DbUser, tokens: &[String]) -> AppResult<GrantSet> {
    let grants: GrantSet = normalize_tokens(tokens)?.into_iter().collect();

    if target.role == Role::User && !grants.is_empty() {
        tracing::warn!(user_id = %target.id, "granting permissions to a user-role identity");
    }

    Ok(grants)
}

#[utoipa::path(
    get,
    path = "/permissions/available",
    tag = "Permissions",
    responses(
        (status = 200, description = "Permission catalogue", body = AvailablePermissions),
        (status = 403, description = "Missing manage_permissions")
    ),
    security(("bearerAuth" = []))
)]
pub async fn available_permissions() -> ApiResponse<AvailablePermissions> {
    let body = AvailablePermissions {
        groups: GROUPS.to_vec(),
        all: catalogue::all_permissions().collect(),
        employee: employee_catalogue(),
    };

    ApiResponse::ok("available permissions", body)
}

#[utoipa::path(
    get,
    path = "/permissions/user/{id}",
    tag = "Permissions",
    params(("id" = Uuid, Path, description = "Identity id")),
    responses(
        (status = 200, description = "Grant set; empty when no record exists", body = PermissionsData),
        (status = 403, description = "Neither admin nor the identity itself")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_user_permissions(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<ApiResponse<PermissionsData>> {
    if !can_view_grants_of(auth.role, auth.user_id, user_id) {
        return Err(AppError::forbidden("you can only view your own permissions"));
    }

    let grants = state.grants.load(user_id).await?;
    Ok(ApiResponse::ok("user permissions", PermissionsData::new(user_id, &grants)))
}

#[utoipa::path(
    put,
    path = "/permissions/user/{id}",
    tag = "Permissions",
    params(("id" = Uuid, Path, description = "Identity id")),
    request_body = PermissionsRequest,
    responses(
        (status = 200, description = "Grant set replaced", body = PermissionsData),
        (status = 400, description = "Blank permission token"),
        (status = 404, description = "Identity not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn replace_user_permissions(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    ApiJson(payload): ApiJson<PermissionsRequest>,
) -> AppResult<ApiResponse<PermissionsData>> {
    let target = users::get_by_id(&state.pool, user_id).await?;
    let grants = grants_for(&target, &payload.permissions)?;

    let before = state.grants.find(user_id).await?;
    let record = state.grants.replace(user_id, &grants).await?;

    tracing::info!(actor_id = %auth.user_id, user_id = %user_id, count = record.permissions.len(), "permissions replaced");
    log_activity(
        &state.event_bus,
        "updated",
        auth.user_id,
        Some(&record),
        before.as_ref(),
        RequestContext::from_headers(&headers),
    );

    Ok(ApiResponse::ok(
        "permissions updated",
        PermissionsData::new(user_id, &record.permissions),
    ))
}

#[utoipa::path(
    post,
    path = "/permissions/user",
    tag = "Permissions",
    request_body = CreatePermissionsRequest,
    responses(
        (status = 201, description = "Grant record created", body = PermissionsData),
        (status = 400, description = "Blank permission token"),
        (status = 404, description = "Identity not found"),
        (status = 409, description = "Record already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_user_permissions(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<CreatePermissionsRequest>,
) -> AppResult<(StatusCode, ApiResponse<PermissionsData>)> {
    let target = users::get_by_id(&state.pool, payload.user_id).await?;
    let grants = grants_for(&target, &payload.permissions)?;

    let record = state.grants.create(payload.user_id, &grants).await?;

    tracing::info!(actor_id = %auth.user_id, user_id = %payload.user_id, "permissions created");
    log_activity(
        &state.event_bus,
        "created",
        auth.user_id,
        Some(&record),
        None,
        RequestContext::from_headers(&headers),
    );

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("permissions created", PermissionsData::new(record.user_id, &record.permissions)),
    ))
}

#[utoipa::path(
    delete,
    path = "/permissions/user/{id}",
    tag = "Permissions",
    params(("id" = Uuid, Path, description = "Identity id")),
    responses(
        (status = 200, description = "Grant record removed"),
        (status = 404, description = "No record for this identity")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_user_permissions(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
) -> AppResult<ApiResponse<()>> {
    let removed = state.grants.delete(user_id).await?;

    tracing::info!(actor_id = %auth.user_id, user_id = %user_id, "permissions deleted");
    log_activity::<UserPermissions>(
        &state.event_bus,
        "deleted",
        auth.user_id,
        None,
        Some(&removed),
        RequestContext::from_headers(&headers),
    );

    Ok(ApiResponse::message("permissions deleted"))
}

#[utoipa::path(
    get,
    path = "/permissions/employees",
    tag = "Permissions",
    responses((status = 200, description = "Employees with their split grant sets", body = EmployeeList)),
    security(("bearerAuth" = []))
)]
pub async fn list_employees(State(state): State<AppState>) -> AppResult<ApiResponse<EmployeeList>> {
    let employees = users::list(&state.pool, Some(Role::Employee)).await?;

    let mut rows = Vec::with_capacity(employees.len());
    for employee in employees {
        let grants = state.grants.load(employee.id).await?;
        rows.push(EmployeePermissions {
            id: employee.id,
            name: employee.name,
            email: employee.email,
            role: employee.role,
            status: employee.status,
            permissions: grants.to_vec(),
            split: catalogue::split_employee_grants(&grants),
        });
    }

    Ok(ApiResponse::ok(
        "employees",
        EmployeeList {
            employees: rows,
            employee: employee_catalogue(),
        },
    ))
}

#[utoipa::path(
    put,
    path = "/permissions/employee/{id}",
    tag = "Permissions",
    params(("id" = Uuid, Path, description = "Employee id")),
    request_body(content = PermissionsRequest, description = "Manageable tokens to hold; defaults are always kept"),
    responses(
        (status = 200, description = "Grant set is now defaults plus the supplied tokens", body = PermissionsData),
        (status = 400, description = "Target is not an employee, or a token is outside the manageable catalogue"),
        (status = 404, description = "Identity not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_employee_permissions(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    ApiJson(payload): ApiJson<PermissionsRequest>,
) -> AppResult<ApiResponse<PermissionsData>> {
    let target = users::get_by_id(&state.pool, user_id).await?;
    if target.role != Role::Employee {
        return Err(AppError::bad_request("target user is not an employee"));
    }

    let requested = normalize_tokens(&payload.permissions)?;
    let invalid = catalogue::invalid_manageable(requested.iter().map(String::as_str));
    if !invalid.is_empty() {
        tracing::debug!(user_id = %user_id, ?invalid, "rejected manageable update");
        return Err(AppError::invalid_permissions(invalid));
    }

    let grants = catalogue::employee_grants(requested.iter().map(String::as_str));
    let before = state.grants.find(user_id).await?;
    let record = state.grants.replace(user_id, &grants).await?;

    tracing::info!(actor_id = %auth.user_id, user_id = %user_id, count = record.permissions.len(), "employee permissions updated");
    log_activity(
        &state.event_bus,
        "updated",
        auth.user_id,
        Some(&record),
        before.as_ref(),
        RequestContext::from_headers(&headers),
    );

    Ok(ApiResponse::ok(
        "employee permissions updated",
        PermissionsData::new(user_id, &record.permissions),
    ))
}
