use std::sync::Arc;

use axum::http::Method;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::catalogue::{BAN_USERS, MANAGE_PERMISSIONS, VIEW_USERS};
use crate::authz::{enforce, Gate, GateOptions};
use crate::db::{GrantStore, SqliteGrantStore};
use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::routes::{auth, health, permissions, users};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub grants: Arc<dyn GrantStore>,
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig) -> Self {
        let (event_bus, _) = init_event_bus();
        Self {
            grants: Arc::new(SqliteGrantStore::new(pool.clone())),
            pool,
            jwt: Arc::new(jwt),
            event_bus,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let state = AppState::new(pool.clone(), jwt_config);

    tokio::spawn(start_activity_listener(state.event_bus.subscribe(), pool));

    Ok(router(state))
}

/// Every route group gets its own gate, configured here and nowhere else.
pub fn router(state: AppState) -> Router {
    let gate = |options: GateOptions| from_fn_with_state(Gate::new(state.clone(), options), enforce);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let open_auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh));

    let session_routes = Router::new()
        .route("/session", get(auth::session))
        .route_layer(gate(GateOptions::public()));

    let signed_in_routes = Router::new()
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout))
        .route_layer(gate(GateOptions::authenticated()));

    // Readable by the owner too; the handler narrows it down.
    let own_permission_routes = Router::new()
        .route("/user/:id", get(permissions::get_user_permissions))
        .route_layer(gate(GateOptions::authenticated()));

    let permission_admin_routes = Router::new()
        .route("/available", get(permissions::available_permissions))
        .route(
            "/user/:id",
            put(permissions::replace_user_permissions).delete(permissions::delete_user_permissions),
        )
        .route("/user", post(permissions::create_user_permissions))
        .route("/employees", get(permissions::list_employees))
        .route("/employee/:id", put(permissions::update_employee_permissions))
        .route_layer(gate(GateOptions::all_of(&[MANAGE_PERMISSIONS])));

    let user_list_routes = Router::new()
        .route("/", get(users::list_users))
        .route_layer(gate(GateOptions::all_of(&[VIEW_USERS])));

    let user_status_routes = Router::new()
        .route("/:id/status", put(users::update_status))
        .route_layer(gate(GateOptions::all_of(&[BAN_USERS])));

    let user_role_routes = Router::new()
        .route("/:id/role", put(users::update_role))
        .route_layer(gate(GateOptions::admin()));

    Router::new()
        .route("/api/health", get(health::health))
        .nest("/auth", open_auth_routes.merge(session_routes).merge(signed_in_routes))
        .nest("/permissions", own_permission_routes.merge(permission_admin_routes))
        .nest("/users", user_list_routes.merge(user_status_routes).merge(user_role_routes))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
