use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::authz::catalogue::{EmployeeGrantSplit, PermissionGroup};
use crate::authz::{AccountStatus, Role};
use crate::models::permission::{
	AvailablePermissions, CreatePermissionsRequest, EmployeeCatalogue, EmployeeList, EmployeePermissions,
	PermissionsData, PermissionsRequest,
};
use crate::models::user::{
	AuthResponse, LoginRequest, LogoutRequest, MeResponse, RefreshRequest, RegisterRequest, SessionResponse,
	TokenResponse, UpdateRoleRequest, UpdateStatusRequest, User,
};
use crate::routes::{auth, health, permissions, users};

#[derive(OpenApi)]
#[openapi(
	paths(
		health::health,
		auth::register,
		auth::login,
		auth::refresh,
		auth::logout,
		auth::me,
		auth::session,
		permissions::available_permissions,
		permissions::get_user_permissions,
		permissions::replace_user_permissions,
		permissions::create_user_permissions,
		permissions::delete_user_permissions,
		permissions::list_employees,
		permissions::update_employee_permissions,
		users::list_users,
		users::update_status,
		users::update_role
	),
	components(
		schemas(
			health::HealthResponse,
			Role,
			AccountStatus,
			User,
			RegisterRequest,
			LoginRequest,
			AuthResponse,
			RefreshRequest,
			LogoutRequest,
			TokenResponse,
			MeResponse,
			SessionResponse,
			UpdateRoleRequest,
			UpdateStatusRequest,
			PermissionGroup,
			EmployeeGrantSplit,
			EmployeeCatalogue,
			AvailablePermissions,
			PermissionsRequest,
			CreatePermissionsRequest,
			PermissionsData,
			EmployeePermissions,
			EmployeeList
		)
	),
	modifiers(&BearerAuth),
	tags(
		(name = "Health", description = "Liveness and database probe"),
		(name = "Auth", description = "Credentials and sessions"),
		(name = "Permissions", description = "Capability grants per identity"),
		(name = "Users", description = "Role and account status administration")
	)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
	fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
		let components = openapi.components.get_or_insert_with(Default::default);
		components.add_security_scheme(
			"bearerAuth",
			SecurityScheme::Http(
				HttpBuilder::new()
					.scheme(HttpAuthScheme::Bearer)
					.bearer_format("JWT")
					.build(),
			),
		);
	}
}

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(&ApiDoc::openapi())?;

	add_examples(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = get(move || {
		let doc_json = Arc::clone(&doc_json);
		async move { Json((*doc_json).clone()) }
	});

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

/// Request examples for Swagger's "Try it out", keyed by schema reference.
fn request_example(schema_ref: &str) -> Option<Value> {
	match schema_ref {
		"#/components/schemas/RegisterRequest" => Some(json!({
			"name": "Ada Lovelace",
			"email": "ada@example.com",
			"password": "S3cureP@ssw0rd"
		})),
		"#/components/schemas/LoginRequest" => Some(json!({
			"email": "ada@example.com",
			"password": "S3cureP@ssw0rd"
		})),
		"#/components/schemas/PermissionsRequest" => Some(json!({
			"permissions": ["view_statistics", "manage_prices"]
		})),
		"#/components/schemas/CreatePermissionsRequest" => Some(json!({
			"userId": "00000000-0000-0000-0000-000000000000",
			"permissions": ["view_statistics"]
		})),
		"#/components/schemas/UpdateStatusRequest" => Some(json!({ "status": "banned" })),
		"#/components/schemas/UpdateRoleRequest" => Some(json!({ "role": "employee" })),
		_ => None,
	}
}

fn add_examples(doc: &mut Value) {
	let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) else { return; };

	for item in paths.values_mut() {
		let Some(operations) = item.as_object_mut() else { continue; };

		for operation in operations.values_mut() {
			let Some(app_json) = operation
				.pointer_mut("/requestBody/content/application~1json")
				.and_then(Value::as_object_mut)
			else {
				continue;
			};

			let example = app_json
				.get("schema")
				.and_then(|schema| schema.get("$ref"))
				.and_then(Value::as_str)
				.and_then(request_example);

			if let Some(example) = example {
				app_json.insert("example".to_string(), example);
			}
		}
	}
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let server_url = format!("http://localhost:{}", port);

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn request_examples_are_attached() {
		let doc = serde_json::to_value(build_openapi(8000).unwrap()).unwrap();
		let example = doc
			.pointer("/paths/~1permissions~1employee~1{id}/put/requestBody/content/application~1json/example")
			.cloned();
		assert_eq!(example, Some(json!({ "permissions": ["view_statistics", "manage_prices"] })));
	}

	#[test]
	fn server_entry_uses_port() {
		let doc = serde_json::to_value(build_openapi(9090).unwrap()).unwrap();
		assert_eq!(doc["servers"][0]["url"], "http://localhost:9090");
	}
}
