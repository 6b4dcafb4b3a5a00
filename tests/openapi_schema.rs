use serde_json::Value;

#[test]
fn openapi_documents_permission_routes_and_bearer_auth() -> anyhow::Result<()> {
    let doc = estate_authz::docs::build_openapi(8000)?;
    let v = serde_json::to_value(&doc)?;

    let paths = v
        .get("paths")
        .and_then(Value::as_object)
        .expect("paths must exist");

    for path in [
        "/permissions/available",
        "/permissions/user/{id}",
        "/permissions/user",
        "/permissions/employees",
        "/permissions/employee/{id}",
        "/auth/login",
        "/users/{id}/status",
    ] {
        assert!(paths.contains_key(path), "OpenAPI missing path '{}'", path);
    }

    let user_path = &paths["/permissions/user/{id}"];
    for method in ["get", "put", "delete"] {
        assert!(user_path.get(method).is_some(), "missing {} on /permissions/user/{{id}}", method);
    }

    assert_eq!(v["components"]["securitySchemes"]["bearerAuth"]["scheme"], "bearer");

    let split = v
        .pointer("/components/schemas/EmployeeGrantSplit/properties")
        .and_then(Value::as_object)
        .expect("EmployeeGrantSplit schema must exist");
    for key in ["default_permissions", "manageable_permissions", "other_permissions"] {
        assert!(split.contains_key(key), "EmployeeGrantSplit missing '{}'", key);
    }

    Ok(())
}
