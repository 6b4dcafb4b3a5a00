mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use estate_authz::authz::catalogue::{BAN_USERS, VIEW_USERS};
use estate_authz::authz::{AccountStatus, Role};
use estate_authz::db::users;

use common::setup;

#[tokio::test]
async fn listing_users_needs_view_users() -> Result<()> {
    let t = setup().await?;
    let admin = t.user("root", Role::Admin).await?;
    let emp = t.user("emp", Role::Employee).await?;
    t.user("customer", Role::User).await?;

    let (status, _) = t.send("GET", "/users", Some(&t.token(&emp)?), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    t.grant(&emp, &[VIEW_USERS]).await?;
    let (status, body) = t.send("GET", "/users?role=employee", Some(&t.token(&emp)?), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["data"][0]["id"], json!(emp.id));

    let (status, body) = t.send("GET", "/users", Some(&t.token(&admin)?), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(3));

    Ok(())
}

#[tokio::test]
async fn ban_takes_effect_on_the_next_request() -> Result<()> {
    let t = setup().await?;
    let moderator = t.user("moderator", Role::Employee).await?;
    let target = t.user("target", Role::Employee).await?;
    t.grant(&moderator, &[BAN_USERS]).await?;
    let target_token = t.token(&target)?;

    let (status, _) = t.send("GET", "/auth/me", Some(&target_token), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = t
        .send(
            "PUT",
            &format!("/users/{}/status", target.id),
            Some(&t.token(&moderator)?),
            Some(json!({ "status": "banned" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "banned");

    let (status, body) = t.send("GET", "/auth/me", Some(&target_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "USER_BANNED");

    let (status, _) = t
        .send(
            "PUT",
            &format!("/users/{}/status", target.id),
            Some(&t.token(&moderator)?),
            Some(json!({ "status": "active" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t.send("GET", "/auth/me", Some(&target_token), None).await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn own_status_and_role_cannot_be_changed() -> Result<()> {
    let t = setup().await?;
    let admin = t.user("root", Role::Admin).await?;
    let token = t.token(&admin)?;

    let (status, _) = t
        .send("PUT", &format!("/users/{}/status", admin.id), Some(&token), Some(json!({ "status": "banned" })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .send("PUT", &format!("/users/{}/role", admin.id), Some(&token), Some(json!({ "role": "user" })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let stored = users::get_by_id(&t.pool, admin.id).await?;
    assert_eq!(stored.role, Role::Admin);
    assert_eq!(stored.status, AccountStatus::Active);

    Ok(())
}

#[tokio::test]
async fn role_changes_are_admin_only() -> Result<()> {
    let t = setup().await?;
    let admin = t.user("root", Role::Admin).await?;
    let emp = t.user("emp", Role::Employee).await?;
    let customer = t.user("customer", Role::User).await?;
    t.grant(&emp, &[VIEW_USERS, BAN_USERS, "manage_permissions"]).await?;
    let uri = format!("/users/{}/role", customer.id);

    let (status, _) = t.send("PUT", &uri, Some(&t.token(&emp)?), Some(json!({ "role": "employee" }))).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = t.send("PUT", &uri, Some(&t.token(&admin)?), Some(json!({ "role": "employee" }))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "employee");

    let (status, _) = t.send("PUT", &uri, Some(&t.token(&admin)?), Some(json!({ "role": "superuser" }))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn only_admins_can_change_an_admins_status() -> Result<()> {
    let t = setup().await?;
    let admin = t.user("root", Role::Admin).await?;
    let other_admin = t.user("deputy", Role::Admin).await?;
    let moderator = t.user("moderator", Role::Employee).await?;
    t.grant(&moderator, &[BAN_USERS]).await?;
    let uri = format!("/users/{}/status", other_admin.id);

    let (status, body) = t
        .send("PUT", &uri, Some(&t.token(&moderator)?), Some(json!({ "status": "banned" })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
    assert_eq!(users::get_by_id(&t.pool, other_admin.id).await?.status, AccountStatus::Active);

    let (status, body) = t
        .send("PUT", &uri, Some(&t.token(&admin)?), Some(json!({ "status": "banned" })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "banned");

    Ok(())
}
