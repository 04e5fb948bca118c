mod support;

use axum::http::StatusCode;
use identity::models::Role;
use identity::verification::Channel;
use serde_json::{Value, json};
use support::TestApp;

async fn register(app: &TestApp, email: &str, phone_number: Option<&str>) -> Value {
    let mut body = json!({
        "email": email,
        "password": "Secret123!",
        "name": "Alice",
    });
    if let Some(phone_number) = phone_number {
        body["phone_number"] = json!(phone_number);
    }
    let (status, body) = app.call("POST", "/auth/register", None, Some(body)).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body
}

async fn login(app: &TestApp, email: &str, password: &str) -> (StatusCode, Value) {
    app.call(
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await
}

async fn access_token(app: &TestApp, email: &str) -> String {
    let (status, body) = login(app, email, "Secret123!").await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_register_login_and_profile() {
    let app = TestApp::new();
    let registered = register(&app, "a@x.com", None).await;
    let id = registered["user"]["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());
    assert_eq!(registered["user"]["role"], "client");
    assert_eq!(registered["user"]["approve_email"], false);
    assert!(registered["user"].get("password_hash").is_none());
    assert!(registered["user"].get("verify_code_email").is_none());

    let (status, body) = login(&app, "a@x.com", "Secret123!").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], id.as_str());
    assert!(!body["access_token"].as_str().unwrap().is_empty());
    assert!(!body["refresh_token"].as_str().unwrap().is_empty());

    let token = body["access_token"].as_str().unwrap();
    let (status, me) = app.call("GET", "/auth/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "a@x.com");
}

#[tokio::test]
async fn test_wrong_password_and_unknown_email_look_the_same() {
    let app = TestApp::new();
    register(&app, "a@x.com", None).await;

    let wrong = login(&app, "a@x.com", "wrong").await;
    let unknown = login(&app, "nobody@x.com", "Secret123!").await;

    assert_eq!(wrong.0, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong, unknown);
    assert_eq!(wrong.1["error"], "wrong password");
}

#[tokio::test]
async fn test_register_rejects_invalid_input_and_duplicates() {
    let app = TestApp::new();

    let (status, body) = app
        .call(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "email": "not-an-email", "password": "Secret123!" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid email format");

    let (status, _) = app
        .call("POST", "/auth/register", None, Some(json!({ "email": 1 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    register(&app, "a@x.com", None).await;
    let (status, _) = app
        .call(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "email": "a@x.com", "password": "Secret123!" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_role_scoped_registration() {
    let app = TestApp::new();
    let (status, body) = app
        .call(
            "POST",
            "/auth-doctor/register",
            None,
            Some(json!({ "email": "doc@x.com", "password": "Secret123!", "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "doctor");

    let (status, body) = app
        .call(
            "POST",
            "/auth-client/login",
            None,
            Some(json!({ "email": "doc@x.com", "password": "Secret123!" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "doctor");
}

#[tokio::test]
async fn test_public_registration_ignores_requested_role() {
    let app = TestApp::new();
    let (status, body) = app
        .call(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "email": "a@x.com", "password": "Secret123!", "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "client");

    let token = access_token(&app, "a@x.com").await;
    let claims = app.state.jwt_service.validate_token(&token).unwrap();
    assert_eq!(claims.role, Role::Client);
}

#[tokio::test]
async fn test_protected_routes_require_an_access_token() {
    let app = TestApp::new();
    register(&app, "a@x.com", None).await;

    let (status, _) = app.call("GET", "/auth/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.call("GET", "/auth/me", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, body) = login(&app, "a@x.com", "Secret123!").await;
    let refresh = body["refresh_token"].as_str().unwrap();
    let (status, _) = app.call("GET", "/auth/me", Some(refresh), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_token_requires_a_refresh_token() {
    let app = TestApp::new();
    register(&app, "a@x.com", None).await;
    let (_, body) = login(&app, "a@x.com", "Secret123!").await;
    let access = body["access_token"].as_str().unwrap();
    let refresh = body["refresh_token"].as_str().unwrap();

    let (status, _) = app
        .call("POST", "/auth/refresh-token", Some(access), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .call("POST", "/auth/refresh-token", Some(refresh), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let fresh = body["access_token"].as_str().unwrap();
    let (status, _) = app.call("GET", "/auth/me", Some(fresh), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_email_verification_scenario() {
    let app = TestApp::new();
    app.codes.queue("482913");
    register(&app, "a@x.com", None).await;
    let token = access_token(&app, "a@x.com").await;

    let verify = json!({ "email": "a@x.com", "verify_code_email": "482913" });
    let (status, body) = app
        .call("PUT", "/auth/verify-code-email", Some(&token), Some(verify.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Verification successful");

    let (_, me) = app.call("GET", "/auth/me", Some(&token), None).await;
    assert_eq!(me["approve_email"], true);

    let (status, body) = app
        .call(
            "PUT",
            "/auth/resend-verify-code-email",
            Some(&token),
            Some(json!({ "email": "a@x.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Resend Verify code is successful");

    let (status, body) = app
        .call("PUT", "/auth/verify-code-email", Some(&token), Some(verify))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "verify code not correct");
}

#[tokio::test]
async fn test_phone_verification_after_two_resends() {
    let app = TestApp::new();
    register(&app, "a@x.com", Some("+15550001")).await;
    let token = access_token(&app, "a@x.com").await;
    let resend = json!({ "phone_number": "+15550001" });

    app.call(
        "PUT",
        "/auth/resend-verify-code-phone-number",
        Some(&token),
        Some(resend.clone()),
    )
    .await;
    let first = app.codes.last_sent(Channel::Phone).unwrap();
    app.call(
        "PUT",
        "/auth/resend-verify-code-phone-number",
        Some(&token),
        Some(resend),
    )
    .await;
    let second = app.codes.last_sent(Channel::Phone).unwrap();
    assert_ne!(first, second);

    let verify = |code: &str| json!({ "phone_number": "+15550001", "verify_code_phone_number": code });
    let (status, _) = app
        .call(
            "PUT",
            "/auth/verify-code-phone-number",
            Some(&token),
            Some(verify(&first)),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            "PUT",
            "/auth/verify-code-phone-number",
            Some(&token),
            Some(verify(&second)),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, me) = app.call("GET", "/auth/me", Some(&token), None).await;
    assert_eq!(me["approve_phone_number"], true);
    assert_eq!(me["approve_email"], false);
}

#[tokio::test]
async fn test_user_listing_stays_coherent_with_writes() {
    let app = TestApp::new();
    register(&app, "a@x.com", None).await;
    let token = access_token(&app, "a@x.com").await;

    let (status, before) = app
        .call("GET", "/auth/users?page=1&limit=10", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(before["pagination"]["total"], 1);
    assert!(!app.cache.is_empty().await);

    register(&app, "b@x.com", None).await;

    // Same listing, parameters in another order
    let (_, after) = app
        .call("GET", "/auth/users?limit=10&page=1", Some(&token), None)
        .await;
    assert_eq!(after["pagination"]["total"], 2);
    let emails: Vec<&str> = after["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["email"].as_str().unwrap())
        .collect();
    assert!(emails.contains(&"b@x.com"));
    assert!(after["users"][0].get("phone_number").is_none());

    let (_, filtered) = app
        .call("GET", "/auth/users?email=b@x.com", Some(&token), None)
        .await;
    assert_eq!(filtered["pagination"]["total"], 1);
}

#[tokio::test]
async fn test_update_user_changes_password() {
    let app = TestApp::new();
    register(&app, "a@x.com", None).await;
    let token = access_token(&app, "a@x.com").await;

    let (status, body) = app
        .call(
            "PUT",
            "/auth/update-user",
            Some(&token),
            Some(json!({ "password": "nope", "new_password": "Better456@" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "wrong password");

    let (status, _) = app
        .call(
            "PUT",
            "/auth/update-user",
            Some(&token),
            Some(json!({ "password": "Secret123!", "new_password": "Better456@" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(login(&app, "a@x.com", "Secret123!").await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(login(&app, "a@x.com", "Better456@").await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_delete_hides_user() {
    let app = TestApp::new();
    let registered = register(&app, "a@x.com", None).await;
    let id = registered["user"]["id"].as_str().unwrap().to_string();
    let token = access_token(&app, "a@x.com").await;

    let (status, body) = app
        .call(
            "DELETE",
            "/auth",
            Some(&token),
            Some(json!({ "id": id, "name": "Gone" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Gone");

    assert_eq!(login(&app, "a@x.com", "Secret123!").await.0, StatusCode::UNAUTHORIZED);
    let (status, _) = app.call("GET", "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
