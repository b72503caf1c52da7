//! Login flow tests: lockout bookkeeping, audit emission and the
//! side-channel endpoints, exercised through the real router.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use docuvault::api::AppState;
use docuvault::config::Config;
use docuvault::db::repositories::user::hash_password;
use docuvault::entities::audit_logs;
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

async fn spawn_app() -> (Arc<AppState>, Router) {
    let db_path =
        std::env::temp_dir().join(format!("docuvault-auth-test-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config.security.token_secret = "integration-test-secret".to_string();

    let state = docuvault::api::create_app_state_from_config(config, None)
        .await
        .expect("failed to create app state");

    let router = docuvault::api::router(state.clone()).await;
    (state, router)
}

async fn post_login(app: &Router, username: &str, password: &str) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "username": username,
                        "password": password
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_user(state: &AppState, username: &str, password: &str, role_name: &str) -> i32 {
    let role = state
        .store()
        .get_role_by_name(role_name)
        .await
        .expect("role query")
        .expect("seeded role should exist");

    let hash = hash_password(password, None).expect("hash password");

    state
        .store()
        .create_user(username, &hash, role.id)
        .await
        .expect("create user")
        .id
}

async fn events_of(state: &AppState, action: &str) -> Vec<audit_logs::Model> {
    state
        .store()
        .recent_audit_events(100)
        .await
        .expect("audit query")
        .into_iter()
        .map(|(log, _)| log)
        .filter(|log| log.action_type == action)
        .collect()
}

/// Detached audit writes land on a spawned task; give them a beat.
async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
}

#[tokio::test]
async fn lockout_after_threshold_wrong_passwords() {
    let (state, app) = spawn_app().await;
    create_user(&state, "carol", "correct-horse-battery", "viewer").await;

    // First two wrong attempts advance the counter without locking.
    let response = post_login(&app, "carol", "wrong-1").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let user = state
        .store()
        .get_user_by_username("carol")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.failed_attempt_count, 1);
    assert!(user.is_active);

    let response = post_login(&app, "carol", "wrong-2").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let user = state
        .store()
        .get_user_by_username("carol")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.failed_attempt_count, 2);
    assert!(user.is_active);
    assert_eq!(events_of(&state, "LOGIN_FAILED").await.len(), 2);

    // Third wrong attempt trips the threshold.
    let response = post_login(&app, "carol", "wrong-3").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    let message = body["error"].as_str().unwrap();
    assert!(
        message.contains('3'),
        "lockout message should name the threshold: {message}"
    );

    let user = state
        .store()
        .get_user_by_username("carol")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.failed_attempt_count, 3);
    assert!(!user.is_active);

    let locked = events_of(&state, "ACCOUNT_LOCKED").await;
    assert_eq!(locked.len(), 1);
    let details: serde_json::Value =
        serde_json::from_str(locked[0].details.as_deref().unwrap()).unwrap();
    assert_eq!(details["attempts"], 3);
    assert_eq!(details["status"], "LOCKED");

    // Locking attempt emits ACCOUNT_LOCKED, not a third LOGIN_FAILED.
    assert_eq!(events_of(&state, "LOGIN_FAILED").await.len(), 2);

    // A fourth attempt is blocked regardless of password correctness
    // and never touches the counter again.
    let response = post_login(&app, "carol", "correct-horse-battery").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let user = state
        .store()
        .get_user_by_username("carol")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.failed_attempt_count, 3);
    assert!(!user.is_active);
    assert_eq!(events_of(&state, "LOGIN_BLOCKED_INACTIVE").await.len(), 1);
}

#[tokio::test]
async fn successful_login_resets_failed_count() {
    let (state, app) = spawn_app().await;
    create_user(&state, "dave", "hunter2hunter2", "editor").await;

    let _ = post_login(&app, "dave", "wrong-1").await;
    let _ = post_login(&app, "dave", "wrong-2").await;
    let user = state
        .store()
        .get_user_by_username("dave")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.failed_attempt_count, 2);

    // One below threshold: the correct password still gets in.
    let response = post_login(&app, "dave", "hunter2hunter2").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["data"]["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["data"]["user"]["username"], "dave");
    assert!(body["data"]["user"]["id"].is_number());
    assert!(body["data"]["user"]["role_id"].is_number());

    let user = state
        .store()
        .get_user_by_username("dave")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.failed_attempt_count, 0);
    assert!(user.is_active);

    assert_eq!(events_of(&state, "USER_LOGIN").await.len(), 1);
}

#[tokio::test]
async fn unknown_username_emits_no_audit_event() {
    let (state, app) = spawn_app().await;

    let response = post_login(&app, "ghost", "whatever-password").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid username or password");

    let all = state.store().recent_audit_events(100).await.unwrap();
    assert!(all.is_empty(), "unknown usernames must not be audited");
}

#[tokio::test]
async fn wrong_password_and_unknown_user_share_a_message() {
    let (state, app) = spawn_app().await;
    create_user(&state, "erin", "a-real-password", "viewer").await;

    let unknown = body_json(post_login(&app, "nobody", "x").await).await;
    let wrong = body_json(post_login(&app, "erin", "not-the-password").await).await;

    assert_eq!(unknown["error"], wrong["error"]);
}

#[tokio::test]
async fn disabled_account_is_blocked_with_correct_password() {
    let (state, app) = spawn_app().await;
    create_user(&state, "frank", "frank-password", "editor").await;
    assert!(state.store().deactivate_user("frank").await.unwrap());

    let response = post_login(&app, "frank", "frank-password").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let user = state
        .store()
        .get_user_by_username("frank")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.failed_attempt_count, 0);

    assert_eq!(events_of(&state, "LOGIN_BLOCKED_INACTIVE").await.len(), 1);
    assert!(events_of(&state, "LOGIN_FAILED").await.is_empty());
}

#[tokio::test]
async fn login_rejects_empty_fields() {
    let (_, app) = spawn_app().await;

    let response = post_login(&app, "", "password").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_login(&app, "admin", "").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn me_returns_identity_and_records_session_check() {
    let (state, app) = spawn_app().await;

    let login = body_json(post_login(&app, "admin", "password").await).await;
    let token = login["data"]["token"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["username"], "admin");
    assert_eq!(body["data"]["role"], "admin");

    assert_eq!(events_of(&state, "SESSION_CHECK").await.len(), 1);
}

#[tokio::test]
async fn me_requires_a_valid_token() {
    let (_, app) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .header("Authorization", "Bearer not.a.token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_acknowledges_and_records_event() {
    let (state, app) = spawn_app().await;

    let login = body_json(post_login(&app, "admin", "password").await).await;
    let token = login["data"]["token"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    settle().await;
    assert_eq!(events_of(&state, "USER_LOGOUT").await.len(), 1);
}

#[tokio::test]
async fn logout_with_broken_audit_sink_still_succeeds() {
    use sea_orm::{ConnectionTrait, Statement};

    let (state, app) = spawn_app().await;

    let login = body_json(post_login(&app, "admin", "password").await).await;
    let token = login["data"]["token"].as_str().unwrap().to_string();

    // Break the sink: the logout acknowledgement must not care.
    let backend = state.store().conn.get_database_backend();
    state
        .store()
        .conn
        .execute(Statement::from_string(
            backend,
            "DROP TABLE audit_logs".to_string(),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_with_broken_audit_sink_still_authenticates() {
    use sea_orm::{ConnectionTrait, Statement};

    let (state, app) = spawn_app().await;
    create_user(&state, "grace", "grace-password", "viewer").await;

    let backend = state.store().conn.get_database_backend();
    state
        .store()
        .conn
        .execute(Statement::from_string(
            backend,
            "DROP TABLE audit_logs".to_string(),
        ))
        .await
        .unwrap();

    // The audit write fails, the authentication decision stands.
    let response = post_login(&app, "grace", "grace-password").await;
    assert_eq!(response.status(), StatusCode::OK);

    // Same on the failure path: the counter still advances.
    let response = post_login(&app, "grace", "wrong").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let user = state
        .store()
        .get_user_by_username("grace")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.failed_attempt_count, 1);
}

#[tokio::test]
async fn health_endpoint_is_public() {
    let (_, app) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["database"], "ok");
}
