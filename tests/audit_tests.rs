//! Audit trail tests: admin-only listing, ordering, the 100-row cap and
//! the listing's own audit event.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use docuvault::api::AppState;
use docuvault::config::Config;
use docuvault::db::NewAuditEvent;
use docuvault::db::repositories::user::hash_password;
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

async fn spawn_app() -> (Arc<AppState>, Router) {
    let db_path =
        std::env::temp_dir().join(format!("docuvault-audit-test-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config.security.token_secret = "integration-test-secret".to_string();

    let state = docuvault::api::create_app_state_from_config(config, None)
        .await
        .expect("failed to create app state");

    let router = docuvault::api::router(state.clone()).await;
    (state, router)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login_token(app: &Router, username: &str, password: &str) -> String {
    let response = app
        .clone()
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
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    body_json(response).await["data"]["token"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn get_audit(app: &Router, token: &str) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .uri("/api/audit")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn audit_listing_requires_admin_role() {
    let (state, app) = spawn_app().await;

    let viewer_role = state
        .store()
        .get_role_by_name("viewer")
        .await
        .unwrap()
        .unwrap();
    let hash = hash_password("viewer-password", None).unwrap();
    state
        .store()
        .create_user("vera", &hash, viewer_role.id)
        .await
        .unwrap();

    // No token at all.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/audit")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Authenticated, but not an admin.
    let token = login_token(&app, "vera", "viewer-password").await;
    let response = get_audit(&app, &token).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn audit_listing_returns_events_newest_first_with_actor() {
    let (_state, app) = spawn_app().await;

    // Produce a failure then a success for the seeded admin.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({"username": "admin", "password": "wrong"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let token = login_token(&app, "admin", "password").await;

    let response = get_audit(&app, &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let logs = body["data"]["logs"].as_array().unwrap();
    assert_eq!(body["data"]["total"], logs.len());
    assert!(logs.len() >= 2);

    // Strictly descending: newest (created_at, id) first.
    for pair in logs.windows(2) {
        let a = (
            pair[0]["created_at"].as_str().unwrap(),
            pair[0]["id"].as_i64().unwrap(),
        );
        let b = (
            pair[1]["created_at"].as_str().unwrap(),
            pair[1]["id"].as_i64().unwrap(),
        );
        assert!(a >= b, "audit rows must be newest first: {a:?} then {b:?}");
        if a.0 == b.0 {
            assert!(a.1 > b.1);
        }
    }

    let actions: Vec<&str> = logs
        .iter()
        .map(|l| l["action_type"].as_str().unwrap())
        .collect();
    assert!(actions.contains(&"USER_LOGIN"));
    assert!(actions.contains(&"LOGIN_FAILED"));

    // Every event here was the admin's, so the actor join is populated.
    let login_event = logs
        .iter()
        .find(|l| l["action_type"] == "USER_LOGIN")
        .unwrap();
    assert_eq!(login_event["user"]["username"], "admin");
    assert!(login_event["user"]["role_id"].is_number());

    // LOGIN_FAILED carries the structured attempt count.
    let failed_event = logs
        .iter()
        .find(|l| l["action_type"] == "LOGIN_FAILED")
        .unwrap();
    assert_eq!(failed_event["details"]["attempt_count"], 1);
}

#[tokio::test]
async fn viewing_the_audit_log_is_itself_audited() {
    let (state, app) = spawn_app().await;

    let token = login_token(&app, "admin", "password").await;
    let response = get_audit(&app, &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let returned = body_json(response).await["data"]["total"].as_u64().unwrap();

    // The view event is written on a detached task.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let view_events: Vec<_> = state
        .store()
        .recent_audit_events(100)
        .await
        .unwrap()
        .into_iter()
        .map(|(log, _)| log)
        .filter(|log| log.action_type == "VIEW_AUDIT_LOGS")
        .collect();
    assert_eq!(view_events.len(), 1);

    let details: serde_json::Value =
        serde_json::from_str(view_events[0].details.as_deref().unwrap()).unwrap();
    assert_eq!(details["records_viewed"], returned);
}

#[tokio::test]
async fn audit_listing_caps_at_one_hundred_rows() {
    let (state, app) = spawn_app().await;

    for i in 0..120 {
        state
            .store()
            .append_audit_event(NewAuditEvent {
                user_id: None,
                action_type: "USER_LOGIN".to_string(),
                table_name: Some("users".to_string()),
                record_id: None,
                ip_address: None,
                details: Some(serde_json::json!({ "seq": i }).to_string()),
            })
            .await
            .unwrap();
    }

    let token = login_token(&app, "admin", "password").await;
    let response = get_audit(&app, &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let logs = body["data"]["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 100);
    assert_eq!(body["data"]["total"], 100);

    // The newest synthetic row is present, the oldest have been cut off.
    let first_id = logs.first().unwrap()["id"].as_i64().unwrap();
    let last_id = logs.last().unwrap()["id"].as_i64().unwrap();
    assert!(first_id > last_id);
}
