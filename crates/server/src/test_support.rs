use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, header},
};
use db::{
    DBService,
    models::user::{CreateUser, User},
};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use services::services::auth::hash_password;
use tower::ServiceExt;
use uuid::Uuid;

use crate::AppState;

/// In-memory app with one superuser (`admin@example.com` / `admin-password`)
/// and one annotator (`annotator@example.com` / `annotator-password`).
pub async fn setup_app() -> (Router, AppState) {
    let conn = Database::connect("sqlite::memory:").await.unwrap();
    db_migration::Migrator::up(&conn, None).await.unwrap();

    User::create(
        &conn,
        &CreateUser {
            email: "admin@example.com".to_string(),
            full_name: Some("Admin".to_string()),
            hashed_password: hash_password("admin-password"),
            is_active: true,
            is_superuser: true,
        },
        Uuid::new_v4(),
    )
    .await
    .unwrap();
    User::create(
        &conn,
        &CreateUser {
            email: "annotator@example.com".to_string(),
            full_name: Some("Annotator".to_string()),
            hashed_password: hash_password("annotator-password"),
            is_active: true,
            is_superuser: false,
        },
        Uuid::new_v4(),
    )
    .await
    .unwrap();

    let state = AppState::new(DBService { conn });
    (crate::http::router(state.clone()), state)
}

pub async fn login(app: &Router, email: &str, password: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({"email": email, "password": password}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.status().is_success(), "login failed for {email}");

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    json["data"]["token"]
        .as_str()
        .expect("token in login response")
        .to_string()
}

/// Sends a request with a bearer token and returns (status, parsed body).
pub async fn authed_request(
    app: &Router,
    token: &str,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (axum::http::StatusCode, serde_json::Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"));
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}
