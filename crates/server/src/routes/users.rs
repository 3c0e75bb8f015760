use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::user::{CreateUser, UpdateUser, User};
use serde::Deserialize;
use services::services::auth::hash_password;
use utils_core::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, http::auth::ensure_superuser};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub is_active: Option<bool>,
    pub is_superuser: Option<bool>,
}

pub async fn get_users(
    Extension(actor): Extension<User>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<User>>>, ApiError> {
    ensure_superuser(&actor)?;
    let users = User::find_all(&state.db().conn).await?;
    Ok(ResponseJson(ApiResponse::success(users)))
}

pub async fn create_user(
    Extension(actor): Extension<User>,
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    ensure_superuser(&actor)?;
    let user = User::create(
        &state.db().conn,
        &CreateUser {
            email: payload.email,
            full_name: payload.full_name,
            hashed_password: hash_password(&payload.password),
            is_active: payload.is_active,
            is_superuser: payload.is_superuser,
        },
        Uuid::new_v4(),
    )
    .await?;
    tracing::info!(user_id = %user.id, "user created");
    Ok(ResponseJson(ApiResponse::success(user)))
}

pub async fn update_user(
    Extension(actor): Extension<User>,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    ensure_superuser(&actor)?;
    let update = UpdateUser {
        email: payload.email,
        full_name: payload.full_name,
        hashed_password: payload.password.as_deref().map(hash_password),
        is_active: payload.is_active,
        is_superuser: payload.is_superuser,
    };
    let user = User::update(&state.db().conn, user_id, &update).await?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

pub async fn delete_user(
    Extension(actor): Extension<User>,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    ensure_superuser(&actor)?;
    if actor.id == user_id {
        return Err(ApiError::BadRequest(
            "Users cannot delete themselves".to_string(),
        ));
    }
    let rows_affected = User::delete(&state.db().conn, user_id).await?;
    if rows_affected == 0 {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/users",
        Router::new()
            .route("/", get(get_users).post(create_user))
            .route("/{user_id}", axum::routing::put(update_user).delete(delete_user)),
    )
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::test_support::{authed_request, login, setup_app};

    #[tokio::test]
    async fn annotators_cannot_manage_users() {
        let (app, _state) = setup_app().await;
        let token = login(&app, "annotator@example.com", "annotator-password").await;

        let (status, _) = authed_request(&app, &token, "GET", "/api/users", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn superuser_creates_and_deletes_users() {
        let (app, _state) = setup_app().await;
        let token = login(&app, "admin@example.com", "admin-password").await;

        let (status, body) = authed_request(
            &app,
            &token,
            "POST",
            "/api/users",
            Some(serde_json::json!({
                "email": "new@example.com",
                "password": "new-password",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let new_id = body["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["is_superuser"], false);

        // The new user can log in with the plaintext password.
        login(&app, "new@example.com", "new-password").await;

        let (status, _) = authed_request(
            &app,
            &token,
            "DELETE",
            &format!("/api/users/{new_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn duplicate_emails_conflict() {
        let (app, _state) = setup_app().await;
        let token = login(&app, "admin@example.com", "admin-password").await;

        let (status, _) = authed_request(
            &app,
            &token,
            "POST",
            "/api/users",
            Some(serde_json::json!({
                "email": "annotator@example.com",
                "password": "x",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn self_deletion_is_rejected() {
        let (app, _state) = setup_app().await;
        let token = login(&app, "admin@example.com", "admin-password").await;

        let (_, body) = authed_request(&app, &token, "GET", "/api/auth/me", None).await;
        let my_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, _) = authed_request(
            &app,
            &token,
            "DELETE",
            &format!("/api/users/{my_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
