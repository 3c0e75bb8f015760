use axum::{
    Extension, Json, Router,
    extract::{Request, State},
    http::header,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::user::User;
use serde::{Deserialize, Serialize};
use utils_core::response::ApiResponse;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<ResponseJson<ApiResponse<LoginResponse>>, ApiError> {
    let (token, user) = state
        .auth()
        .login(&state.db().conn, &payload.email, &payload.password)
        .await?;
    tracing::info!(user_id = %user.id, "user logged in");
    Ok(ResponseJson(ApiResponse::success(LoginResponse {
        token,
        user,
    })))
}

pub async fn logout(
    State(state): State<AppState>,
    request: Request,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    if let Some(token) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split_once(' '))
        .map(|(_, token)| token.trim())
    {
        state.auth().logout(token);
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn me(
    Extension(user): Extension<User>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(user)))
}

/// Routes that require a session.
pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/auth",
        Router::new()
            .route("/logout", post(logout))
            .route("/me", get(me)),
    )
}

/// Login stays reachable without a token.
pub fn public_router() -> Router<AppState> {
    Router::new().route("/auth/login", post(login))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::test_support::{authed_request, login, setup_app};

    #[tokio::test]
    async fn me_returns_the_session_user() {
        let (app, _state) = setup_app().await;
        let token = login(&app, "annotator@example.com", "annotator-password").await;

        let (status, body) = authed_request(&app, &token, "GET", "/api/auth/me", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["email"], "annotator@example.com");
        assert_eq!(body["data"]["is_superuser"], false);
        assert!(body["data"].get("hashed_password").is_none());
    }

    #[tokio::test]
    async fn logout_invalidates_the_token() {
        let (app, _state) = setup_app().await;
        let token = login(&app, "annotator@example.com", "annotator-password").await;

        let (status, _) = authed_request(&app, &token, "POST", "/api/auth/logout", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = authed_request(&app, &token, "GET", "/api/auth/me", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
