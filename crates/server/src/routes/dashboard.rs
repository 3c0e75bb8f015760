use axum::{
    Extension, Router,
    extract::State,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{dashboard, dashboard::ProjectDashboard, user::User};
use utils_core::response::ApiResponse;

use crate::{AppState, error::ApiError, http::auth::ensure_superuser};

pub async fn get_dashboard(
    Extension(actor): Extension<User>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<ProjectDashboard>>>, ApiError> {
    ensure_superuser(&actor)?;
    let boards = dashboard::overview(&state.db().conn).await?;
    Ok(ResponseJson(ApiResponse::success(boards)))
}

pub async fn get_dashboard_me(
    Extension(actor): Extension<User>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<ProjectDashboard>>>, ApiError> {
    let boards = dashboard::for_user(&state.db().conn, actor.id).await?;
    Ok(ResponseJson(ApiResponse::success(boards)))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/dashboard",
        Router::new()
            .route("/", get(get_dashboard))
            .route("/me", get(get_dashboard_me)),
    )
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::test_support::{authed_request, login, setup_app};

    #[tokio::test]
    async fn admin_dashboard_is_superuser_only() {
        let (app, _state) = setup_app().await;
        let token = login(&app, "annotator@example.com", "annotator-password").await;

        let (status, _) = authed_request(&app, &token, "GET", "/api/dashboard", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = authed_request(&app, &token, "GET", "/api/dashboard/me", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 0);
    }
}
