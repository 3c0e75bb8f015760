use axum::{Json, response::Json as ResponseJson};
use utils_core::response::ApiResponse;

pub async fn health_check() -> ResponseJson<ApiResponse<&'static str>> {
    Json(ApiResponse::success("ok"))
}
