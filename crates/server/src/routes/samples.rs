use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, header},
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::models::{
    audit::{AuditLogFilter, AuditLogPage, LineItemAuditLog, LineItemMessageAuditLog, RequestMeta},
    line_item::{ConfirmLineItem, LineItem, LineItemListQuery, LineItemPage, LineItemWithMessages},
    line_item_message::{LineItemMessage, UpdateLineItemMessage},
    project::Project,
    user::User,
};
use utils_core::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

fn request_meta(headers: &HeaderMap) -> RequestMeta {
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    RequestMeta {
        ip_address,
        user_agent,
    }
}

pub async fn list_samples(
    Extension(actor): Extension<User>,
    Extension(project): Extension<Project>,
    State(state): State<AppState>,
    Query(query): Query<LineItemListQuery>,
) -> Result<ResponseJson<ApiResponse<LineItemPage>>, ApiError> {
    let assignee = (!actor.is_superuser).then_some(actor.id);
    let page = LineItem::list(&state.db().conn, project.id, assignee, &query).await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

pub async fn get_sample(
    Extension(actor): Extension<User>,
    State(state): State<AppState>,
    Path((project_id, line_index)): Path<(Uuid, i64)>,
) -> Result<ResponseJson<ApiResponse<LineItemWithMessages>>, ApiError> {
    let item = LineItem::find_by_line_index(&state.db().conn, project_id, line_index, &actor).await?;
    Ok(ResponseJson(ApiResponse::success(item)))
}

pub async fn confirm_sample(
    Extension(actor): Extension<User>,
    State(state): State<AppState>,
    Path((project_id, line_item_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    Json(payload): Json<ConfirmLineItem>,
) -> Result<ResponseJson<ApiResponse<LineItemWithMessages>>, ApiError> {
    let meta = request_meta(&headers);
    let item = LineItem::confirm(
        &state.db().conn,
        project_id,
        line_item_id,
        &actor,
        &payload,
        &meta,
    )
    .await?;
    tracing::debug!(%project_id, %line_item_id, user_id = %actor.id, "line item confirmed");
    Ok(ResponseJson(ApiResponse::success(item)))
}

pub async fn update_message(
    Extension(actor): Extension<User>,
    State(state): State<AppState>,
    Path((project_id, message_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    Json(payload): Json<UpdateLineItemMessage>,
) -> Result<ResponseJson<ApiResponse<LineItemMessage>>, ApiError> {
    let meta = request_meta(&headers);
    let message = LineItemMessage::update(
        &state.db().conn,
        project_id,
        message_id,
        &actor,
        &payload,
        &meta,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(message)))
}

pub async fn audit_logs(
    Extension(project): Extension<Project>,
    State(state): State<AppState>,
    Query(filter): Query<AuditLogFilter>,
) -> Result<ResponseJson<ApiResponse<AuditLogPage<LineItemAuditLog>>>, ApiError> {
    let page = LineItemAuditLog::list(&state.db().conn, project.id, &filter).await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

pub async fn message_audit_logs(
    Extension(project): Extension<Project>,
    State(state): State<AppState>,
    Query(filter): Query<AuditLogFilter>,
) -> Result<ResponseJson<ApiResponse<AuditLogPage<LineItemMessageAuditLog>>>, ApiError> {
    let page = LineItemMessageAuditLog::list(&state.db().conn, project.id, &filter).await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

/// Single-path-parameter routes; mounted behind the project loader.
pub fn scoped_router() -> Router<AppState> {
    Router::new()
        .route("/samples", get(list_samples))
        .route("/audit-logs", get(audit_logs))
        .route("/message-audit-logs", get(message_audit_logs))
}

/// Routes with a second path parameter; these resolve the project by uuid
/// in the model layer instead of the loader middleware.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{project_id}/samples/{line_index}", get(get_sample))
        .route("/{project_id}/confirm/{line_item_id}", post(confirm_sample))
        .route("/{project_id}/messages/{message_id}", put(update_message))
}
