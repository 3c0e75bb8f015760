use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::header,
    middleware::from_fn_with_state,
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::{delete, get, post},
};
use db::models::{
    project::{CreateProject, Project},
    task::{AssignmentSummary, Task},
    user::User,
};
use serde::{Deserialize, Serialize};
use services::services::{
    export::{self, ExportRequest},
    extraction::{self, ExtractionError},
    jobs::{JobSnapshot, JobState},
};
use utils_core::response::ApiResponse;
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    http::auth::ensure_superuser,
    middleware::load_project_middleware,
    routes::samples,
};

pub async fn get_projects(
    Extension(actor): Extension<User>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<Project>>>, ApiError> {
    let projects = if actor.is_superuser {
        Project::find_all(&state.db().conn).await?
    } else {
        Project::find_for_user(&state.db().conn, actor.id).await?
    };
    Ok(ResponseJson(ApiResponse::success(projects)))
}

pub async fn get_project(
    Extension(project): Extension<Project>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn create_project(
    Extension(actor): Extension<User>,
    State(state): State<AppState>,
    Json(mut payload): Json<CreateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    ensure_superuser(&actor)?;

    // Reject unusable urls before creating anything.
    if let Err(ExtractionError::InvalidUrl(url)) = extraction::download_url(&payload.url) {
        return Err(ApiError::BadRequest(format!("Invalid dataset url: {url}")));
    }

    payload.owner_id = actor.id;
    let project = Project::create(&state.db().conn, &payload, Uuid::new_v4()).await?;
    tracing::info!(project_id = %project.id, "project created, starting extraction");

    let job_conn = state.db().conn.clone();
    let project_id = project.id;
    let job_id = state.jobs().submit(move |handle| async move {
        Ok(extraction::run(&job_conn, project_id, &handle).await?)
    });
    Project::set_job(&state.db().conn, project.id, job_id).await?;

    let project = Project::find_by_id(&state.db().conn, project.id)
        .await?
        .ok_or(ApiError::NotFound("Project not found".to_string()))?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn delete_project(
    Extension(actor): Extension<User>,
    Extension(project): Extension<Project>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    ensure_superuser(&actor)?;
    let rows_affected = Project::delete(&state.db().conn, project.id).await?;
    if rows_affected == 0 {
        return Err(ApiError::NotFound("Project not found".to_string()));
    }
    tracing::info!(project_id = %project.id, "project deleted");
    Ok(ResponseJson(ApiResponse::success(())))
}

#[derive(Debug, Serialize)]
pub struct ProjectStatusResponse {
    pub status: String,
    pub state: JobState,
    pub info: Option<JobSnapshot>,
    pub num_samples: u64,
    pub num_task_assigned: u64,
    pub num_task_not_assigned: u64,
    pub user_task_summary: Vec<db::models::task::UserAssignment>,
}

pub async fn get_project_status(
    Extension(project): Extension<Project>,
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<ProjectStatusResponse>>, ApiError> {
    let live = project.job_id.and_then(|job_id| state.jobs().poll(job_id));
    let (job_state, info) = match live {
        Some(status) => (status.state, status.info),
        // Tracker state is in-memory; reconstruct from the mirrored row
        // after a restart.
        None => {
            let state = if project.status == "completed" {
                JobState::Success
            } else {
                JobState::Progress
            };
            let info = project
                .info
                .clone()
                .and_then(|value| serde_json::from_value(value).ok());
            (state, info)
        }
    };

    let summary = Task::assignment_summary(&state.db().conn, project.id).await?;
    Ok(ResponseJson(ApiResponse::success(ProjectStatusResponse {
        status: project.status,
        state: job_state,
        info,
        num_samples: summary.num_samples,
        num_task_assigned: summary.num_task_assigned,
        num_task_not_assigned: summary.num_task_not_assigned,
        user_task_summary: summary.assignments,
    })))
}

#[derive(Debug, Deserialize)]
pub struct AssignTaskRequest {
    pub user_id: Uuid,
    pub num_samples: u64,
}

pub async fn assign_tasks(
    Extension(actor): Extension<User>,
    Extension(project): Extension<Project>,
    State(state): State<AppState>,
    Json(payload): Json<AssignTaskRequest>,
) -> Result<ResponseJson<ApiResponse<AssignmentSummary>>, ApiError> {
    ensure_superuser(&actor)?;
    let created = Task::assign(
        &state.db().conn,
        project.id,
        payload.user_id,
        payload.num_samples,
    )
    .await?;
    tracing::info!(
        project_id = %project.id,
        user_id = %payload.user_id,
        created,
        "tasks assigned"
    );
    let summary = Task::assignment_summary(&state.db().conn, project.id).await?;
    Ok(ResponseJson(ApiResponse::success(summary)))
}

pub async fn modify_assignment(
    Extension(actor): Extension<User>,
    Extension(project): Extension<Project>,
    State(state): State<AppState>,
    Json(payload): Json<AssignTaskRequest>,
) -> Result<ResponseJson<ApiResponse<AssignmentSummary>>, ApiError> {
    ensure_superuser(&actor)?;
    Task::modify_assignment(
        &state.db().conn,
        project.id,
        payload.user_id,
        payload.num_samples,
    )
    .await?;
    let summary = Task::assignment_summary(&state.db().conn, project.id).await?;
    Ok(ResponseJson(ApiResponse::success(summary)))
}

#[derive(Debug, Serialize)]
pub struct ReleasedTasks {
    pub removed: u64,
}

pub async fn delete_user_tasks(
    Extension(actor): Extension<User>,
    State(state): State<AppState>,
    Path((project_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<ReleasedTasks>>, ApiError> {
    ensure_superuser(&actor)?;
    let removed = Task::delete_user_tasks(&state.db().conn, project_id, user_id).await?;
    tracing::info!(%project_id, %user_id, removed, "tasks released");
    Ok(ResponseJson(ApiResponse::success(ReleasedTasks {
        removed,
    })))
}

pub async fn download_project(
    Extension(actor): Extension<User>,
    Extension(project): Extension<Project>,
    State(state): State<AppState>,
    Json(payload): Json<ExportRequest>,
) -> Result<Response, ApiError> {
    ensure_superuser(&actor)?;
    let path = export::export_project(
        &state.db().conn,
        project.id,
        &payload,
        &utils_core::assets::temp_download_dir(),
    )
    .await?;

    let bytes = tokio::fs::read(&path).await?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "export.jsonl".to_string());
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

pub fn router(state: &AppState) -> Router<AppState> {
    let project_id_router = Router::new()
        .route("/", get(get_project).delete(delete_project))
        .route("/status", get(get_project_status))
        .route("/assign", post(assign_tasks).put(modify_assignment))
        .route("/download", post(download_project))
        .merge(samples::scoped_router())
        .layer(from_fn_with_state(
            state.clone(),
            load_project_middleware::<AppState>,
        ));

    let projects_router = Router::new()
        .route("/", get(get_projects).post(create_project))
        .route(
            "/{project_id}/users/{user_id}/tasks",
            delete(delete_user_tasks),
        )
        .merge(samples::router())
        .nest("/{project_id}", project_id_router);

    Router::new().nest("/projects", projects_router)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::test_support::{authed_request, login, setup_app};

    #[tokio::test]
    async fn annotators_cannot_create_projects() {
        let (app, _state) = setup_app().await;
        let token = login(&app, "annotator@example.com", "annotator-password").await;

        let (status, _) = authed_request(
            &app,
            &token,
            "POST",
            "/api/projects",
            Some(serde_json::json!({
                "name": "dataset",
                "url": "https://drive.google.com/file/d/abc/view",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn invalid_dataset_urls_are_rejected() {
        let (app, _state) = setup_app().await;
        let token = login(&app, "admin@example.com", "admin-password").await;

        let (status, _) = authed_request(
            &app,
            &token,
            "POST",
            "/api/projects",
            Some(serde_json::json!({
                "name": "dataset",
                "url": "https://drive.google.com/drive/my-drive",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn created_project_starts_processing_with_a_job() {
        let (app, _state) = setup_app().await;
        let token = login(&app, "admin@example.com", "admin-password").await;

        // Unreachable host: the background job fails quickly, the project
        // row itself is still created.
        let (status, body) = authed_request(
            &app,
            &token,
            "POST",
            "/api/projects",
            Some(serde_json::json!({
                "name": "dataset",
                "description": "import test",
                "url": "http://127.0.0.1:9/never.jsonl",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "processing");
        assert!(body["data"]["job_id"].is_string());
        let project_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = authed_request(
            &app,
            &token,
            "GET",
            &format!("/api/projects/{project_id}/status"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["num_samples"], 0);
        assert!(body["data"]["state"].is_string());
    }

    #[tokio::test]
    async fn annotators_see_only_their_projects() {
        let (app, _state) = setup_app().await;
        let token = login(&app, "annotator@example.com", "annotator-password").await;

        let (status, body) = authed_request(&app, &token, "GET", "/api/projects", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn unknown_project_is_a_404() {
        let (app, _state) = setup_app().await;
        let token = login(&app, "admin@example.com", "admin-password").await;

        let (status, _) = authed_request(
            &app,
            &token,
            "GET",
            &format!("/api/projects/{}", uuid::Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
