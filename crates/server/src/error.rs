use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::{
    DbErr,
    models::{
        line_item::LineItemError, project::ProjectError, task::TaskError, user::UserError,
    },
};
use services::services::{auth::AuthError, export::ExportError};
use thiserror::Error;
use utils_core::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    LineItem(#[from] LineItemError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = match &self {
            ApiError::User(err) => match err {
                UserError::UserNotFound => (StatusCode::NOT_FOUND, "UserError"),
                UserError::DuplicateEmail => (StatusCode::CONFLICT, "UserError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "UserError"),
            },
            ApiError::Project(err) => match err {
                ProjectError::ProjectNotFound => (StatusCode::NOT_FOUND, "ProjectError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "ProjectError"),
            },
            ApiError::LineItem(err) => match err {
                LineItemError::ProjectNotFound
                | LineItemError::LineItemNotFound
                | LineItemError::MessageNotFound => (StatusCode::NOT_FOUND, "LineItemError"),
                LineItemError::TaskNotFound => (StatusCode::BAD_REQUEST, "LineItemError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "LineItemError"),
            },
            ApiError::Task(err) => match err {
                TaskError::ProjectNotFound | TaskError::UserNotFound => {
                    (StatusCode::NOT_FOUND, "TaskError")
                }
                TaskError::InsufficientLineItems { .. }
                | TaskError::InsufficientRemovableTasks { .. } => {
                    (StatusCode::BAD_REQUEST, "TaskError")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "TaskError"),
            },
            ApiError::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::InactiveUser => {
                    (StatusCode::BAD_REQUEST, "AuthError")
                }
                AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "AuthError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "AuthError"),
            },
            ApiError::Export(err) => match err {
                ExportError::InvalidFileName(_) => (StatusCode::BAD_REQUEST, "ExportError"),
                ExportError::LineItem(LineItemError::ProjectNotFound) => {
                    (StatusCode::NOT_FOUND, "ExportError")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "ExportError"),
            },
            ApiError::Database(db_err) => match db_err {
                DbErr::RecordNotFound(_) => (StatusCode::NOT_FOUND, "DatabaseError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            },
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IoError"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "ForbiddenError"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        };

        let error_message = match &self {
            ApiError::Unauthorized => "Unauthorized. Please sign in again.".to_string(),
            ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Internal(msg) => msg.clone(),
            ApiError::User(err) => err.to_string(),
            ApiError::Project(err) => err.to_string(),
            ApiError::LineItem(err) => err.to_string(),
            ApiError::Task(err) => err.to_string(),
            ApiError::Auth(err) => err.to_string(),
            ApiError::Export(err) => err.to_string(),
            _ => format!("{}: {}", error_type, self),
        };

        if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error_type,
                error = %self,
                "API request failed"
            );
        }
        let response = ApiResponse::<()>::error(&error_message);
        (status_code, Json(response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_maps_to_expected_http_statuses() {
        assert_eq!(
            ApiError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("nope".to_string())
                .into_response()
                .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::NotFound("missing".to_string())
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::BadRequest("bad".to_string())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn domain_errors_map_to_expected_http_statuses() {
        assert_eq!(
            ApiError::from(ProjectError::ProjectNotFound)
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(UserError::DuplicateEmail)
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(LineItemError::TaskNotFound)
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(TaskError::InsufficientLineItems {
                requested: 5,
                available: 2
            })
            .into_response()
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AuthError::InvalidToken)
                .into_response()
                .status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
