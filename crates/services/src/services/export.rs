use std::path::{Path, PathBuf};

use db::{
    models::line_item::{LineItem, LineItemError},
    types::LineItemStatus,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    LineItem(#[from] LineItemError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Invalid file name: {0}")]
    InvalidFileName(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportRequest {
    pub file_name: String,
    pub limit: Option<u64>,
    #[serde(default)]
    pub include_statuses: Vec<LineItemStatus>,
}

/// Writes the project's line items to `<dir>/<file_name>.jsonl` in the
/// import format and returns the path. Message feedback and statuses stay
/// internal; only role/content leave the system.
pub async fn export_project(
    db: &DatabaseConnection,
    project_id: Uuid,
    request: &ExportRequest,
    dir: &Path,
) -> Result<PathBuf, ExportError> {
    let file_name = sanitize_file_name(&request.file_name)?;

    let items = LineItem::find_for_export(
        db,
        project_id,
        request.limit,
        &request.include_statuses,
    )
    .await?;

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{file_name}.jsonl"));
    let mut file = tokio::fs::File::create(&path).await?;
    for item in items {
        let line = json!({
            "tools": item.line_item.tools,
            "messages": item
                .line_messages
                .iter()
                .map(|message| json!({"role": message.role, "content": message.content}))
                .collect::<Vec<_>>(),
        });
        file.write_all(line.to_string().as_bytes()).await?;
        file.write_all(b"\n").await?;
    }
    file.flush().await?;

    tracing::info!(%project_id, path = %path.display(), "exported dataset");
    Ok(path)
}

fn sanitize_file_name(name: &str) -> Result<&str, ExportError> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed.contains('/')
        || trimmed.contains('\\')
        || trimmed.contains("..")
    {
        return Err(ExportError::InvalidFileName(name.to_string()));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use db::models::{
        audit::RequestMeta,
        line_item::{ConfirmLineItem, LineItemListQuery},
        line_item_message::{ImportedMessage, LineItemMessage},
        project::{CreateProject, Project},
        user::{CreateUser, User},
    };
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;

    async fn setup() -> (DatabaseConnection, User, Uuid) {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        let admin = User::create(
            &db,
            &CreateUser {
                email: "admin@example.com".to_string(),
                full_name: None,
                hashed_password: "salt$hash".to_string(),
                is_active: true,
                is_superuser: true,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let project_id = Uuid::new_v4();
        Project::create(
            &db,
            &CreateProject {
                name: "dataset".to_string(),
                description: None,
                url: "https://example.com/x.jsonl".to_string(),
                owner_id: admin.id,
            },
            project_id,
        )
        .await
        .unwrap();

        let project_row_id = db::models::ids::project_id_by_uuid(&db, project_id)
            .await
            .unwrap()
            .unwrap();
        for line_index in 1..=3 {
            let row_id = LineItem::insert_imported(
                &db,
                project_row_id,
                line_index,
                json!([{"name": "search"}]),
            )
            .await
            .unwrap();
            LineItemMessage::insert_imported_many(
                &db,
                row_id,
                &[ImportedMessage {
                    line_message_index: 1,
                    role: "user".to_string(),
                    content: format!("q{line_index}"),
                }],
            )
            .await
            .unwrap();
        }
        (db, admin, project_id)
    }

    #[tokio::test]
    async fn export_writes_import_shaped_ndjson() {
        let (db, _admin, project_id) = setup().await;
        let dir = tempfile::tempdir().unwrap();

        let path = export_project(
            &db,
            project_id,
            &ExportRequest {
                file_name: "out".to_string(),
                limit: Some(2),
                include_statuses: Vec::new(),
            },
            dir.path(),
        )
        .await
        .unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["tools"][0]["name"], "search");
        assert_eq!(first["messages"][0]["role"], "user");
        assert_eq!(first["messages"][0]["content"], "q1");
        assert!(first.get("status").is_none());
    }

    #[tokio::test]
    async fn status_filter_limits_the_export() {
        let (db, admin, project_id) = setup().await;
        let dir = tempfile::tempdir().unwrap();

        let page = LineItem::list(&db, project_id, None, &LineItemListQuery::default())
            .await
            .unwrap();
        LineItem::confirm(
            &db,
            project_id,
            page.data[1].id,
            &admin,
            &ConfirmLineItem {
                line_messages: Vec::new(),
                tools: None,
                feedback: None,
                status: LineItemStatus::Confirmed,
            },
            &RequestMeta::default(),
        )
        .await
        .unwrap();

        let path = export_project(
            &db,
            project_id,
            &ExportRequest {
                file_name: "confirmed".to_string(),
                limit: None,
                include_statuses: vec![LineItemStatus::Confirmed],
            },
            dir.path(),
        )
        .await
        .unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[tokio::test]
    async fn traversal_file_names_are_rejected() {
        let (db, _admin, project_id) = setup().await;
        let dir = tempfile::tempdir().unwrap();

        let err = export_project(
            &db,
            project_id,
            &ExportRequest {
                file_name: "../escape".to_string(),
                limit: None,
                include_statuses: Vec::new(),
            },
            dir.path(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ExportError::InvalidFileName(_)));
    }
}
