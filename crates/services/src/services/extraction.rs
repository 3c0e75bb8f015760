use std::path::Path;

use db::models::{line_item::LineItem, line_item_message::{ImportedMessage, LineItemMessage}, project::Project};
use futures_util::StreamExt;
use sea_orm::{DatabaseConnection, DbErr, TransactionTrait};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use url::Url;
use uuid::Uuid;

use crate::services::jobs::{JobHandle, JobSnapshot};

/// Line items committed per transaction during import.
const BATCH_SIZE: usize = 50;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Invalid dataset url: {0}")]
    InvalidUrl(String),
    #[error("Download failed: {0}")]
    Download(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Malformed record on line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
    #[error("Project not found")]
    ProjectNotFound,
}

fn empty_tools() -> serde_json::Value {
    json!([])
}

/// One NDJSON record of the import format.
#[derive(Debug, Deserialize)]
pub struct ImportRecord {
    #[serde(default = "empty_tools")]
    pub tools: serde_json::Value,
    pub messages: Vec<ImportMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ImportMessage {
    pub role: String,
    pub content: String,
}

/// Turns a shared Google Drive link into its direct download form. Links
/// outside Google Drive are taken as direct download urls.
pub fn download_url(raw: &str) -> Result<String, ExtractionError> {
    let parsed = Url::parse(raw).map_err(|_| ExtractionError::InvalidUrl(raw.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ExtractionError::InvalidUrl(raw.to_string()));
    }

    let host = parsed.host_str().unwrap_or_default();
    if !host.ends_with("drive.google.com") {
        return Ok(raw.to_string());
    }

    let file_id = drive_file_id(&parsed).ok_or_else(|| ExtractionError::InvalidUrl(raw.to_string()))?;
    Ok(format!(
        "https://drive.google.com/uc?export=download&id={file_id}&confirm=t"
    ))
}

fn drive_file_id(url: &Url) -> Option<String> {
    // https://drive.google.com/file/d/<id>/view
    if let Some(mut segments) = url.path_segments() {
        while let Some(segment) = segments.next() {
            if segment == "d" {
                return segments.next().filter(|id| !id.is_empty()).map(str::to_string);
            }
        }
    }
    // https://drive.google.com/open?id=<id>
    url.query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())
}

/// Streams the url to `dest`, replacing any previous file.
pub async fn download_to_file(url: &str, dest: &Path) -> Result<(), ExtractionError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let response = reqwest::get(url).await?.error_for_status()?;
    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    Ok(())
}

/// Full import job: download the project's dataset, load it, mark the
/// project completed. Returns the terminal snapshot for the job tracker.
pub async fn run(
    db: &DatabaseConnection,
    project_id: Uuid,
    handle: &JobHandle,
) -> Result<JobSnapshot, ExtractionError> {
    let project = Project::find_by_id(db, project_id)
        .await?
        .ok_or(ExtractionError::ProjectNotFound)?;

    publish(
        db,
        project_id,
        handle,
        JobSnapshot::new("downloading", "Downloading file from Google Drive"),
    )
    .await?;

    let url = download_url(&project.url)?;
    let path = utils_core::assets::temp_download_dir().join(format!("{project_id}.jsonl"));
    download_to_file(&url, &path).await?;

    let snapshot = import_file(db, project_id, &path, handle).await?;

    if let Err(err) = tokio::fs::remove_file(&path).await {
        tracing::warn!(path = %path.display(), error = %err, "failed to remove downloaded file");
    }
    Ok(snapshot)
}

/// Loads an NDJSON file into the project in batched transactions, reporting
/// progress after every batch. Already-committed batches survive a failure.
pub async fn import_file(
    db: &DatabaseConnection,
    project_id: Uuid,
    path: &Path,
    handle: &JobHandle,
) -> Result<JobSnapshot, ExtractionError> {
    publish(
        db,
        project_id,
        handle,
        JobSnapshot::new("extracting", "Starting extraction process ..."),
    )
    .await?;

    let project_row_id = db::models::ids::project_id_by_uuid(db, project_id)
        .await?
        .ok_or(ExtractionError::ProjectNotFound)?;

    let text = tokio::fs::read_to_string(path).await?;
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .collect();
    let total = lines.len();
    tracing::info!(%project_id, total, "starting dataset import");

    let mut current: usize = 0;
    for batch in lines.chunks(BATCH_SIZE) {
        let txn = db.begin().await?;
        for (line_number, raw) in batch {
            let record: ImportRecord =
                serde_json::from_str(raw).map_err(|source| ExtractionError::Parse {
                    line: line_number + 1,
                    source,
                })?;
            current += 1;
            let line_item_row_id =
                LineItem::insert_imported(&txn, project_row_id, current as i64, record.tools)
                    .await?;
            let messages: Vec<ImportedMessage> = record
                .messages
                .into_iter()
                .enumerate()
                .map(|(index, message)| ImportedMessage {
                    line_message_index: (index + 1) as i64,
                    role: message.role,
                    content: message.content,
                })
                .collect();
            LineItemMessage::insert_imported_many(&txn, line_item_row_id, &messages).await?;
        }
        txn.commit().await?;

        let percent = current as f64 / total as f64 * 100.0;
        publish(
            db,
            project_id,
            handle,
            JobSnapshot::new("extracting", format!("{percent:.2}% - {current}/{total}")),
        )
        .await?;
    }

    Project::set_status(db, project_id, "completed").await?;
    tracing::info!(%project_id, imported = current, "dataset import finished");
    Ok(JobSnapshot::new("completed", "Extraction process completed"))
}

/// Reports to the tracker and mirrors the snapshot onto the project row.
async fn publish(
    db: &DatabaseConnection,
    project_id: Uuid,
    handle: &JobHandle,
    snapshot: JobSnapshot,
) -> Result<(), DbErr> {
    Project::update_info(
        db,
        project_id,
        json!({"type": snapshot.kind, "content": snapshot.content}),
    )
    .await?;
    handle.report(snapshot);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{io::Write, time::Duration};

    use db::models::{
        line_item::{LineItem, LineItemListQuery},
        project::CreateProject,
        user::{CreateUser, User},
    };
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::services::jobs::{JobState, JobTracker};

    #[test]
    fn drive_links_resolve_to_direct_downloads() {
        let url = download_url("https://drive.google.com/file/d/abc123/view?usp=sharing").unwrap();
        assert_eq!(
            url,
            "https://drive.google.com/uc?export=download&id=abc123&confirm=t"
        );

        let url = download_url("https://drive.google.com/open?id=xyz789").unwrap();
        assert_eq!(
            url,
            "https://drive.google.com/uc?export=download&id=xyz789&confirm=t"
        );

        // Direct links pass through untouched.
        let url = download_url("https://example.com/data.jsonl").unwrap();
        assert_eq!(url, "https://example.com/data.jsonl");

        assert!(download_url("https://drive.google.com/drive/my-drive").is_err());
        assert!(download_url("not a url").is_err());
        assert!(download_url("ftp://example.com/x.jsonl").is_err());
    }

    #[test]
    fn records_parse_with_default_tools() {
        let record: ImportRecord =
            serde_json::from_str(r#"{"messages": [{"role": "user", "content": "hi"}]}"#).unwrap();
        assert_eq!(record.tools, json!([]));
        assert_eq!(record.messages.len(), 1);

        let record: ImportRecord = serde_json::from_str(
            r#"{"tools": [{"name": "search"}], "messages": [{"role": "user", "content": "hi"}]}"#,
        )
        .unwrap();
        assert_eq!(record.tools[0]["name"], "search");

        assert!(serde_json::from_str::<ImportRecord>(r#"{"tools": []}"#).is_err());
    }

    async fn setup_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    async fn seed_project(db: &DatabaseConnection) -> Uuid {
        let owner = User::create(
            db,
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
        db::models::project::Project::create(
            db,
            &CreateProject {
                name: "dataset".to_string(),
                description: None,
                url: "https://example.com/x.jsonl".to_string(),
                owner_id: owner.id,
            },
            project_id,
        )
        .await
        .unwrap();
        project_id
    }

    async fn wait_for_terminal(tracker: &JobTracker, job_id: Uuid) -> crate::services::jobs::JobStatus {
        for _ in 0..200 {
            if let Some(status) = tracker.poll(job_id)
                && status.state != JobState::Progress
            {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job never finished");
    }

    #[tokio::test]
    async fn import_loads_records_in_file_order() {
        let db = setup_db().await;
        let project_id = seed_project(&db).await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 1..=3 {
            writeln!(
                file,
                r#"{{"messages": [{{"role": "user", "content": "q{i}"}}, {{"role": "assistant", "content": "a{i}"}}]}}"#
            )
            .unwrap();
        }
        writeln!(file).unwrap();
        let path = file.path().to_path_buf();

        let tracker = JobTracker::new();
        let job_db = db.clone();
        let job_id = tracker.submit(move |handle| async move {
            Ok(import_file(&job_db, project_id, &path, &handle).await?)
        });

        let status = wait_for_terminal(&tracker, job_id).await;
        assert_eq!(status.state, JobState::Success);
        let info = status.info.unwrap();
        assert_eq!(info.kind, "completed");
        assert_eq!(info.content, "Extraction process completed");

        let page = LineItem::list(&db, project_id, None, &LineItemListQuery::default())
            .await
            .unwrap();
        assert_eq!(page.total_count, 3);
        assert_eq!(page.data[0].line_index, 1);
        assert_eq!(page.data[2].line_index, 3);

        let project = Project::find_by_id(&db, project_id).await.unwrap().unwrap();
        assert_eq!(project.status, "completed");
        let info = project.info.unwrap();
        assert_eq!(info["type"], "extracting");
        assert_eq!(info["content"], "100.00% - 3/3");
    }

    #[tokio::test]
    async fn malformed_line_fails_the_job() {
        let db = setup_db().await;
        let project_id = seed_project(&db).await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{not json").unwrap();
        let path = file.path().to_path_buf();

        let tracker = JobTracker::new();
        let job_db = db.clone();
        let job_id = tracker.submit(move |handle| async move {
            Ok(import_file(&job_db, project_id, &path, &handle).await?)
        });

        let status = wait_for_terminal(&tracker, job_id).await;
        assert_eq!(status.state, JobState::Failure);
        assert!(status.info.unwrap().content.contains("line 1"));

        // Nothing committed, project still processing.
        let project = Project::find_by_id(&db, project_id).await.unwrap().unwrap();
        assert_eq!(project.status, "processing");
    }
}
