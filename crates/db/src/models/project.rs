use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, JsonValue, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    entities::{
        line_item, line_item_audit_log, line_item_message, line_item_message_audit_log, project,
        task,
    },
    models::ids,
};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Project not found")]
    ProjectNotFound,
    #[error("Failed to create project: {0}")]
    CreateFailed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub owner_id: Uuid,
    pub status: String,
    pub job_id: Option<Uuid>,
    pub info: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    #[serde(default)]
    pub owner_id: Uuid,
}

impl Project {
    async fn from_model<C: ConnectionTrait>(db: &C, model: project::Model) -> Result<Self, DbErr> {
        let owner_id = ids::user_uuid_by_id(db, model.owner_id)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;
        Ok(Self {
            id: model.uuid,
            name: model.name,
            description: model.description,
            url: model.url,
            owner_id,
            status: model.status,
            job_id: model.job_id,
            info: model.info,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = project::Entity::find()
            .order_by_desc(project::Column::CreatedAt)
            .all(db)
            .await?;
        let mut projects = Vec::with_capacity(records.len());
        for record in records {
            projects.push(Self::from_model(db, record).await?);
        }
        Ok(projects)
    }

    /// Projects visible to an annotator: only those where they hold at
    /// least one task.
    pub async fn find_for_user<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(user_row_id) = ids::user_id_by_uuid(db, user_id).await? else {
            return Ok(Vec::new());
        };

        let project_row_ids: Vec<i64> = task::Entity::find()
            .select_only()
            .column(task::Column::ProjectId)
            .filter(task::Column::UserId.eq(user_row_id))
            .distinct()
            .into_tuple()
            .all(db)
            .await?;

        if project_row_ids.is_empty() {
            return Ok(Vec::new());
        }

        let records = project::Entity::find()
            .filter(project::Column::Id.is_in(project_row_ids))
            .order_by_desc(project::Column::CreatedAt)
            .all(db)
            .await?;
        let mut projects = Vec::with_capacity(records.len());
        for record in records {
            projects.push(Self::from_model(db, record).await?);
        }
        Ok(projects)
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = project::Entity::find()
            .filter(project::Column::Uuid.eq(id))
            .one(db)
            .await?;
        match record {
            Some(model) => Ok(Some(Self::from_model(db, model).await?)),
            None => Ok(None),
        }
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateProject,
        project_id: Uuid,
    ) -> Result<Self, DbErr> {
        let owner_row_id = ids::user_id_by_uuid(db, data.owner_id)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;

        let now = Utc::now();
        let active = project::ActiveModel {
            uuid: Set(project_id),
            name: Set(data.name.clone()),
            description: Set(data.description.clone()),
            url: Set(data.url.clone()),
            owner_id: Set(owner_row_id),
            status: Set("processing".to_string()),
            job_id: Set(None),
            info: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        Self::from_model(db, model).await
    }

    pub async fn set_job<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        job_id: Uuid,
    ) -> Result<(), DbErr> {
        let record = project::Entity::find()
            .filter(project::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;
        let mut active: project::ActiveModel = record.into();
        active.job_id = Set(Some(job_id));
        active.status = Set("processing".to_string());
        active.updated_at = Set(Utc::now().into());
        active.update(db).await?;
        Ok(())
    }

    pub async fn set_status<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        status: &str,
    ) -> Result<(), DbErr> {
        let record = project::Entity::find()
            .filter(project::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;
        let mut active: project::ActiveModel = record.into();
        active.status = Set(status.to_string());
        active.updated_at = Set(Utc::now().into());
        active.update(db).await?;
        Ok(())
    }

    /// Mirror of the latest job progress snapshot, so progress survives a
    /// tracker restart.
    pub async fn update_info<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        info: JsonValue,
    ) -> Result<(), DbErr> {
        let record = project::Entity::find()
            .filter(project::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;
        let mut active: project::ActiveModel = record.into();
        active.info = Set(Some(info));
        active.updated_at = Set(Utc::now().into());
        active.update(db).await?;
        Ok(())
    }

    /// Removes the project and every dependent row. Children are deleted
    /// explicitly since sqlite connections do not always enforce foreign
    /// key cascades.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let Some(project_row_id) = ids::project_id_by_uuid(db, id).await? else {
            return Ok(0);
        };

        let line_item_ids: Vec<i64> = line_item::Entity::find()
            .select_only()
            .column(line_item::Column::Id)
            .filter(line_item::Column::ProjectId.eq(project_row_id))
            .into_tuple()
            .all(db)
            .await?;

        line_item_message_audit_log::Entity::delete_many()
            .filter(line_item_message_audit_log::Column::ProjectId.eq(project_row_id))
            .exec(db)
            .await?;
        line_item_audit_log::Entity::delete_many()
            .filter(line_item_audit_log::Column::ProjectId.eq(project_row_id))
            .exec(db)
            .await?;
        task::Entity::delete_many()
            .filter(task::Column::ProjectId.eq(project_row_id))
            .exec(db)
            .await?;
        if !line_item_ids.is_empty() {
            line_item_message::Entity::delete_many()
                .filter(line_item_message::Column::LineItemId.is_in(line_item_ids))
                .exec(db)
                .await?;
        }
        line_item::Entity::delete_many()
            .filter(line_item::Column::ProjectId.eq(project_row_id))
            .exec(db)
            .await?;

        let result = project::Entity::delete_many()
            .filter(project::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::models::user::{CreateUser, User};

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    async fn seed_owner(db: &sea_orm::DatabaseConnection) -> Uuid {
        let id = Uuid::new_v4();
        User::create(
            db,
            &CreateUser {
                email: "owner@example.com".to_string(),
                full_name: None,
                hashed_password: "salt$hash".to_string(),
                is_active: true,
                is_superuser: true,
            },
            id,
        )
        .await
        .unwrap();
        id
    }

    #[tokio::test]
    async fn new_project_starts_processing_with_no_job() {
        let db = setup_db().await;
        let owner = seed_owner(&db).await;

        let project = Project::create(
            &db,
            &CreateProject {
                name: "dataset".to_string(),
                description: Some("test import".to_string()),
                url: "https://drive.google.com/file/d/abc123/view".to_string(),
                owner_id: owner,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        assert_eq!(project.status, "processing");
        assert!(project.job_id.is_none());
        assert!(project.info.is_none());
    }

    #[tokio::test]
    async fn set_job_and_status_update_the_row() {
        let db = setup_db().await;
        let owner = seed_owner(&db).await;
        let id = Uuid::new_v4();
        Project::create(
            &db,
            &CreateProject {
                name: "dataset".to_string(),
                description: None,
                url: "https://example.com/x.jsonl".to_string(),
                owner_id: owner,
            },
            id,
        )
        .await
        .unwrap();

        let job_id = Uuid::new_v4();
        Project::set_job(&db, id, job_id).await.unwrap();
        Project::set_status(&db, id, "completed").await.unwrap();
        Project::update_info(&db, id, serde_json::json!({"type": "completed"}))
            .await
            .unwrap();

        let project = Project::find_by_id(&db, id).await.unwrap().unwrap();
        assert_eq!(project.job_id, Some(job_id));
        assert_eq!(project.status, "completed");
        assert_eq!(
            project.info.unwrap()["type"].as_str(),
            Some("completed")
        );
    }

    #[tokio::test]
    async fn annotators_only_see_projects_they_are_tasked_on() {
        let db = setup_db().await;
        let owner = seed_owner(&db).await;
        let project_id = Uuid::new_v4();
        Project::create(
            &db,
            &CreateProject {
                name: "dataset".to_string(),
                description: None,
                url: "https://example.com/x.jsonl".to_string(),
                owner_id: owner,
            },
            project_id,
        )
        .await
        .unwrap();

        let annotator = Uuid::new_v4();
        User::create(
            &db,
            &CreateUser {
                email: "annotator@example.com".to_string(),
                full_name: None,
                hashed_password: "salt$hash".to_string(),
                is_active: true,
                is_superuser: false,
            },
            annotator,
        )
        .await
        .unwrap();

        assert!(Project::find_for_user(&db, annotator).await.unwrap().is_empty());
        assert_eq!(Project::find_all(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let db = setup_db().await;
        let owner = seed_owner(&db).await;
        let id = Uuid::new_v4();
        Project::create(
            &db,
            &CreateProject {
                name: "dataset".to_string(),
                description: None,
                url: "https://example.com/x.jsonl".to_string(),
                owner_id: owner,
            },
            id,
        )
        .await
        .unwrap();

        assert_eq!(Project::delete(&db, id).await.unwrap(), 1);
        assert_eq!(Project::delete(&db, id).await.unwrap(), 0);
    }
}
