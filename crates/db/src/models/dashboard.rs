use std::collections::HashMap;

use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, Iterable, QueryFilter, QuerySelect,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    entities::{line_item, project, task, user},
    models::ids,
    types::LineItemStatus,
};

#[derive(Debug, Clone, Serialize)]
pub struct UserTaskSummary {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub task_count: u64,
    pub status_counts: HashMap<LineItemStatus, i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectDashboard {
    pub project_id: Uuid,
    pub project_name: String,
    pub project_description: Option<String>,
    pub num_samples: u64,
    pub user_task_summary: Vec<UserTaskSummary>,
}

/// Per-project labeling progress, broken down by the users holding tasks.
pub async fn overview<C: ConnectionTrait>(db: &C) -> Result<Vec<ProjectDashboard>, DbErr> {
    build(db, None).await
}

/// Same rollup, limited to one user's projects and their own rows.
pub async fn for_user<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
) -> Result<Vec<ProjectDashboard>, DbErr> {
    let Some(user_row_id) = ids::user_id_by_uuid(db, user_id).await? else {
        return Ok(Vec::new());
    };
    build(db, Some(user_row_id)).await
}

async fn build<C: ConnectionTrait>(
    db: &C,
    only_user_row_id: Option<i64>,
) -> Result<Vec<ProjectDashboard>, DbErr> {
    let projects = project::Entity::find().all(db).await?;
    let mut dashboards = Vec::new();

    for record in projects {
        let statuses: Vec<(i64, LineItemStatus)> = line_item::Entity::find()
            .select_only()
            .column(line_item::Column::Id)
            .column(line_item::Column::Status)
            .filter(line_item::Column::ProjectId.eq(record.id))
            .into_tuple()
            .all(db)
            .await?;
        let status_by_item: HashMap<i64, LineItemStatus> = statuses.into_iter().collect();

        let mut task_query = task::Entity::find()
            .select_only()
            .column(task::Column::UserId)
            .column(task::Column::LineItemId)
            .filter(task::Column::ProjectId.eq(record.id));
        if let Some(user_row_id) = only_user_row_id {
            task_query = task_query.filter(task::Column::UserId.eq(user_row_id));
        }
        let bindings: Vec<(i64, i64)> = task_query.into_tuple().all(db).await?;

        if only_user_row_id.is_some() && bindings.is_empty() {
            continue;
        }

        let mut per_user: HashMap<i64, HashMap<LineItemStatus, i64>> = HashMap::new();
        for (user_row_id, line_item_row_id) in &bindings {
            let counts = per_user.entry(*user_row_id).or_insert_with(|| {
                LineItemStatus::iter().map(|status| (status, 0)).collect()
            });
            if let Some(status) = status_by_item.get(line_item_row_id) {
                *counts.entry(*status).or_insert(0) += 1;
            }
        }

        let mut user_task_summary = Vec::with_capacity(per_user.len());
        for (user_row_id, status_counts) in per_user {
            let Some(member) = user::Entity::find_by_id(user_row_id).one(db).await? else {
                continue;
            };
            let task_count = status_counts.values().sum::<i64>() as u64;
            user_task_summary.push(UserTaskSummary {
                user_id: member.uuid,
                email: member.email,
                full_name: member.full_name,
                task_count,
                status_counts,
            });
        }
        user_task_summary.sort_by(|a, b| b.task_count.cmp(&a.task_count));

        dashboards.push(ProjectDashboard {
            project_id: record.uuid,
            project_name: record.name,
            project_description: record.description,
            num_samples: status_by_item.len() as u64,
            user_task_summary,
        });
    }

    Ok(dashboards)
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::models::{
        audit::RequestMeta,
        line_item::{ConfirmLineItem, LineItem, LineItemListQuery},
        project::{CreateProject, Project},
        task::Task,
        user::{CreateUser, User},
    };

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    async fn seed_user(db: &sea_orm::DatabaseConnection, email: &str, superuser: bool) -> User {
        User::create(
            db,
            &CreateUser {
                email: email.to_string(),
                full_name: None,
                hashed_password: "salt$hash".to_string(),
                is_active: true,
                is_superuser: superuser,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn rollup_counts_labeled_work_per_user() {
        let db = setup_db().await;
        let admin = seed_user(&db, "admin@example.com", true).await;
        let a = seed_user(&db, "a@example.com", false).await;
        let b = seed_user(&db, "b@example.com", false).await;

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
        let project_row_id = ids::project_id_by_uuid(&db, project_id)
            .await
            .unwrap()
            .unwrap();
        for line_index in 1..=4 {
            LineItem::insert_imported(&db, project_row_id, line_index, serde_json::json!([]))
                .await
                .unwrap();
        }
        Task::assign(&db, project_id, a.id, 2).await.unwrap();
        Task::assign(&db, project_id, b.id, 2).await.unwrap();

        let page = LineItem::list(&db, project_id, Some(a.id), &LineItemListQuery::default())
            .await
            .unwrap();
        LineItem::confirm(
            &db,
            project_id,
            page.data[0].id,
            &a,
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

        let boards = overview(&db).await.unwrap();
        assert_eq!(boards.len(), 1);
        assert_eq!(boards[0].num_samples, 4);
        assert_eq!(boards[0].user_task_summary.len(), 2);

        let a_summary = boards[0]
            .user_task_summary
            .iter()
            .find(|s| s.user_id == a.id)
            .expect("summary for a");
        assert_eq!(a_summary.task_count, 2);
        assert_eq!(a_summary.status_counts[&LineItemStatus::Confirmed], 1);
        assert_eq!(a_summary.status_counts[&LineItemStatus::Unlabeled], 1);

        let own = for_user(&db, b.id).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].user_task_summary.len(), 1);
        assert_eq!(own[0].user_task_summary[0].user_id, b.id);

        // Users without tasks see nothing.
        assert!(for_user(&db, admin.id).await.unwrap().is_empty());
    }
}
