use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionSession, TransactionTrait,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    entities::{line_item, task, user},
    models::ids,
    types::LineItemStatus,
};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Project not found")]
    ProjectNotFound,
    #[error("User not found")]
    UserNotFound,
    #[error("Requested {requested} line items but only {available} are unassigned")]
    InsufficientLineItems { requested: u64, available: u64 },
    #[error("Requested to remove {requested} tasks but only {available} are still unlabeled")]
    InsufficientRemovableTasks { requested: u64, available: u64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub line_item_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserAssignment {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub num_assigned: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignmentSummary {
    pub num_samples: u64,
    pub num_task_assigned: u64,
    pub num_task_not_assigned: u64,
    pub assignments: Vec<UserAssignment>,
}

impl Task {
    /// Binds `count` unassigned line items of the project to the user,
    /// all-or-nothing. Items are taken in ascending row order so assignment
    /// follows file order.
    pub async fn assign<C: ConnectionTrait + TransactionTrait>(
        db: &C,
        project_id: Uuid,
        user_id: Uuid,
        count: u64,
    ) -> Result<u64, TaskError> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(TaskError::ProjectNotFound)?;
        let user_row_id = ids::user_id_by_uuid(db, user_id)
            .await?
            .ok_or(TaskError::UserNotFound)?;

        let txn = db.begin().await?;
        let created =
            assign_in_txn(&txn, project_row_id, user_row_id, count).await?;
        txn.commit().await?;
        Ok(created)
    }

    /// Reconciles the user's assignment in the project to exactly `target`
    /// tasks. Growing pulls from the unassigned pool; shrinking releases
    /// only tasks whose line item is still unlabeled, newest first.
    pub async fn modify_assignment<C: ConnectionTrait + TransactionTrait>(
        db: &C,
        project_id: Uuid,
        user_id: Uuid,
        target: u64,
    ) -> Result<u64, TaskError> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(TaskError::ProjectNotFound)?;
        let user_row_id = ids::user_id_by_uuid(db, user_id)
            .await?
            .ok_or(TaskError::UserNotFound)?;

        let txn = db.begin().await?;

        let current = task::Entity::find()
            .filter(task::Column::ProjectId.eq(project_row_id))
            .filter(task::Column::UserId.eq(user_row_id))
            .count(&txn)
            .await?;

        if target > current {
            assign_in_txn(&txn, project_row_id, user_row_id, target - current).await?;
        } else if target < current {
            let to_remove = current - target;
            let removable = removable_task_ids(&txn, project_row_id, user_row_id).await?;
            if (removable.len() as u64) < to_remove {
                return Err(TaskError::InsufficientRemovableTasks {
                    requested: to_remove,
                    available: removable.len() as u64,
                });
            }
            let victims: Vec<i64> = removable.into_iter().take(to_remove as usize).collect();
            task::Entity::delete_many()
                .filter(task::Column::Id.is_in(victims))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(target)
    }

    /// Releases all of the user's still-unlabeled tasks in the project.
    /// Tasks over labeled items stay put.
    pub async fn delete_user_tasks<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, TaskError> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(TaskError::ProjectNotFound)?;
        let user_row_id = ids::user_id_by_uuid(db, user_id)
            .await?
            .ok_or(TaskError::UserNotFound)?;

        let removable = removable_task_ids(db, project_row_id, user_row_id).await?;
        if removable.is_empty() {
            return Ok(0);
        }
        let result = task::Entity::delete_many()
            .filter(task::Column::Id.is_in(removable))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn assignment_summary<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
    ) -> Result<AssignmentSummary, TaskError> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(TaskError::ProjectNotFound)?;

        let num_samples = line_item::Entity::find()
            .filter(line_item::Column::ProjectId.eq(project_row_id))
            .count(db)
            .await?;
        let num_task_assigned = task::Entity::find()
            .filter(task::Column::ProjectId.eq(project_row_id))
            .count(db)
            .await?;

        let per_user: Vec<(i64, i64)> = task::Entity::find()
            .select_only()
            .column(task::Column::UserId)
            .column_as(task::Column::Id.count(), "count")
            .filter(task::Column::ProjectId.eq(project_row_id))
            .group_by(task::Column::UserId)
            .into_tuple()
            .all(db)
            .await?;

        let mut assignments = Vec::with_capacity(per_user.len());
        for (user_row_id, count) in per_user {
            let Some(record) = user::Entity::find_by_id(user_row_id).one(db).await? else {
                continue;
            };
            assignments.push(UserAssignment {
                user_id: record.uuid,
                email: record.email,
                full_name: record.full_name,
                num_assigned: count as u64,
            });
        }
        assignments.sort_by(|a, b| a.email.cmp(&b.email));

        Ok(AssignmentSummary {
            num_samples,
            num_task_assigned,
            num_task_not_assigned: num_samples.saturating_sub(num_task_assigned),
            assignments,
        })
    }
}

async fn assign_in_txn<C: ConnectionTrait>(
    txn: &C,
    project_row_id: i64,
    user_row_id: i64,
    count: u64,
) -> Result<u64, TaskError> {
    let taken: Vec<i64> = task::Entity::find()
        .select_only()
        .column(task::Column::LineItemId)
        .filter(task::Column::ProjectId.eq(project_row_id))
        .into_tuple()
        .all(txn)
        .await?;

    let mut pool = line_item::Entity::find()
        .select_only()
        .column(line_item::Column::Id)
        .filter(line_item::Column::ProjectId.eq(project_row_id))
        .order_by_asc(line_item::Column::Id);
    if !taken.is_empty() {
        pool = pool.filter(line_item::Column::Id.is_not_in(taken));
    }
    let unassigned: Vec<i64> = pool.limit(count).into_tuple().all(txn).await?;

    if (unassigned.len() as u64) < count {
        // Re-count without the limit so the error reports the real pool size.
        let taken_count = task::Entity::find()
            .filter(task::Column::ProjectId.eq(project_row_id))
            .count(txn)
            .await?;
        let total = line_item::Entity::find()
            .filter(line_item::Column::ProjectId.eq(project_row_id))
            .count(txn)
            .await?;
        return Err(TaskError::InsufficientLineItems {
            requested: count,
            available: total.saturating_sub(taken_count),
        });
    }

    if unassigned.is_empty() {
        return Ok(0);
    }

    let now = Utc::now();
    let actives = unassigned
        .iter()
        .map(|line_item_row_id| task::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            project_id: Set(project_row_id),
            user_id: Set(user_row_id),
            line_item_id: Set(*line_item_row_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        })
        .collect::<Vec<_>>();
    task::Entity::insert_many(actives).exec(txn).await?;
    Ok(unassigned.len() as u64)
}

/// Task ids the user may give back: line item still unlabeled, newest task
/// first.
async fn removable_task_ids<C: ConnectionTrait>(
    db: &C,
    project_row_id: i64,
    user_row_id: i64,
) -> Result<Vec<i64>, DbErr> {
    let unlabeled: Vec<i64> = line_item::Entity::find()
        .select_only()
        .column(line_item::Column::Id)
        .filter(line_item::Column::ProjectId.eq(project_row_id))
        .filter(line_item::Column::Status.eq(LineItemStatus::Unlabeled))
        .into_tuple()
        .all(db)
        .await?;
    if unlabeled.is_empty() {
        return Ok(Vec::new());
    }

    task::Entity::find()
        .select_only()
        .column(task::Column::Id)
        .filter(task::Column::ProjectId.eq(project_row_id))
        .filter(task::Column::UserId.eq(user_row_id))
        .filter(task::Column::LineItemId.is_in(unlabeled))
        .order_by_desc(task::Column::Id)
        .into_tuple()
        .all(db)
        .await
}
