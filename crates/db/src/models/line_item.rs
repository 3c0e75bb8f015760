use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, Iterable, JsonValue,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    entities::{line_item, task},
    models::{
        audit::{self, LineItemAuditEntry, RequestMeta},
        ids,
        line_item_message::{self, LineItemMessage, UpdateLineItemMessage},
        user::User,
    },
    types::{AuditAction, LineItemStatus},
};

#[derive(Debug, Error)]
pub enum LineItemError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Project not found")]
    ProjectNotFound,
    #[error("Line item not found")]
    LineItemNotFound,
    #[error("Message not found")]
    MessageNotFound,
    #[error("No task assigns this line item to the user")]
    TaskNotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub id: Uuid,
    pub project_id: Uuid,
    pub line_index: i64,
    pub status: LineItemStatus,
    pub tools: JsonValue,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineItemWithMessages {
    #[serde(flatten)]
    pub line_item: LineItem,
    pub line_messages: Vec<LineItemMessage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineItemPage {
    pub data: Vec<LineItem>,
    pub total_count: u64,
    pub num_pages: u64,
    pub status_counts: HashMap<LineItemStatus, i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LineItemListQuery {
    pub status: Option<LineItemStatus>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

fn default_confirm_status() -> LineItemStatus {
    LineItemStatus::Confirmed
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmLineItem {
    #[serde(default)]
    pub line_messages: Vec<ConfirmMessage>,
    pub tools: Option<JsonValue>,
    pub feedback: Option<String>,
    #[serde(default = "default_confirm_status")]
    pub status: LineItemStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmMessage {
    pub id: Uuid,
    pub role: Option<String>,
    pub content: Option<String>,
    pub feedback: Option<String>,
}

impl LineItem {
    pub(crate) async fn from_model<C: ConnectionTrait>(
        db: &C,
        model: line_item::Model,
    ) -> Result<Self, DbErr> {
        let project_id = ids::project_uuid_by_id(db, model.project_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;
        Ok(Self {
            id: model.uuid,
            project_id,
            line_index: model.line_index,
            status: model.status,
            tools: model.tools,
            feedback: model.feedback,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }

    /// Insert one imported record. Only the extraction pipeline creates
    /// line items; `line_index` is the caller's 1-based file-order counter.
    pub async fn insert_imported<C: ConnectionTrait>(
        db: &C,
        project_row_id: i64,
        line_index: i64,
        tools: JsonValue,
    ) -> Result<i64, DbErr> {
        let now = Utc::now();
        let active = line_item::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            project_id: Set(project_row_id),
            line_index: Set(line_index),
            status: Set(LineItemStatus::Unlabeled),
            tools: Set(tools),
            feedback: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(model.id)
    }

    pub async fn count_for_project<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
    ) -> Result<u64, DbErr> {
        let Some(project_row_id) = ids::project_id_by_uuid(db, project_id).await? else {
            return Ok(0);
        };
        line_item::Entity::find()
            .filter(line_item::Column::ProjectId.eq(project_row_id))
            .count(db)
            .await
    }

    /// Paginated listing in file order. When `assignee` is set the scope is
    /// narrowed to line items bound to that user by a task; `status_counts`
    /// covers the whole visible scope regardless of the status filter and is
    /// zero-filled over every status.
    pub async fn list<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
        assignee: Option<Uuid>,
        query: &LineItemListQuery,
    ) -> Result<LineItemPage, LineItemError> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(LineItemError::ProjectNotFound)?;

        let mut scope = line_item::Entity::find()
            .filter(line_item::Column::ProjectId.eq(project_row_id));

        if let Some(user_id) = assignee {
            let user_row_id = ids::user_id_by_uuid(db, user_id)
                .await?
                .ok_or(LineItemError::TaskNotFound)?;
            let assigned_ids: Vec<i64> = task::Entity::find()
                .select_only()
                .column(task::Column::LineItemId)
                .filter(task::Column::ProjectId.eq(project_row_id))
                .filter(task::Column::UserId.eq(user_row_id))
                .into_tuple()
                .all(db)
                .await?;
            scope = scope.filter(line_item::Column::Id.is_in(assigned_ids));
        }

        let mut status_counts: HashMap<LineItemStatus, i64> =
            LineItemStatus::iter().map(|status| (status, 0)).collect();
        let counted: Vec<(LineItemStatus, i64)> = scope
            .clone()
            .select_only()
            .column(line_item::Column::Status)
            .column_as(line_item::Column::Id.count(), "count")
            .group_by(line_item::Column::Status)
            .into_tuple()
            .all(db)
            .await?;
        for (status, count) in counted {
            status_counts.insert(status, count);
        }

        let mut filtered = scope;
        if let Some(status) = query.status {
            filtered = filtered.filter(line_item::Column::Status.eq(status));
        }

        let limit = query.limit.unwrap_or(50).clamp(1, 500);
        let page = query.page.unwrap_or(1).max(1);
        let total_count = filtered.clone().count(db).await?;
        let num_pages = total_count.div_ceil(limit);

        let models = filtered
            .order_by_asc(line_item::Column::LineIndex)
            .offset((page - 1) * limit)
            .limit(limit)
            .all(db)
            .await?;

        let mut data = Vec::with_capacity(models.len());
        for model in models {
            data.push(Self::from_model(db, model).await?);
        }

        Ok(LineItemPage {
            data,
            total_count,
            num_pages,
            status_counts,
        })
    }

    /// Export query: file order, optional status filter and row cap.
    pub async fn find_for_export<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
        limit: Option<u64>,
        include_statuses: &[LineItemStatus],
    ) -> Result<Vec<LineItemWithMessages>, LineItemError> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(LineItemError::ProjectNotFound)?;

        let mut query = line_item::Entity::find()
            .filter(line_item::Column::ProjectId.eq(project_row_id))
            .order_by_asc(line_item::Column::LineIndex);
        if !include_statuses.is_empty() {
            query = query.filter(line_item::Column::Status.is_in(include_statuses.to_vec()));
        }
        if let Some(limit) = limit {
            query = query.limit(limit);
        }

        let models = query.all(db).await?;
        let mut items = Vec::with_capacity(models.len());
        for model in models {
            items.push(Self::with_messages(db, model).await?);
        }
        Ok(items)
    }

    /// One line item by its 1-based file-order index, with messages ordered
    /// by their index. Non-superusers must hold the task for the item.
    pub async fn find_by_line_index<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
        line_index: i64,
        actor: &User,
    ) -> Result<LineItemWithMessages, LineItemError> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(LineItemError::ProjectNotFound)?;

        let record = line_item::Entity::find()
            .filter(line_item::Column::ProjectId.eq(project_row_id))
            .filter(line_item::Column::LineIndex.eq(line_index))
            .one(db)
            .await?
            .ok_or(LineItemError::LineItemNotFound)?;

        if !actor.is_superuser {
            require_task(db, project_row_id, record.id, actor).await?;
        }

        Self::with_messages(db, record).await
    }

    async fn with_messages<C: ConnectionTrait>(
        db: &C,
        record: line_item::Model,
    ) -> Result<LineItemWithMessages, LineItemError> {
        let message_models =
            line_item_message::LineItemMessage::find_models_for_line_item(db, record.id).await?;
        let mut line_messages = Vec::with_capacity(message_models.len());
        for model in message_models {
            line_messages.push(LineItemMessage::from_model(db, model).await?);
        }
        Ok(LineItemWithMessages {
            line_item: Self::from_model(db, record).await?,
            line_messages,
        })
    }

    /// Annotator confirmation: applies provided-and-different line item
    /// fields and message edits, writing one audit row per entity that
    /// actually changed. Resubmitting identical content is a silent no-op.
    pub async fn confirm<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
        line_item_id: Uuid,
        actor: &User,
        payload: &ConfirmLineItem,
        meta: &RequestMeta,
    ) -> Result<LineItemWithMessages, LineItemError> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(LineItemError::ProjectNotFound)?;

        let record = line_item::Entity::find()
            .filter(line_item::Column::Uuid.eq(line_item_id))
            .filter(line_item::Column::ProjectId.eq(project_row_id))
            .one(db)
            .await?
            .ok_or(LineItemError::LineItemNotFound)?;

        if !actor.is_superuser {
            require_task(db, project_row_id, record.id, actor).await?;
        }
        let actor_row_id = ids::user_id_by_uuid(db, actor.id).await?;

        let new_status = (payload.status != record.status).then_some(payload.status);
        let new_tools = payload
            .tools
            .as_ref()
            .filter(|tools| **tools != record.tools)
            .cloned();
        let new_feedback = payload
            .feedback
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty() && *value != record.feedback.as_deref().unwrap_or(""))
            .map(str::to_string);

        let line_item_row_id = record.id;
        if new_status.is_some() || new_tools.is_some() || new_feedback.is_some() {
            let action = if new_status.is_some() {
                AuditAction::StatusChange
            } else {
                AuditAction::Update
            };
            let entry = LineItemAuditEntry {
                line_item_row_id,
                project_row_id,
                user_row_id: actor_row_id,
                action,
                old_status: new_status.map(|_| record.status),
                new_status,
                old_feedback: new_feedback.as_ref().and_then(|_| record.feedback.clone()),
                new_feedback: new_feedback.clone(),
                old_tools: new_tools.as_ref().map(|_| record.tools.clone()),
                new_tools: new_tools.clone(),
            };

            let mut active: line_item::ActiveModel = record.into();
            if let Some(status) = new_status {
                active.status = Set(status);
            }
            if let Some(tools) = new_tools {
                active.tools = Set(tools);
            }
            if let Some(feedback) = new_feedback {
                active.feedback = Set(Some(feedback));
            }
            active.updated_at = Set(Utc::now().into());
            active.update(db).await?;

            audit::record_line_item(db, entry, meta).await?;
        }

        for edit in &payload.line_messages {
            let message = crate::entities::line_item_message::Entity::find()
                .filter(crate::entities::line_item_message::Column::Uuid.eq(edit.id))
                .filter(
                    crate::entities::line_item_message::Column::LineItemId.eq(line_item_row_id),
                )
                .one(db)
                .await?
                .ok_or(LineItemError::MessageNotFound)?;

            let update = UpdateLineItemMessage {
                role: edit.role.clone(),
                content: edit.content.clone(),
                feedback: edit.feedback.clone(),
            };
            line_item_message::apply_edit(
                db,
                message,
                project_row_id,
                actor_row_id,
                &update,
                meta,
            )
            .await?;
        }

        let reloaded = line_item::Entity::find_by_id(line_item_row_id)
            .one(db)
            .await?
            .ok_or(LineItemError::LineItemNotFound)?;
        Self::with_messages(db, reloaded).await
    }
}

async fn require_task<C: ConnectionTrait>(
    db: &C,
    project_row_id: i64,
    line_item_row_id: i64,
    actor: &User,
) -> Result<(), LineItemError> {
    let user_row_id = ids::user_id_by_uuid(db, actor.id)
        .await?
        .ok_or(LineItemError::TaskNotFound)?;
    let bound = task::Entity::find()
        .filter(task::Column::ProjectId.eq(project_row_id))
        .filter(task::Column::UserId.eq(user_row_id))
        .filter(task::Column::LineItemId.eq(line_item_row_id))
        .one(db)
        .await?;
    if bound.is_none() {
        return Err(LineItemError::TaskNotFound);
    }
    Ok(())
}
