use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    entities::{line_item, line_item_message},
    models::{
        audit::{self, LineItemMessageAuditEntry, RequestMeta},
        ids,
        line_item::LineItemError,
        user::User,
    },
    types::AuditAction,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemMessage {
    pub id: Uuid,
    pub line_item_id: Uuid,
    pub line_message_index: i64,
    pub role: String,
    pub content: String,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One message of an imported record, already validated by the extraction
/// parser.
#[derive(Debug, Clone)]
pub struct ImportedMessage {
    pub line_message_index: i64,
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLineItemMessage {
    pub role: Option<String>,
    pub content: Option<String>,
    pub feedback: Option<String>,
}

impl LineItemMessage {
    pub(crate) async fn from_model<C: ConnectionTrait>(
        db: &C,
        model: line_item_message::Model,
    ) -> Result<Self, DbErr> {
        let line_item_id = ids::line_item_uuid_by_id(db, model.line_item_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Line item not found".to_string()))?;
        Ok(Self {
            id: model.uuid,
            line_item_id,
            line_message_index: model.line_message_index,
            role: model.role,
            content: model.content,
            feedback: model.feedback,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }

    pub(crate) async fn find_models_for_line_item<C: ConnectionTrait>(
        db: &C,
        line_item_row_id: i64,
    ) -> Result<Vec<line_item_message::Model>, DbErr> {
        line_item_message::Entity::find()
            .filter(line_item_message::Column::LineItemId.eq(line_item_row_id))
            .order_by_asc(line_item_message::Column::LineMessageIndex)
            .all(db)
            .await
    }

    /// Bulk insert used by the extraction pipeline.
    pub async fn insert_imported_many<C: ConnectionTrait>(
        db: &C,
        line_item_row_id: i64,
        messages: &[ImportedMessage],
    ) -> Result<(), DbErr> {
        if messages.is_empty() {
            return Ok(());
        }
        let now = Utc::now();
        let actives = messages
            .iter()
            .map(|message| line_item_message::ActiveModel {
                uuid: Set(Uuid::new_v4()),
                line_item_id: Set(line_item_row_id),
                line_message_index: Set(message.line_message_index),
                role: Set(message.role.clone()),
                content: Set(message.content.clone()),
                feedback: Set(None),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
                ..Default::default()
            })
            .collect::<Vec<_>>();
        line_item_message::Entity::insert_many(actives).exec(db).await?;
        Ok(())
    }

    /// Edits a single message, writing one audit row when anything changed.
    pub async fn update<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
        message_id: Uuid,
        actor: &User,
        payload: &UpdateLineItemMessage,
        meta: &RequestMeta,
    ) -> Result<Self, LineItemError> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(LineItemError::ProjectNotFound)?;

        let record = line_item_message::Entity::find()
            .filter(line_item_message::Column::Uuid.eq(message_id))
            .one(db)
            .await?
            .ok_or(LineItemError::MessageNotFound)?;

        let parent = line_item::Entity::find_by_id(record.line_item_id)
            .one(db)
            .await?
            .ok_or(LineItemError::MessageNotFound)?;
        if parent.project_id != project_row_id {
            return Err(LineItemError::MessageNotFound);
        }

        let actor_row_id = ids::user_id_by_uuid(db, actor.id).await?;
        let (updated, _) =
            apply_edit(db, record, project_row_id, actor_row_id, payload, meta).await?;
        Ok(Self::from_model(db, updated).await?)
    }
}

fn requested_change(new_value: Option<&str>, current: &str) -> Option<String> {
    new_value
        .map(str::trim)
        .filter(|value| !value.is_empty() && *value != current)
        .map(str::to_string)
}

/// Applies non-empty, actually-different field edits. Returns the resulting
/// model and whether anything changed; identical resubmissions touch nothing.
pub(crate) async fn apply_edit<C: ConnectionTrait>(
    db: &C,
    record: line_item_message::Model,
    project_row_id: i64,
    user_row_id: Option<i64>,
    payload: &UpdateLineItemMessage,
    meta: &RequestMeta,
) -> Result<(line_item_message::Model, bool), DbErr> {
    let new_role = requested_change(payload.role.as_deref(), &record.role);
    let new_content = requested_change(payload.content.as_deref(), &record.content);
    let new_feedback = requested_change(
        payload.feedback.as_deref(),
        record.feedback.as_deref().unwrap_or(""),
    );

    if new_role.is_none() && new_content.is_none() && new_feedback.is_none() {
        return Ok((record, false));
    }

    let entry = LineItemMessageAuditEntry {
        line_item_message_row_id: record.id,
        line_item_row_id: record.line_item_id,
        project_row_id,
        user_row_id,
        action: AuditAction::Update,
        old_role: new_role.as_ref().map(|_| record.role.clone()),
        new_role: new_role.clone(),
        old_content: new_content.as_ref().map(|_| record.content.clone()),
        new_content: new_content.clone(),
        old_feedback: new_feedback.as_ref().and_then(|_| record.feedback.clone()),
        new_feedback: new_feedback.clone(),
    };

    let mut active: line_item_message::ActiveModel = record.into();
    if let Some(role) = new_role {
        active.role = Set(role);
    }
    if let Some(content) = new_content {
        active.content = Set(content);
    }
    if let Some(feedback) = new_feedback {
        active.feedback = Set(Some(feedback));
    }
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(db).await?;

    audit::record_line_item_message(db, entry, meta).await?;
    Ok((updated, true))
}
