use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, JsonValue, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    entities::{line_item_audit_log, line_item_message_audit_log},
    models::ids,
    types::{AuditAction, LineItemStatus},
};

/// Request metadata captured alongside every audit row.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineItemAuditLog {
    pub id: Uuid,
    pub line_item_id: Uuid,
    pub project_id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub old_status: Option<LineItemStatus>,
    pub new_status: Option<LineItemStatus>,
    pub old_feedback: Option<String>,
    pub new_feedback: Option<String>,
    pub old_tools: Option<JsonValue>,
    pub new_tools: Option<JsonValue>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineItemMessageAuditLog {
    pub id: Uuid,
    pub line_item_message_id: Uuid,
    pub line_item_id: Uuid,
    pub project_id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub old_role: Option<String>,
    pub new_role: Option<String>,
    pub old_content: Option<String>,
    pub new_content: Option<String>,
    pub old_feedback: Option<String>,
    pub new_feedback: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Changed-field snapshot for a line item, row-id scoped. Only fields that
/// actually changed carry values; unchanged fields stay None on both sides.
#[derive(Debug, Clone)]
pub(crate) struct LineItemAuditEntry {
    pub line_item_row_id: i64,
    pub project_row_id: i64,
    pub user_row_id: Option<i64>,
    pub action: AuditAction,
    pub old_status: Option<LineItemStatus>,
    pub new_status: Option<LineItemStatus>,
    pub old_feedback: Option<String>,
    pub new_feedback: Option<String>,
    pub old_tools: Option<JsonValue>,
    pub new_tools: Option<JsonValue>,
}

#[derive(Debug, Clone)]
pub(crate) struct LineItemMessageAuditEntry {
    pub line_item_message_row_id: i64,
    pub line_item_row_id: i64,
    pub project_row_id: i64,
    pub user_row_id: Option<i64>,
    pub action: AuditAction,
    pub old_role: Option<String>,
    pub new_role: Option<String>,
    pub old_content: Option<String>,
    pub new_content: Option<String>,
    pub old_feedback: Option<String>,
    pub new_feedback: Option<String>,
}

pub(crate) async fn record_line_item<C: ConnectionTrait>(
    db: &C,
    entry: LineItemAuditEntry,
    meta: &RequestMeta,
) -> Result<(), DbErr> {
    let active = line_item_audit_log::ActiveModel {
        uuid: Set(Uuid::new_v4()),
        line_item_id: Set(entry.line_item_row_id),
        project_id: Set(entry.project_row_id),
        user_id: Set(entry.user_row_id),
        action: Set(entry.action),
        old_status: Set(entry.old_status),
        new_status: Set(entry.new_status),
        old_feedback: Set(entry.old_feedback),
        new_feedback: Set(entry.new_feedback),
        old_tools: Set(entry.old_tools),
        new_tools: Set(entry.new_tools),
        ip_address: Set(meta.ip_address.clone()),
        user_agent: Set(meta.user_agent.clone()),
        created_at: Set(Utc::now().into()),
        ..Default::default()
    };
    active.insert(db).await?;
    Ok(())
}

pub(crate) async fn record_line_item_message<C: ConnectionTrait>(
    db: &C,
    entry: LineItemMessageAuditEntry,
    meta: &RequestMeta,
) -> Result<(), DbErr> {
    let active = line_item_message_audit_log::ActiveModel {
        uuid: Set(Uuid::new_v4()),
        line_item_message_id: Set(entry.line_item_message_row_id),
        line_item_id: Set(entry.line_item_row_id),
        project_id: Set(entry.project_row_id),
        user_id: Set(entry.user_row_id),
        action: Set(entry.action),
        old_role: Set(entry.old_role),
        new_role: Set(entry.new_role),
        old_content: Set(entry.old_content),
        new_content: Set(entry.new_content),
        old_feedback: Set(entry.old_feedback),
        new_feedback: Set(entry.new_feedback),
        ip_address: Set(meta.ip_address.clone()),
        user_agent: Set(meta.user_agent.clone()),
        created_at: Set(Utc::now().into()),
        ..Default::default()
    };
    active.insert(db).await?;
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditLogFilter {
    pub line_item_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl AuditLogFilter {
    fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    fn limit(&self) -> u64 {
        self.limit.unwrap_or(50).clamp(1, 500)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditLogPage<T> {
    pub data: Vec<T>,
    pub total_count: u64,
    pub num_pages: u64,
}

impl<T> AuditLogPage<T> {
    fn empty() -> Self {
        Self {
            data: Vec::new(),
            total_count: 0,
            num_pages: 0,
        }
    }
}

impl LineItemAuditLog {
    async fn from_model<C: ConnectionTrait>(
        db: &C,
        model: line_item_audit_log::Model,
    ) -> Result<Self, DbErr> {
        let line_item_id = ids::line_item_uuid_by_id(db, model.line_item_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Line item not found".to_string()))?;
        let project_id = ids::project_uuid_by_id(db, model.project_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;
        let user_id = match model.user_id {
            Some(id) => ids::user_uuid_by_id(db, id).await?,
            None => None,
        };
        Ok(Self {
            id: model.uuid,
            line_item_id,
            project_id,
            user_id,
            action: model.action,
            old_status: model.old_status,
            new_status: model.new_status,
            old_feedback: model.old_feedback,
            new_feedback: model.new_feedback,
            old_tools: model.old_tools,
            new_tools: model.new_tools,
            ip_address: model.ip_address,
            user_agent: model.user_agent,
            created_at: model.created_at.into(),
        })
    }

    /// Newest-first audit trail for a project, optionally narrowed by line
    /// item, user, and creation date range.
    pub async fn list<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
        filter: &AuditLogFilter,
    ) -> Result<AuditLogPage<Self>, DbErr> {
        let Some(project_row_id) = ids::project_id_by_uuid(db, project_id).await? else {
            return Ok(AuditLogPage::empty());
        };

        let mut query = line_item_audit_log::Entity::find()
            .filter(line_item_audit_log::Column::ProjectId.eq(project_row_id));

        if let Some(line_item_id) = filter.line_item_id {
            let Some(row_id) = ids::line_item_id_by_uuid(db, line_item_id).await? else {
                return Ok(AuditLogPage::empty());
            };
            query = query.filter(line_item_audit_log::Column::LineItemId.eq(row_id));
        }
        if let Some(user_id) = filter.user_id {
            let Some(row_id) = ids::user_id_by_uuid(db, user_id).await? else {
                return Ok(AuditLogPage::empty());
            };
            query = query.filter(line_item_audit_log::Column::UserId.eq(row_id));
        }
        if let Some(start) = filter.start_date {
            query = query.filter(line_item_audit_log::Column::CreatedAt.gte(start));
        }
        if let Some(end) = filter.end_date {
            query = query.filter(line_item_audit_log::Column::CreatedAt.lte(end));
        }

        let limit = filter.limit();
        let total_count = query.clone().count(db).await?;
        let num_pages = total_count.div_ceil(limit);

        let models = query
            .order_by_desc(line_item_audit_log::Column::CreatedAt)
            .order_by_desc(line_item_audit_log::Column::Id)
            .offset((filter.page() - 1) * limit)
            .limit(limit)
            .all(db)
            .await?;

        let mut data = Vec::with_capacity(models.len());
        for model in models {
            data.push(Self::from_model(db, model).await?);
        }
        Ok(AuditLogPage {
            data,
            total_count,
            num_pages,
        })
    }
}

impl LineItemMessageAuditLog {
    async fn from_model<C: ConnectionTrait>(
        db: &C,
        model: line_item_message_audit_log::Model,
    ) -> Result<Self, DbErr> {
        let line_item_message_id =
            ids::line_item_message_uuid_by_id(db, model.line_item_message_id)
                .await?
                .ok_or(DbErr::RecordNotFound("Message not found".to_string()))?;
        let line_item_id = ids::line_item_uuid_by_id(db, model.line_item_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Line item not found".to_string()))?;
        let project_id = ids::project_uuid_by_id(db, model.project_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;
        let user_id = match model.user_id {
            Some(id) => ids::user_uuid_by_id(db, id).await?,
            None => None,
        };
        Ok(Self {
            id: model.uuid,
            line_item_message_id,
            line_item_id,
            project_id,
            user_id,
            action: model.action,
            old_role: model.old_role,
            new_role: model.new_role,
            old_content: model.old_content,
            new_content: model.new_content,
            old_feedback: model.old_feedback,
            new_feedback: model.new_feedback,
            ip_address: model.ip_address,
            user_agent: model.user_agent,
            created_at: model.created_at.into(),
        })
    }

    pub async fn list<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
        filter: &AuditLogFilter,
    ) -> Result<AuditLogPage<Self>, DbErr> {
        let Some(project_row_id) = ids::project_id_by_uuid(db, project_id).await? else {
            return Ok(AuditLogPage::empty());
        };

        let mut query = line_item_message_audit_log::Entity::find()
            .filter(line_item_message_audit_log::Column::ProjectId.eq(project_row_id));

        if let Some(line_item_id) = filter.line_item_id {
            let Some(row_id) = ids::line_item_id_by_uuid(db, line_item_id).await? else {
                return Ok(AuditLogPage::empty());
            };
            query = query.filter(line_item_message_audit_log::Column::LineItemId.eq(row_id));
        }
        if let Some(user_id) = filter.user_id {
            let Some(row_id) = ids::user_id_by_uuid(db, user_id).await? else {
                return Ok(AuditLogPage::empty());
            };
            query = query.filter(line_item_message_audit_log::Column::UserId.eq(row_id));
        }
        if let Some(start) = filter.start_date {
            query = query.filter(line_item_message_audit_log::Column::CreatedAt.gte(start));
        }
        if let Some(end) = filter.end_date {
            query = query.filter(line_item_message_audit_log::Column::CreatedAt.lte(end));
        }

        let limit = filter.limit();
        let total_count = query.clone().count(db).await?;
        let num_pages = total_count.div_ceil(limit);

        let models = query
            .order_by_desc(line_item_message_audit_log::Column::CreatedAt)
            .order_by_desc(line_item_message_audit_log::Column::Id)
            .offset((filter.page() - 1) * limit)
            .limit(limit)
            .all(db)
            .await?;

        let mut data = Vec::with_capacity(models.len());
        for model in models {
            data.push(Self::from_model(db, model).await?);
        }
        Ok(AuditLogPage {
            data,
            total_count,
            num_pages,
        })
    }
}
