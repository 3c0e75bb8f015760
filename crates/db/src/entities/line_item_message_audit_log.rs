use sea_orm::entity::prelude::*;

use crate::types::AuditAction;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "line_item_message_audit_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub uuid: Uuid,
    pub line_item_message_id: i64,
    pub line_item_id: i64,
    pub project_id: i64,
    pub user_id: Option<i64>,
    pub action: AuditAction,
    pub old_role: Option<String>,
    pub new_role: Option<String>,
    pub old_content: Option<String>,
    pub new_content: Option<String>,
    pub old_feedback: Option<String>,
    pub new_feedback: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
