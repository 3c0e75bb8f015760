use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Users::Table)
                    .col(pk_id_col(manager, Users::Id))
                    .col(uuid_col(Users::Uuid))
                    .col(ColumnDef::new(Users::Email).string().not_null())
                    .col(ColumnDef::new(Users::FullName).string())
                    .col(ColumnDef::new(Users::HashedPassword).string().not_null())
                    .col(
                        ColumnDef::new(Users::IsActive)
                            .boolean()
                            .not_null()
                            .default(Expr::val(true)),
                    )
                    .col(
                        ColumnDef::new(Users::IsSuperuser)
                            .boolean()
                            .not_null()
                            .default(Expr::val(false)),
                    )
                    .col(timestamp_col(Users::CreatedAt))
                    .col(timestamp_col(Users::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_users_uuid")
                    .table(Users::Table)
                    .col(Users::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_users_email")
                    .table(Users::Table)
                    .col(Users::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Projects::Table)
                    .col(pk_id_col(manager, Projects::Id))
                    .col(uuid_col(Projects::Uuid))
                    .col(ColumnDef::new(Projects::Name).string().not_null())
                    .col(ColumnDef::new(Projects::Description).string())
                    .col(ColumnDef::new(Projects::Url).string().not_null())
                    .col(fk_id_col(manager, Projects::OwnerId))
                    .col(
                        ColumnDef::new(Projects::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("processing")),
                    )
                    .col(uuid_nullable_col(Projects::JobId))
                    .col(ColumnDef::new(Projects::Info).json())
                    .col(timestamp_col(Projects::CreatedAt))
                    .col(timestamp_col(Projects::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_projects_owner_id")
                            .from(Projects::Table, Projects::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_projects_uuid")
                    .table(Projects::Table)
                    .col(Projects::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_projects_owner_id")
                    .table(Projects::Table)
                    .col(Projects::OwnerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(LineItems::Table)
                    .col(pk_id_col(manager, LineItems::Id))
                    .col(uuid_col(LineItems::Uuid))
                    .col(fk_id_col(manager, LineItems::ProjectId))
                    .col(ColumnDef::new(LineItems::LineIndex).big_integer().not_null())
                    .col(
                        ColumnDef::new(LineItems::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("UNLABELED")),
                    )
                    .col(ColumnDef::new(LineItems::Tools).json().not_null())
                    .col(ColumnDef::new(LineItems::Feedback).text())
                    .col(timestamp_col(LineItems::CreatedAt))
                    .col(timestamp_col(LineItems::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_line_items_project_id")
                            .from(LineItems::Table, LineItems::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_line_items_uuid")
                    .table(LineItems::Table)
                    .col(LineItems::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_line_items_project_id_line_index")
                    .table(LineItems::Table)
                    .col(LineItems::ProjectId)
                    .col(LineItems::LineIndex)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_line_items_status")
                    .table(LineItems::Table)
                    .col(LineItems::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(LineItemMessages::Table)
                    .col(pk_id_col(manager, LineItemMessages::Id))
                    .col(uuid_col(LineItemMessages::Uuid))
                    .col(fk_id_col(manager, LineItemMessages::LineItemId))
                    .col(
                        ColumnDef::new(LineItemMessages::LineMessageIndex)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LineItemMessages::Role).string().not_null())
                    .col(ColumnDef::new(LineItemMessages::Content).text().not_null())
                    .col(ColumnDef::new(LineItemMessages::Feedback).text())
                    .col(timestamp_col(LineItemMessages::CreatedAt))
                    .col(timestamp_col(LineItemMessages::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_line_item_messages_line_item_id")
                            .from(LineItemMessages::Table, LineItemMessages::LineItemId)
                            .to(LineItems::Table, LineItems::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_line_item_messages_uuid")
                    .table(LineItemMessages::Table)
                    .col(LineItemMessages::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_line_item_messages_line_item_id")
                    .table(LineItemMessages::Table)
                    .col(LineItemMessages::LineItemId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Tasks::Table)
                    .col(pk_id_col(manager, Tasks::Id))
                    .col(uuid_col(Tasks::Uuid))
                    .col(fk_id_col(manager, Tasks::ProjectId))
                    .col(fk_id_col(manager, Tasks::UserId))
                    .col(fk_id_col(manager, Tasks::LineItemId))
                    .col(timestamp_col(Tasks::CreatedAt))
                    .col(timestamp_col(Tasks::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_project_id")
                            .from(Tasks::Table, Tasks::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_user_id")
                            .from(Tasks::Table, Tasks::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_line_item_id")
                            .from(Tasks::Table, Tasks::LineItemId)
                            .to(LineItems::Table, LineItems::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tasks_uuid")
                    .table(Tasks::Table)
                    .col(Tasks::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // One task per line item across all users.
        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tasks_line_item_id")
                    .table(Tasks::Table)
                    .col(Tasks::LineItemId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tasks_project_id_user_id")
                    .table(Tasks::Table)
                    .col(Tasks::ProjectId)
                    .col(Tasks::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(LineItemAuditLogs::Table)
                    .col(pk_id_col(manager, LineItemAuditLogs::Id))
                    .col(uuid_col(LineItemAuditLogs::Uuid))
                    .col(fk_id_col(manager, LineItemAuditLogs::LineItemId))
                    .col(fk_id_col(manager, LineItemAuditLogs::ProjectId))
                    .col(fk_id_nullable_col(manager, LineItemAuditLogs::UserId))
                    .col(
                        ColumnDef::new(LineItemAuditLogs::Action)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(LineItemAuditLogs::OldStatus).string_len(32))
                    .col(ColumnDef::new(LineItemAuditLogs::NewStatus).string_len(32))
                    .col(ColumnDef::new(LineItemAuditLogs::OldFeedback).text())
                    .col(ColumnDef::new(LineItemAuditLogs::NewFeedback).text())
                    .col(ColumnDef::new(LineItemAuditLogs::OldTools).json())
                    .col(ColumnDef::new(LineItemAuditLogs::NewTools).json())
                    .col(ColumnDef::new(LineItemAuditLogs::IpAddress).string())
                    .col(ColumnDef::new(LineItemAuditLogs::UserAgent).string())
                    .col(timestamp_col(LineItemAuditLogs::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_line_item_audit_logs_line_item_id")
                            .from(LineItemAuditLogs::Table, LineItemAuditLogs::LineItemId)
                            .to(LineItems::Table, LineItems::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_line_item_audit_logs_project_id")
                            .from(LineItemAuditLogs::Table, LineItemAuditLogs::ProjectId)
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_line_item_audit_logs_user_id")
                            .from(LineItemAuditLogs::Table, LineItemAuditLogs::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_line_item_audit_logs_uuid")
                    .table(LineItemAuditLogs::Table)
                    .col(LineItemAuditLogs::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_line_item_audit_logs_project_id")
                    .table(LineItemAuditLogs::Table)
                    .col(LineItemAuditLogs::ProjectId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_line_item_audit_logs_line_item_id")
                    .table(LineItemAuditLogs::Table)
                    .col(LineItemAuditLogs::LineItemId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_line_item_audit_logs_created_at")
                    .table(LineItemAuditLogs::Table)
                    .col(LineItemAuditLogs::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(LineItemMessageAuditLogs::Table)
                    .col(pk_id_col(manager, LineItemMessageAuditLogs::Id))
                    .col(uuid_col(LineItemMessageAuditLogs::Uuid))
                    .col(fk_id_col(
                        manager,
                        LineItemMessageAuditLogs::LineItemMessageId,
                    ))
                    .col(fk_id_col(manager, LineItemMessageAuditLogs::LineItemId))
                    .col(fk_id_col(manager, LineItemMessageAuditLogs::ProjectId))
                    .col(fk_id_nullable_col(manager, LineItemMessageAuditLogs::UserId))
                    .col(
                        ColumnDef::new(LineItemMessageAuditLogs::Action)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(LineItemMessageAuditLogs::OldRole).string())
                    .col(ColumnDef::new(LineItemMessageAuditLogs::NewRole).string())
                    .col(ColumnDef::new(LineItemMessageAuditLogs::OldContent).text())
                    .col(ColumnDef::new(LineItemMessageAuditLogs::NewContent).text())
                    .col(ColumnDef::new(LineItemMessageAuditLogs::OldFeedback).text())
                    .col(ColumnDef::new(LineItemMessageAuditLogs::NewFeedback).text())
                    .col(ColumnDef::new(LineItemMessageAuditLogs::IpAddress).string())
                    .col(ColumnDef::new(LineItemMessageAuditLogs::UserAgent).string())
                    .col(timestamp_col(LineItemMessageAuditLogs::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_line_item_message_audit_logs_message_id")
                            .from(
                                LineItemMessageAuditLogs::Table,
                                LineItemMessageAuditLogs::LineItemMessageId,
                            )
                            .to(LineItemMessages::Table, LineItemMessages::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_line_item_message_audit_logs_line_item_id")
                            .from(
                                LineItemMessageAuditLogs::Table,
                                LineItemMessageAuditLogs::LineItemId,
                            )
                            .to(LineItems::Table, LineItems::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_line_item_message_audit_logs_project_id")
                            .from(
                                LineItemMessageAuditLogs::Table,
                                LineItemMessageAuditLogs::ProjectId,
                            )
                            .to(Projects::Table, Projects::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_line_item_message_audit_logs_user_id")
                            .from(
                                LineItemMessageAuditLogs::Table,
                                LineItemMessageAuditLogs::UserId,
                            )
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_line_item_message_audit_logs_uuid")
                    .table(LineItemMessageAuditLogs::Table)
                    .col(LineItemMessageAuditLogs::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_line_item_message_audit_logs_project_id")
                    .table(LineItemMessageAuditLogs::Table)
                    .col(LineItemMessageAuditLogs::ProjectId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_line_item_message_audit_logs_line_item_id")
                    .table(LineItemMessageAuditLogs::Table)
                    .col(LineItemMessageAuditLogs::LineItemId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_line_item_message_audit_logs_created_at")
                    .table(LineItemMessageAuditLogs::Table)
                    .col(LineItemMessageAuditLogs::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(LineItemMessageAuditLogs::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(LineItemAuditLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LineItemMessages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LineItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Projects::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

fn pk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().auto_increment().primary_key().to_owned()
}

fn fk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().to_owned()
}

fn fk_id_nullable_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.to_owned()
}

fn uuid_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().not_null().to_owned()
}

fn uuid_nullable_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().to_owned()
}

fn timestamp_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Uuid,
    Email,
    FullName,
    HashedPassword,
    IsActive,
    IsSuperuser,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Projects {
    Table,
    Id,
    Uuid,
    Name,
    Description,
    Url,
    OwnerId,
    Status,
    JobId,
    Info,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum LineItems {
    Table,
    Id,
    Uuid,
    ProjectId,
    LineIndex,
    Status,
    Tools,
    Feedback,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum LineItemMessages {
    Table,
    Id,
    Uuid,
    LineItemId,
    LineMessageIndex,
    Role,
    Content,
    Feedback,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Tasks {
    Table,
    Id,
    Uuid,
    ProjectId,
    UserId,
    LineItemId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum LineItemAuditLogs {
    Table,
    Id,
    Uuid,
    LineItemId,
    ProjectId,
    UserId,
    Action,
    OldStatus,
    NewStatus,
    OldFeedback,
    NewFeedback,
    OldTools,
    NewTools,
    IpAddress,
    UserAgent,
    CreatedAt,
}

#[derive(Iden)]
enum LineItemMessageAuditLogs {
    Table,
    Id,
    Uuid,
    LineItemMessageId,
    LineItemId,
    ProjectId,
    UserId,
    Action,
    OldRole,
    NewRole,
    OldContent,
    NewContent,
    OldFeedback,
    NewFeedback,
    IpAddress,
    UserAgent,
    CreatedAt,
}
