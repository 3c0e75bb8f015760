use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use sea_orm::sea_query::Expr;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    entities::{line_item_audit_log, line_item_message_audit_log, task, user},
    models::ids,
};

#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("User not found")]
    UserNotFound,
    #[error("A user with this email already exists")]
    DuplicateEmail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub full_name: Option<String>,
    pub hashed_password: String,
    pub is_active: bool,
    pub is_superuser: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub hashed_password: Option<String>,
    pub is_active: Option<bool>,
    pub is_superuser: Option<bool>,
}

impl User {
    pub(crate) fn from_model(model: user::Model) -> Self {
        Self {
            id: model.uuid,
            email: model.email,
            full_name: model.full_name,
            is_active: model.is_active,
            is_superuser: model.is_superuser,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = user::Entity::find()
            .order_by_asc(user::Column::Email)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = user::Entity::find()
            .filter(user::Column::Uuid.eq(id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_by_email<C: ConnectionTrait>(
        db: &C,
        email: &str,
    ) -> Result<Option<Self>, DbErr> {
        let record = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    /// Login lookup; the stored hash never leaves the credential path.
    pub async fn credentials_by_email<C: ConnectionTrait>(
        db: &C,
        email: &str,
    ) -> Result<Option<(Self, String)>, DbErr> {
        let record = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(db)
            .await?;
        Ok(record.map(|model| {
            let hashed_password = model.hashed_password.clone();
            (Self::from_model(model), hashed_password)
        }))
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateUser,
        user_id: Uuid,
    ) -> Result<Self, UserError> {
        if Self::find_by_email(db, &data.email).await?.is_some() {
            return Err(UserError::DuplicateEmail);
        }

        let now = Utc::now();
        let active = user::ActiveModel {
            uuid: Set(user_id),
            email: Set(data.email.clone()),
            full_name: Set(data.full_name.clone()),
            hashed_password: Set(data.hashed_password.clone()),
            is_active: Set(data.is_active),
            is_superuser: Set(data.is_superuser),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        payload: &UpdateUser,
    ) -> Result<Self, UserError> {
        let record = user::Entity::find()
            .filter(user::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(UserError::UserNotFound)?;

        if let Some(email) = payload.email.as_deref()
            && email != record.email
            && Self::find_by_email(db, email).await?.is_some()
        {
            return Err(UserError::DuplicateEmail);
        }

        let mut active: user::ActiveModel = record.into();
        if let Some(email) = payload.email.clone() {
            active.email = Set(email);
        }
        if payload.full_name.is_some() {
            active.full_name = Set(payload.full_name.clone());
        }
        if let Some(hashed_password) = payload.hashed_password.clone() {
            active.hashed_password = Set(hashed_password);
        }
        if let Some(is_active) = payload.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(is_superuser) = payload.is_superuser {
            active.is_superuser = Set(is_superuser);
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    /// Removes the user, their task assignments, and detaches their audit
    /// rows. Child rows are deleted explicitly since sqlite connections do
    /// not always enforce foreign key cascades.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let Some(user_row_id) = ids::user_id_by_uuid(db, id).await? else {
            return Ok(0);
        };

        task::Entity::delete_many()
            .filter(task::Column::UserId.eq(user_row_id))
            .exec(db)
            .await?;

        line_item_audit_log::Entity::update_many()
            .col_expr(line_item_audit_log::Column::UserId, Expr::value(None::<i64>))
            .filter(line_item_audit_log::Column::UserId.eq(user_row_id))
            .exec(db)
            .await?;
        line_item_message_audit_log::Entity::update_many()
            .col_expr(
                line_item_message_audit_log::Column::UserId,
                Expr::value(None::<i64>),
            )
            .filter(line_item_message_audit_log::Column::UserId.eq(user_row_id))
            .exec(db)
            .await?;

        let result = user::Entity::delete_many()
            .filter(user::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
