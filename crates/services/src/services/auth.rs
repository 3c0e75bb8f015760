use std::sync::Arc;

use dashmap::DashMap;
use db::models::user::User;
use sea_orm::{ConnectionTrait, DbErr};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Incorrect email or password")]
    InvalidCredentials,
    #[error("Inactive user")]
    InactiveUser,
    #[error("Invalid or expired session token")]
    InvalidToken,
}

/// Stored as `salt$digest` where digest = sha256(salt || password).
pub fn hash_password(password: &str) -> String {
    let salt_bytes: [u8; 16] = rand::random();
    let salt = hex::encode(salt_bytes);
    format!("{salt}${}", digest(&salt, password))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, expected)) = stored.split_once('$') else {
        return false;
    };
    digest(salt, password) == expected
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Bearer-token sessions held in memory; a restart logs everyone out.
#[derive(Clone, Default)]
pub struct AuthService {
    sessions: Arc<DashMap<String, Uuid>>,
}

impl AuthService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn login<C: ConnectionTrait>(
        &self,
        db: &C,
        email: &str,
        password: &str,
    ) -> Result<(String, User), AuthError> {
        let (user, stored_hash) = User::credentials_by_email(db, email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(password, &stored_hash) {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AuthError::InactiveUser);
        }

        let token_bytes: [u8; 32] = rand::random();
        let token = hex::encode(token_bytes);
        self.sessions.insert(token.clone(), user.id);
        tracing::debug!(user_id = %user.id, "session created");
        Ok((token, user))
    }

    pub fn logout(&self, token: &str) {
        self.sessions.remove(token);
    }

    pub async fn user_for_token<C: ConnectionTrait>(
        &self,
        db: &C,
        token: &str,
    ) -> Result<User, AuthError> {
        let user_id = self
            .sessions
            .get(token)
            .map(|entry| *entry)
            .ok_or(AuthError::InvalidToken)?;
        let user = User::find_by_id(db, user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        if !user.is_active {
            return Err(AuthError::InactiveUser);
        }
        Ok(user)
    }
}
