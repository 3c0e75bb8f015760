use std::time::Duration;

use anyhow::Error as AnyhowError;
use db::{DBService, DbErr, models::user::{CreateUser, User}};
use sea_orm::DatabaseConnection;
use server::{AppState, http};
use services::services::auth::hash_password;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, prelude::*};
use utils_core::assets::{asset_dir, temp_download_dir};
use uuid::Uuid;

const TEMP_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);
const DEFAULT_TEMP_FILE_TTL_SECS: u64 = 60 * 60 * 24;

#[derive(Debug, Error)]
pub enum LabelbenchError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

#[tokio::main]
async fn main() -> Result<(), LabelbenchError> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!(
        "warn,server={level},services={level},db={level},db_migration={level},utils_core={level}",
        level = log_level
    );
    let env_filter = EnvFilter::try_new(filter_string).map_err(AnyhowError::from)?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    if !asset_dir().exists() {
        std::fs::create_dir_all(asset_dir())?;
    }
    std::fs::create_dir_all(temp_download_dir())?;

    let db = DBService::new().await?;
    bootstrap_superuser(&db.conn).await?;

    tokio::spawn(async {
        let ttl = std::env::var("LB_TEMP_FILE_TTL_SECS")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_TEMP_FILE_TTL_SECS);
        loop {
            if let Err(err) = prune_temp_files_once(Duration::from_secs(ttl)) {
                tracing::warn!(error = %err, "Failed to prune temp download files");
            }
            tokio::time::sleep(TEMP_CLEANUP_INTERVAL).await;
        }
    });

    let state = AppState::new(db);
    let app_router = http::router(state);

    let port = std::env::var("BACKEND_PORT")
        .or_else(|_| std::env::var("PORT"))
        .ok()
        .and_then(|value| value.trim().parse::<u16>().ok())
        .unwrap_or(8000);
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    let actual_port = listener.local_addr()?.port();
    tracing::info!("Server running on http://{host}:{actual_port}");

    axum::serve(listener, app_router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// First-run bootstrap so the instance is never locked out.
async fn bootstrap_superuser(conn: &DatabaseConnection) -> Result<(), LabelbenchError> {
    let email =
        std::env::var("LB_SUPERUSER_EMAIL").unwrap_or_else(|_| "admin@example.com".to_string());
    let password =
        std::env::var("LB_SUPERUSER_PASSWORD").unwrap_or_else(|_| "changethis".to_string());

    if User::find_by_email(conn, &email).await?.is_some() {
        return Ok(());
    }

    let user = User::create(
        conn,
        &CreateUser {
            email,
            full_name: Some("Admin".to_string()),
            hashed_password: hash_password(&password),
            is_active: true,
            is_superuser: true,
        },
        Uuid::new_v4(),
    )
    .await
    .map_err(AnyhowError::from)?;
    tracing::info!(user_id = %user.id, "bootstrapped initial superuser");
    Ok(())
}

fn prune_temp_files_once(ttl: Duration) -> std::io::Result<()> {
    let dir = temp_download_dir();
    if !dir.exists() {
        return Ok(());
    }

    let mut removed = 0u64;
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        let expired = metadata
            .modified()
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age > ttl);
        if expired && std::fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }
    if removed > 0 {
        tracing::info!(removed, "Pruned expired temp download files");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server");
}
