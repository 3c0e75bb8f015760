use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use utils_core::assets::asset_dir;

pub mod entities;
pub mod models;
pub mod types;

pub use sea_orm::DbErr;

#[derive(Clone)]
pub struct DBService {
    pub conn: DatabaseConnection,
}

impl DBService {
    /// Connect using `DATABASE_URL`, falling back to a sqlite file under the
    /// asset directory. Pending migrations run before the service is handed
    /// out.
    pub async fn new() -> Result<DBService, DbErr> {
        let database_url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => format!(
                "sqlite://{}?mode=rwc",
                asset_dir().join("db.sqlite").to_string_lossy()
            ),
        };
        Self::from_url(&database_url).await
    }

    pub async fn from_url(database_url: &str) -> Result<DBService, DbErr> {
        let mut options = ConnectOptions::new(database_url.to_string());
        options.max_connections(5).sqlx_logging(false);
        let conn = Database::connect(options).await?;
        db_migration::Migrator::up(&conn, None).await?;
        tracing::debug!("database ready at {database_url}");
        Ok(DBService { conn })
    }
}
