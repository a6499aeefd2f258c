use std::time::Duration;

use sea_orm::{ConnectOptions, Database};

pub mod entities;
pub mod models;
pub mod schema;
mod session;
pub mod types;

pub use sea_orm::{DatabaseConnection, DbErr};
pub use session::{DbSession, SessionMode};

const POOL_MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns the connection pool. Built once at startup and handed to whatever
/// needs storage; the storage location never changes afterwards.
#[derive(Clone)]
pub struct DBService {
    pub pool: DatabaseConnection,
    allow_reset: bool,
}

impl DBService {
    /// Connects to `database_url` and synchronizes the schema.
    ///
    /// `allow_reset` enables [`DbSession::delete_all_todos`]; leave it off
    /// outside of tests.
    pub async fn new(database_url: &str, allow_reset: bool) -> Result<DBService, DbErr> {
        let mut options = ConnectOptions::new(database_url.to_string());
        options
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .sqlx_logging(false);
        // In-memory SQLite databases exist per connection, so those keep the
        // driver's single-connection default.
        if !database_url.contains(":memory:") {
            options.max_connections(POOL_MAX_CONNECTIONS);
        }

        let pool = Database::connect(options).await?;
        let service = DBService { pool, allow_reset };
        service.sync_schema().await;
        Ok(service)
    }

    /// Runs one schema synchronization pass. Failures are logged and left for
    /// the next pass.
    pub async fn sync_schema(&self) {
        if let Err(err) = schema::sync_schema(&self.pool).await {
            tracing::warn!("Schema synchronization failed, will retry: {}", err);
        }
    }

    /// Hands out a new request-scoped session.
    pub fn session(&self, mode: SessionMode) -> DbSession {
        DbSession::new(self.pool.clone(), mode, self.allow_reset)
    }
}
