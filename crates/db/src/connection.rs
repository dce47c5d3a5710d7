use std::str::FromStr;
use std::time::Duration;

use roster_core::config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub type DbPool = sqlx::SqlitePool;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

impl ConnectionSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), max_connections: 5, timeout_secs: 30 }
    }

    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections,
            timeout_secs: config.timeout_secs,
        }
    }

    /// Each connection to an in-memory SQLite URL opens its own private database.
    pub fn is_in_memory(&self) -> bool {
        let url = self.url.trim();
        url.contains(":memory:") || url.contains("mode=memory")
    }
}

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&ConnectionSettings::new(database_url)).await
}

pub async fn connect_with_settings(settings: &ConnectionSettings) -> Result<DbPool, sqlx::Error> {
    let url = match settings.url.trim() {
        ":memory:" => "sqlite::memory:",
        other => other,
    };
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

    let mut pool_options = SqlitePoolOptions::new()
        .acquire_timeout(Duration::from_secs(settings.timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        });

    // The database lives only as long as its single connection does.
    pool_options = if settings.is_in_memory() {
        pool_options.max_connections(1).min_connections(1).idle_timeout(None).max_lifetime(None)
    } else {
        pool_options.max_connections(settings.max_connections.max(1))
    };

    pool_options.connect_with(options).await
}
