//! SQLite pool construction. Conversation snapshots are single-row
//! upserts, so the pool stays small; `busy_timeout` covers the server and
//! the CLI sharing one database file.

use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

pub type DbPool = sqlx::SqlitePool;

/// Pool sizing knobs, mirroring the `[database]` section of the
/// application config. Zero values are clamped up to the smallest usable
/// setting rather than rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self { max_connections: 5, acquire_timeout: Duration::from_secs(30) }
    }
}

impl PoolSettings {
    pub fn new(max_connections: u32, timeout_secs: u64) -> Self {
        Self {
            max_connections: max_connections.max(1),
            acquire_timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }
}

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, PoolSettings::default()).await
}

pub async fn connect_with_settings(
    database_url: &str,
    settings: PoolSettings,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(settings.max_connections.max(1))
        .acquire_timeout(settings.acquire_timeout)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // WAL keeps snapshot reads open while a versioned save is
                // in flight on another connection.
                for pragma in [
                    "PRAGMA foreign_keys = ON",
                    "PRAGMA journal_mode = WAL",
                    "PRAGMA busy_timeout = 5000",
                ] {
                    sqlx::query(pragma).execute(&mut *conn).await?;
                }
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{connect, PoolSettings};

    #[test]
    fn zero_settings_are_clamped_to_usable_values() {
        let settings = PoolSettings::new(0, 0);
        assert_eq!(settings.max_connections, 1);
        assert_eq!(settings.acquire_timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn connected_pools_answer_queries() {
        let pool = connect("sqlite::memory:").await.expect("connect");
        let (value,): (i64,) =
            sqlx::query_as("SELECT 1").fetch_one(&pool).await.expect("probe query");
        assert_eq!(value, 1);
        pool.close().await;
    }
}
