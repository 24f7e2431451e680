use std::sync::Arc;
use std::time::Duration;

use libsql::{Builder, Connection};
use tokio::sync::RwLock;

use crate::config::DatabaseConfig;
use crate::error::{Result, SnapError};

use super::schema;

const RECONNECT_ATTEMPTS: u32 = 2;
const RECONNECT_BACKOFF_MS: u64 = 500;

/// Handle to the underlying libsql database. Supports local files,
/// `:memory:`, and remote turso URLs, chosen from the configured URL.
///
/// Connections are pinged before being handed out; a dead handle triggers
/// a bounded reconnect with linear backoff before the error surfaces as
/// [`SnapError::StorageConnect`].
pub struct Database {
    config: DatabaseConfig,
    inner: RwLock<Arc<libsql::Database>>,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let db = Self::open(config).await?;
        let conn = db.connect()?;
        schema::init_schema(&conn).await?;

        tracing::info!(url = %config.url, "Database ready");

        Ok(Self {
            config: config.clone(),
            inner: RwLock::new(Arc::new(db)),
        })
    }

    async fn open(config: &DatabaseConfig) -> Result<libsql::Database> {
        let db = if config.url.starts_with("libsql://") || config.url.starts_with("https://") {
            Builder::new_remote(
                config.url.clone(),
                config.auth_token.clone().unwrap_or_default(),
            )
            .build()
            .await?
        } else if config.url == ":memory:" {
            Builder::new_local(":memory:").build().await?
        } else {
            let path = config.url.strip_prefix("file:").unwrap_or(&config.url);
            Builder::new_local(path).build().await?
        };

        Ok(db)
    }

    /// Hand out a healthy connection for one unit of work.
    pub async fn connect(&self) -> Result<Connection> {
        if let Ok(conn) = self.inner.read().await.connect() {
            if ping(&conn).await.is_ok() {
                return Ok(conn);
            }
        }

        self.reconnect().await
    }

    async fn reconnect(&self) -> Result<Connection> {
        let mut last_error = String::from("connection lost");

        for attempt in 1..=RECONNECT_ATTEMPTS {
            tracing::warn!(attempt, "Storage connection unhealthy, reopening");
            tokio::time::sleep(Duration::from_millis(RECONNECT_BACKOFF_MS * attempt as u64))
                .await;

            let db = match Self::open(&self.config).await {
                Ok(db) => db,
                Err(e) => {
                    last_error = e.to_string();
                    continue;
                }
            };

            let conn = match db.connect() {
                Ok(conn) => conn,
                Err(e) => {
                    last_error = e.to_string();
                    continue;
                }
            };

            if let Err(e) = ping(&conn).await {
                last_error = e.to_string();
                continue;
            }

            if let Err(e) = schema::init_schema(&conn).await {
                last_error = e.to_string();
                continue;
            }

            *self.inner.write().await = Arc::new(db);
            tracing::info!(attempt, "Storage connection re-established");
            return Ok(conn);
        }

        Err(SnapError::StorageConnect(last_error))
    }
}

async fn ping(conn: &Connection) -> Result<()> {
    conn.query("SELECT 1", ()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> DatabaseConfig {
        DatabaseConfig {
            url: ":memory:".to_string(),
            auth_token: None,
        }
    }

    #[tokio::test]
    async fn test_memory_database_initializes_schema() {
        let db = Database::new(&memory_config()).await.unwrap();
        let conn = db.connect().await.unwrap();

        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'screenshots'",
                (),
            )
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_connect_survives_repeated_use() {
        let db = Database::new(&memory_config()).await.unwrap();
        for _ in 0..3 {
            let conn = db.connect().await.unwrap();
            conn.query("SELECT 1", ()).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_file_backed_database_persists_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            url: format!("file:{}", dir.path().join("snaptext-test.db").display()),
            auth_token: None,
        };

        {
            let db = Database::new(&config).await.unwrap();
            let conn = db.connect().await.unwrap();
            conn.execute(
                "INSERT INTO screenshots (id, filename, extracted_text, language, confidence, \
                 model, original_size_bytes, original_mime, created_at) \
                 VALUES ('a-aaaaaaaaaaaaaaaaaaa', 'f.png', 't', 'en', 90.0, 'm', 1, \
                 'image/png', '2026-01-01T00:00:00+00:00')",
                (),
            )
            .await
            .unwrap();
        }

        let db = Database::new(&config).await.unwrap();
        let conn = db.connect().await.unwrap();
        let mut rows = conn
            .query("SELECT COUNT(*) FROM screenshots", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 1);
    }
}
