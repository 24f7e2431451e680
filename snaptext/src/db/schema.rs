use libsql::Connection;

use crate::error::Result;

/// Idempotent schema setup, run at startup and after a reconnect.
pub async fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS screenshots (
            id TEXT PRIMARY KEY,
            filename TEXT NOT NULL,
            extracted_text TEXT NOT NULL,
            language TEXT NOT NULL,
            confidence REAL NOT NULL,
            model TEXT NOT NULL,
            prompt_tokens INTEGER NOT NULL DEFAULT 0,
            completion_tokens INTEGER NOT NULL DEFAULT 0,
            original_size_bytes INTEGER NOT NULL,
            original_mime TEXT NOT NULL,
            user_id TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_screenshots_created_at
            ON screenshots (created_at DESC);

        CREATE INDEX IF NOT EXISTS idx_screenshots_user_id
            ON screenshots (user_id);
        "#,
    )
    .await?;

    Ok(())
}
