use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use nanoid::nanoid;

use crate::error::{Result, SnapError};
use crate::models::{NewScreenshot, ScreenshotRecord, StoreStats};

use super::connection::Database;
use super::traits::{is_valid_record_id, ScreenshotStore};

const RECORD_COLUMNS: &str = "id, filename, extracted_text, language, confidence, model, \
     prompt_tokens, completion_tokens, original_size_bytes, original_mime, user_id, created_at";

/// libsql-backed store. Works against a local file, `:memory:`, or a
/// remote turso database through the shared [`Database`] handle.
pub struct LibSqlStore {
    database: Database,
}

impl LibSqlStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl ScreenshotStore for LibSqlStore {
    async fn create(&self, new: &NewScreenshot) -> Result<ScreenshotRecord> {
        let conn = self.database.connect().await?;

        let record = ScreenshotRecord {
            id: nanoid!(),
            filename: new.filename.clone(),
            extracted_text: new.extracted_text.clone(),
            language: new.language.clone(),
            confidence: new.confidence,
            model: new.model.clone(),
            prompt_tokens: new.prompt_tokens,
            completion_tokens: new.completion_tokens,
            original_size_bytes: new.original_size_bytes,
            original_mime: new.original_mime.clone(),
            user_id: new.user_id.clone(),
            created_at: Utc::now(),
        };

        conn.execute(
            "INSERT INTO screenshots (id, filename, extracted_text, language, confidence, model, \
             prompt_tokens, completion_tokens, original_size_bytes, original_mime, user_id, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                record.id.clone(),
                record.filename.clone(),
                record.extracted_text.clone(),
                record.language.clone(),
                record.confidence as f64,
                record.model.clone(),
                record.prompt_tokens as i64,
                record.completion_tokens as i64,
                record.original_size_bytes as i64,
                record.original_mime.clone(),
                record.user_id.clone(),
                record.created_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| SnapError::StorageWrite(e.to_string()))?;

        tracing::debug!(id = %record.id, "Persisted extraction record");

        Ok(record)
    }

    async fn find_all(&self, limit: u32, skip: u32) -> Result<Vec<ScreenshotRecord>> {
        let conn = self.database.connect().await?;

        let mut rows = conn
            .query(
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM screenshots \
                     ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"
                ),
                params![limit as i64, skip as i64],
            )
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(row_to_record(&row)?);
        }

        Ok(records)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<ScreenshotRecord>> {
        if !is_valid_record_id(id) {
            return Ok(None);
        }

        let conn = self.database.connect().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {RECORD_COLUMNS} FROM screenshots WHERE id = ?1"),
                params![id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool> {
        if !is_valid_record_id(id) {
            return Ok(false);
        }

        let conn = self.database.connect().await?;
        let deleted = conn
            .execute("DELETE FROM screenshots WHERE id = ?1", params![id])
            .await?;

        Ok(deleted > 0)
    }

    async fn get_stats(&self) -> Result<StoreStats> {
        let conn = self.database.connect().await?;

        let mut rows = conn
            .query(
                "SELECT COUNT(*), \
                 COALESCE(SUM(LENGTH(extracted_text)), 0), \
                 COALESCE(AVG(confidence), 0.0), \
                 COALESCE(SUM(prompt_tokens + completion_tokens), 0) \
                 FROM screenshots",
                (),
            )
            .await?;

        let row = rows
            .next()
            .await?
            .ok_or_else(|| SnapError::Internal("stats query returned no row".to_string()))?;

        Ok(StoreStats {
            total_count: row.get::<i64>(0)? as u64,
            total_text_length: row.get::<i64>(1)? as u64,
            average_confidence: row.get::<f64>(2)?,
            total_tokens: row.get::<i64>(3)? as u64,
        })
    }
}

fn row_to_record(row: &Row) -> Result<ScreenshotRecord> {
    let created_at: String = row.get(11)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| SnapError::Internal(format!("invalid created_at in storage: {e}")))?
        .with_timezone(&Utc);

    Ok(ScreenshotRecord {
        id: row.get(0)?,
        filename: row.get(1)?,
        extracted_text: row.get(2)?,
        language: row.get(3)?,
        confidence: row.get::<f64>(4)? as f32,
        model: row.get(5)?,
        prompt_tokens: row.get::<i64>(6)? as u32,
        completion_tokens: row.get::<i64>(7)? as u32,
        original_size_bytes: row.get::<i64>(8)? as u64,
        original_mime: row.get(9)?,
        user_id: row.get(10)?,
        created_at,
    })
}
