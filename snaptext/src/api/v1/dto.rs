//! Wire DTOs for the v1 API. Field names serialize as camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ScreenshotRecord, StoreStats};

/// Payload returned from a successful extraction submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResponse {
    pub id: String,
    pub filename: String,
    pub text: String,
    pub language: String,
    pub confidence: f32,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub processing_time_ms: u64,
}

/// One stored extraction, as returned by the read endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRecord {
    pub id: String,
    pub filename: String,
    pub text: String,
    pub language: String,
    pub confidence: f32,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub original_size_bytes: u64,
    pub original_mime: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ScreenshotRecord> for ExtractionRecord {
    fn from(record: ScreenshotRecord) -> Self {
        Self {
            id: record.id,
            filename: record.filename,
            text: record.extracted_text,
            language: record.language,
            confidence: record.confidence,
            model: record.model,
            prompt_tokens: record.prompt_tokens,
            completion_tokens: record.completion_tokens,
            original_size_bytes: record.original_size_bytes,
            original_mime: record.original_mime,
            user_id: record.user_id,
            created_at: record.created_at,
        }
    }
}

/// Offset pagination for the history listing.
///
/// `limit` defaults to 50 and is clamped to `1..=100`; `skip` defaults to 0.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
    pub skip: Option<u32>,
}

impl HistoryQuery {
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(50).clamp(1, 100)
    }

    pub fn skip(&self) -> u32 {
        self.skip.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub items: Vec<ExtractionRecord>,
    pub limit: u32,
    pub skip: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub id: String,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_count: u64,
    pub total_text_length: u64,
    pub average_confidence: f64,
    pub total_tokens: u64,
}

impl From<StoreStats> for StatsResponse {
    fn from(stats: StoreStats) -> Self {
        Self {
            total_count: stats.total_count,
            total_text_length: stats.total_text_length,
            average_confidence: stats.average_confidence,
            total_tokens: stats.total_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_history_query_clamps_limit() {
        let q = HistoryQuery {
            limit: Some(999),
            skip: None,
        };
        assert_eq!(q.limit(), 100);
        assert_eq!(q.skip(), 0);

        let q = HistoryQuery {
            limit: Some(0),
            skip: Some(7),
        };
        assert_eq!(q.limit(), 1);
        assert_eq!(q.skip(), 7);

        let q = HistoryQuery {
            limit: None,
            skip: None,
        };
        assert_eq!(q.limit(), 50);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = ExtractionRecord {
            id: "V1StGXR8_Z5jdHi6B-myT".to_string(),
            filename: "invoice.png".to_string(),
            text: "INVOICE #1023".to_string(),
            language: "en".to_string(),
            confidence: 97.0,
            model: "gpt-4o".to_string(),
            prompt_tokens: 100,
            completion_tokens: 20,
            original_size_bytes: 2048,
            original_mime: "image/png".to_string(),
            user_id: None,
            created_at: "2026-01-01T00:00:00Z".parse().unwrap(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["promptTokens"], 100);
        assert_eq!(json["originalMime"], "image/png");
        assert!(json.get("userId").is_none());
    }
}
