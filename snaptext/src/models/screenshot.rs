use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structured output of one extraction call, before persistence.
///
/// Invariants: `confidence` is clamped to `[0, 100]`; `language` is a
/// 2-3 letter lowercase code (`"en"` when undetectable); `text` carries no
/// `LANGUAGE:`/`CONFIDENCE:` marker lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub text: String,
    pub language: String,
    pub confidence: f32,
    /// Model id the provider actually served (may differ from the one
    /// requested due to provider-side aliasing).
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Fields for a record about to be persisted. The store assigns the id
/// and creation timestamp.
#[derive(Debug, Clone)]
pub struct NewScreenshot {
    pub filename: String,
    pub extracted_text: String,
    pub language: String,
    pub confidence: f32,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub original_size_bytes: u64,
    pub original_mime: String,
    pub user_id: Option<String>,
}

/// Durable form of an extraction. Immutable after creation; removed only
/// by explicit deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotRecord {
    pub id: String,
    pub filename: String,
    pub extracted_text: String,
    pub language: String,
    pub confidence: f32,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub original_size_bytes: u64,
    pub original_mime: String,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_count: u64,
    pub total_text_length: u64,
    pub average_confidence: f64,
    pub total_tokens: u64,
}
