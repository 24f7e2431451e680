use async_trait::async_trait;

use crate::error::Result;
use crate::models::{NewScreenshot, ScreenshotRecord, StoreStats};

pub const RECORD_ID_LENGTH: usize = 21;

/// Record ids are nanoids: 21 characters from the URL-safe alphabet.
/// Malformed ids short-circuit to not-found semantics instead of reaching
/// the database.
pub fn is_valid_record_id(id: &str) -> bool {
    id.len() == RECORD_ID_LENGTH
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Persistence contract for extraction records. Records are immutable once
/// created; the only mutation is deletion by id.
#[async_trait]
pub trait ScreenshotStore: Send + Sync {
    /// Persist a record, assigning its id and creation timestamp.
    async fn create(&self, new: &NewScreenshot) -> Result<ScreenshotRecord>;

    /// Newest-first listing.
    async fn find_all(&self, limit: u32, skip: u32) -> Result<Vec<ScreenshotRecord>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<ScreenshotRecord>>;

    /// Returns whether a record was actually removed.
    async fn delete_by_id(&self, id: &str) -> Result<bool>;

    async fn get_stats(&self) -> Result<StoreStats>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_nanoid_accepted() {
        assert!(is_valid_record_id("V1StGXR8_Z5jdHi6B-myT"));
        assert!(is_valid_record_id(&nanoid::nanoid!()));
    }

    #[test]
    fn test_malformed_ids_rejected() {
        assert!(!is_valid_record_id(""));
        assert!(!is_valid_record_id("short"));
        assert!(!is_valid_record_id("way-too-long-to-be-a-nanoid-value"));
        assert!(!is_valid_record_id("V1StGXR8_Z5jdHi6B-my!"));
        assert!(!is_valid_record_id("'; DROP TABLE screens"));
    }
}
