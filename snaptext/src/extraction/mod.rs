//! Image-to-text extraction pipeline
//!
//! This module owns the whole path from an uploaded image buffer to a
//! structured [`crate::models::ExtractionResult`]:
//!
//! - `preprocessing` validates the declared format and conditions the buffer
//!   (resize, transcode, recompress) so it stays within the configured size
//!   and dimension budgets before it is sent to a paid API.
//! - `api` is the HTTP client for the vision-capable chat-completion
//!   endpoint, including classification of upstream failures.
//! - `retry` is a generic bounded retry/backoff driver fed by that
//!   classification.
//! - `parser` turns the model's free-form reply into text, a language code
//!   and a confidence score, with heuristic fallbacks when the prompted
//!   marker lines are missing.
//! - `service` composes the above into a single `extract` operation.
//!
//! # Configuration
//!
//! Behavior is controlled via `VisionConfig`, `ImageConfig` and
//! `ScoringConfig` (see `config.rs`).

mod api;
mod parser;
mod preprocessing;
mod retry;
mod service;

pub use api::{VisionClient, VisionCompletion};
pub use parser::{parse, ParsedExtraction};
pub use preprocessing::{
    is_supported_mime, normalize, ImageOptions, Normalization, NormalizedImage,
    SUPPORTED_MIME_TYPES,
};
pub use retry::{classify, Disposition, RetryPolicy};
pub use service::ExtractionService;
