use crate::config::{Config, ScoringConfig};
use crate::error::{Result, SnapError};
use crate::models::ExtractionResult;

use super::api::VisionClient;
use super::parser;
use super::preprocessing::{self, ImageOptions, Normalization};

/// Orchestrates one extraction: format validation, best-effort image
/// normalization, the retried vision call, and response parsing.
#[derive(Clone, Debug)]
pub struct ExtractionService {
    vision: VisionClient,
    options: ImageOptions,
    scoring: ScoringConfig,
}

impl ExtractionService {
    pub fn new(vision: VisionClient, options: ImageOptions, scoring: ScoringConfig) -> Self {
        Self {
            vision,
            options,
            scoring,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let vision = VisionClient::new(&config.vision)?;
        Ok(Self::new(
            vision,
            ImageOptions::from(&config.image),
            config.scoring.clone(),
        ))
    }

    pub async fn extract(
        &self,
        bytes: &[u8],
        mime: &str,
        model_override: Option<&str>,
    ) -> Result<ExtractionResult> {
        if !preprocessing::is_supported_mime(mime) {
            return Err(SnapError::UnsupportedFormat(mime.to_string()));
        }

        if let Some(kind) = infer::get(bytes) {
            if !mime.eq_ignore_ascii_case(kind.mime_type()) {
                tracing::warn!(
                    declared = %mime,
                    sniffed = %kind.mime_type(),
                    "Declared MIME type disagrees with magic bytes"
                );
            }
        }

        let normalization = preprocessing::normalize(bytes, mime, &self.options);
        if let Normalization::Unchanged { reason, .. } = &normalization {
            // Normalization is best-effort; the original buffer still goes out.
            tracing::warn!(reason = %reason, "Image normalization fell back to original buffer");
        }
        let image = normalization.into_image();

        tracing::debug!(
            bytes = image.bytes.len(),
            width = image.width,
            height = image.height,
            mime = %image.mime,
            "Submitting image for extraction"
        );

        let completion = self.vision.extract_text(&image, model_override).await?;
        let parsed = parser::parse(&completion.text, &self.scoring);

        Ok(ExtractionResult {
            text: parsed.text,
            language: parsed.language,
            confidence: parsed.confidence,
            model: completion.model,
            prompt_tokens: completion.prompt_tokens,
            completion_tokens: completion.completion_tokens,
        })
    }
}
