use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::{parse_vision_provider_model, VisionConfig};
use crate::error::{Result, SnapError};

use super::preprocessing::NormalizedImage;
use super::retry::{self, RetryPolicy};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
const LMSTUDIO_BASE_URL: &str = "http://localhost:1234/v1";

const EXTRACTION_PROMPT: &str = "Extract all text from this image verbatim. \
Preserve the original structure, including line breaks, lists and tables. \
Do not add commentary or explanations. After the extracted text, append two lines:\n\
LANGUAGE: <2-3 letter lowercase language code of the extracted text>\n\
CONFIDENCE: <number from 0 to 100 rating how certain you are the text is correct>";

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: Option<String>,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Raw reply from the vision model plus usage accounting.
#[derive(Debug, Clone)]
pub struct VisionCompletion {
    pub text: String,
    /// Model id reported by the provider; may differ from the requested id.
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Client for an OpenAI-compatible chat-completion endpoint with image
/// input. Retries transient failures per [`RetryPolicy`]; terminal failures
/// (auth, quota, unknown model) surface immediately.
#[derive(Clone, Debug)]
pub struct VisionClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    requires_api_key: bool,
    max_output_tokens: u32,
    temperature: f32,
    policy: RetryPolicy,
}

impl VisionClient {
    pub fn new(config: &VisionConfig) -> Result<Self> {
        let (provider, model) = parse_vision_provider_model(&config.model);

        let requires_api_key = !matches!(
            provider.to_lowercase().as_str(),
            "ollama" | "lmstudio" | "local"
        );

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url(provider).to_string());

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SnapError::Internal(format!("Failed to create vision HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url,
            model: model.to_string(),
            requires_api_key,
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
            policy: RetryPolicy::new(
                config.max_attempts,
                Duration::from_millis(config.retry_base_delay_ms),
            ),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit one extraction request, retrying per policy.
    pub async fn extract_text(
        &self,
        image: &NormalizedImage,
        model_override: Option<&str>,
    ) -> Result<VisionCompletion> {
        if self.requires_api_key && self.api_key.is_none() {
            return Err(SnapError::UpstreamAuth(
                "VISION_API_KEY is not configured".to_string(),
            ));
        }

        let request = self.build_request(image, model_override);

        retry::run(&self.policy, |attempt| {
            let request = &request;
            async move {
                if attempt > 0 {
                    tracing::debug!(attempt, model = %request.model, "Retrying vision request");
                }
                self.request_once(request).await
            }
        })
        .await
    }

    fn build_request(&self, image: &NormalizedImage, model_override: Option<&str>) -> ChatRequest {
        let encoded = STANDARD.encode(&image.bytes);
        let data_url = format!("data:{};base64,{encoded}", image.mime);

        let model = model_override
            .map(|m| parse_vision_provider_model(m).1.to_string())
            .unwrap_or_else(|| self.model.clone());

        ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        text: EXTRACTION_PROMPT.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_url },
                    },
                ],
            }],
            max_tokens: self.max_output_tokens,
            temperature: self.temperature,
        }
    }

    async fn request_once(&self, request: &ChatRequest) -> Result<VisionCompletion> {
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .json(request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body, retry_after));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| SnapError::UpstreamTransport(format!("invalid response body: {e}")))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                SnapError::UpstreamTransport("response contained no choices".to_string())
            })?;

        Ok(VisionCompletion {
            text: content,
            model: chat.model.unwrap_or_else(|| request.model.clone()),
            prompt_tokens: chat.usage.prompt_tokens,
            completion_tokens: chat.usage.completion_tokens,
        })
    }
}

fn map_transport_error(error: reqwest::Error) -> SnapError {
    if error.is_timeout() {
        SnapError::UpstreamTimeout(error.to_string())
    } else {
        SnapError::UpstreamTransport(error.to_string())
    }
}

/// Map an upstream HTTP failure onto the error taxonomy. Pure so the retry
/// driver can decide what to do without touching the transport.
pub(crate) fn classify_status(
    status: StatusCode,
    body: &str,
    retry_after: Option<u64>,
) -> SnapError {
    match status.as_u16() {
        401 | 403 => SnapError::UpstreamAuth(error_detail(status, body)),
        402 => SnapError::UpstreamQuota(error_detail(status, body)),
        404 => SnapError::UpstreamNotFound(error_detail(status, body)),
        // Providers report exhausted billing quota as a 429 with a
        // distinguishing error code; that is not worth retrying.
        429 if body.contains("insufficient_quota") => {
            SnapError::UpstreamQuota(error_detail(status, body))
        }
        429 => SnapError::UpstreamRateLimited { retry_after },
        s if s >= 500 => SnapError::UpstreamServer(status.to_string()),
        _ => SnapError::UpstreamTransport(error_detail(status, body)),
    }
}

fn error_detail(status: StatusCode, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status.to_string()
    } else {
        format!("{status} - {}", trimmed.chars().take(300).collect::<String>())
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn default_base_url(provider: &str) -> &'static str {
    match provider.to_lowercase().as_str() {
        "openrouter" => OPENROUTER_BASE_URL,
        "mistral" => MISTRAL_BASE_URL,
        "ollama" => OLLAMA_BASE_URL,
        "lmstudio" => LMSTUDIO_BASE_URL,
        _ => OPENAI_BASE_URL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> VisionConfig {
        VisionConfig {
            model: "openai/gpt-4o".to_string(),
            api_key: Some("test-key".to_string()),
            base_url: None,
            timeout_secs: 30,
            max_output_tokens: 4096,
            temperature: 0.1,
            max_attempts: 3,
            retry_base_delay_ms: 1,
        }
    }

    fn test_image() -> NormalizedImage {
        NormalizedImage {
            bytes: vec![0xFF, 0xD8, 0xFF, 0xE0],
            mime: "image/jpeg".to_string(),
            width: 1,
            height: 1,
        }
    }

    #[test]
    fn test_default_base_urls() {
        assert!(default_base_url("openai").contains("openai"));
        assert!(default_base_url("openrouter").contains("openrouter"));
        assert!(default_base_url("mistral").contains("mistral"));
        assert!(default_base_url("ollama").contains("localhost"));
        assert!(default_base_url("unknown").contains("openai"));
    }

    #[test]
    fn test_custom_base_url_wins() {
        let mut config = test_config();
        config.base_url = Some("https://proxy.example.com/v1".to_string());
        let client = VisionClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "https://proxy.example.com/v1");
    }

    #[tokio::test]
    async fn test_missing_api_key_is_auth_error_at_request_time() {
        let mut config = test_config();
        config.api_key = None;
        let client = VisionClient::new(&config).unwrap();

        let result = client.extract_text(&test_image(), None).await;
        assert!(matches!(result, Err(SnapError::UpstreamAuth(_))));
    }

    #[test]
    fn test_local_providers_need_no_api_key() {
        let mut config = test_config();
        config.model = "ollama/llava".to_string();
        config.api_key = None;
        let client = VisionClient::new(&config).unwrap();
        assert_eq!(client.model(), "llava");
        assert!(!client.requires_api_key);
    }

    #[test]
    fn test_build_request_encodes_data_url() {
        let client = VisionClient::new(&test_config()).unwrap();
        let request = client.build_request(&test_image(), None);

        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.temperature, 0.1);
        let json = serde_json::to_value(&request).unwrap();
        let url = json["messages"][0]["content"][1]["image_url"]["url"]
            .as_str()
            .unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
        assert!(url.ends_with("/9j/4A=="));
    }

    #[test]
    fn test_build_request_honors_model_override() {
        let client = VisionClient::new(&test_config()).unwrap();
        let request = client.build_request(&test_image(), Some("openai/gpt-4o-mini"));
        assert_eq!(request.model, "gpt-4o-mini");
    }

    #[test]
    fn test_classify_auth_statuses() {
        for code in [401u16, 403] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(matches!(
                classify_status(status, "denied", None),
                SnapError::UpstreamAuth(_)
            ));
        }
    }

    #[test]
    fn test_classify_quota_and_not_found() {
        assert!(matches!(
            classify_status(StatusCode::PAYMENT_REQUIRED, "", None),
            SnapError::UpstreamQuota(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, "model does not exist", None),
            SnapError::UpstreamNotFound(_)
        ));
    }

    #[test]
    fn test_classify_429_variants() {
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down", Some(12)),
            SnapError::UpstreamRateLimited {
                retry_after: Some(12)
            }
        ));
        assert!(matches!(
            classify_status(
                StatusCode::TOO_MANY_REQUESTS,
                r#"{"error":{"code":"insufficient_quota"}}"#,
                None
            ),
            SnapError::UpstreamQuota(_)
        ));
    }

    #[test]
    fn test_classify_server_errors() {
        for code in [500u16, 502, 503] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(matches!(
                classify_status(status, "", None),
                SnapError::UpstreamServer(_)
            ));
        }
    }

    #[test]
    fn test_usage_defaults_when_absent() {
        let body = r#"{"model":"gpt-4o","choices":[{"message":{"content":"hi"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.usage.prompt_tokens, 0);
        assert_eq!(parsed.usage.completion_tokens, 0);
    }
}
