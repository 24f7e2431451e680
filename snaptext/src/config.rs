use serde::Deserialize;
use std::env;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_env_opt<T: std::str::FromStr>(var: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Ignoring.", val, var, e);
                None
            }
        },
        Err(_) => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub vision: VisionConfig,
    pub image: ImageConfig,
    pub rate_limit: RateLimitConfig,
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub auth_token: Option<String>,
}

/// Configuration for the upstream vision-capable chat model.
///
/// `model` uses `provider/model` notation (e.g. `openai/gpt-4o`,
/// `openrouter/anthropic/claude-sonnet-4`). `base_url` overrides the
/// provider default for self-hosted or proxy setups.
#[derive(Debug, Clone, Deserialize)]
pub struct VisionConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_output_tokens: u32,
    pub temperature: f32,
    /// Total attempts for one extraction call (first try included).
    pub max_attempts: u32,
    /// Unit for the exponential backoff between attempts. Production keeps
    /// the 1000ms default; tests dial it down to single milliseconds.
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    /// Target size for the buffer sent upstream. Larger inputs are
    /// recompressed best-effort.
    pub max_bytes: usize,
    pub max_dimension: u32,
    /// JPEG quality for the first compression pass.
    pub quality: u8,
    /// Hard cap on the uploaded file itself.
    pub upload_max_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
    pub sweep_interval_secs: u64,
}

/// Weights for the heuristic confidence estimator. The defaults are a
/// reference point, not ground truth, so they stay tunable per deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    pub base_score: f32,
    pub length_bonus: f32,
    pub letters_bonus: f32,
    pub digits_bonus: f32,
    pub punctuation_bonus: f32,
    pub garbled_penalty: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_score: 80.0,
            length_bonus: 5.0,
            letters_bonus: 5.0,
            digits_bonus: 2.0,
            punctuation_bonus: 3.0,
            garbled_penalty: 10.0,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_bytes: 4 * 1024 * 1024,
            max_dimension: 2048,
            quality: 85,
            upload_max_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_secs: 60,
            sweep_interval_secs: 300,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let image_defaults = ImageConfig::default();
        let rate_defaults = RateLimitConfig::default();
        let scoring_defaults = ScoringConfig::default();

        Self {
            server: ServerConfig {
                host: env::var("SNAPTEXT_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("SNAPTEXT_PORT", 3000),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| "file:snaptext.db".to_string()),
                auth_token: parse_env_opt("DATABASE_AUTH_TOKEN"),
            },
            vision: VisionConfig {
                model: env::var("VISION_MODEL").unwrap_or_else(|_| "openai/gpt-4o".to_string()),
                api_key: parse_env_opt("VISION_API_KEY"),
                base_url: parse_env_opt("VISION_BASE_URL"),
                timeout_secs: parse_env_or("VISION_TIMEOUT_SECS", 60),
                max_output_tokens: parse_env_or("VISION_MAX_OUTPUT_TOKENS", 4096),
                temperature: parse_env_or("VISION_TEMPERATURE", 0.1),
                max_attempts: parse_env_or("VISION_MAX_ATTEMPTS", 3),
                retry_base_delay_ms: parse_env_or("VISION_RETRY_BASE_DELAY_MS", 1000),
            },
            image: ImageConfig {
                max_bytes: parse_env_or("IMAGE_MAX_BYTES", image_defaults.max_bytes),
                max_dimension: parse_env_or("IMAGE_MAX_DIMENSION", image_defaults.max_dimension),
                quality: parse_env_or("IMAGE_QUALITY", image_defaults.quality),
                upload_max_bytes: parse_env_or(
                    "UPLOAD_MAX_BYTES",
                    image_defaults.upload_max_bytes,
                ),
            },
            rate_limit: RateLimitConfig {
                max_requests: parse_env_or("RATE_LIMIT_MAX_REQUESTS", rate_defaults.max_requests),
                window_secs: parse_env_or("RATE_LIMIT_WINDOW_SECS", rate_defaults.window_secs),
                sweep_interval_secs: parse_env_or(
                    "RATE_LIMIT_SWEEP_SECS",
                    rate_defaults.sweep_interval_secs,
                ),
            },
            scoring: ScoringConfig {
                base_score: parse_env_or("CONFIDENCE_BASE_SCORE", scoring_defaults.base_score),
                length_bonus: parse_env_or(
                    "CONFIDENCE_LENGTH_BONUS",
                    scoring_defaults.length_bonus,
                ),
                letters_bonus: parse_env_or(
                    "CONFIDENCE_LETTERS_BONUS",
                    scoring_defaults.letters_bonus,
                ),
                digits_bonus: parse_env_or(
                    "CONFIDENCE_DIGITS_BONUS",
                    scoring_defaults.digits_bonus,
                ),
                punctuation_bonus: parse_env_or(
                    "CONFIDENCE_PUNCTUATION_BONUS",
                    scoring_defaults.punctuation_bonus,
                ),
                garbled_penalty: parse_env_or(
                    "CONFIDENCE_GARBLED_PENALTY",
                    scoring_defaults.garbled_penalty,
                ),
            },
        }
    }
}

/// Split a `provider/model` string into its provider prefix and model id.
/// Strings without a `/` are treated as an OpenAI model id.
pub fn parse_vision_provider_model(model: &str) -> (&str, &str) {
    match model.split_once('/') {
        Some((provider, rest)) => (provider, rest),
        None => ("openai", model),
    }
}
