use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::config::{Lang, TranslatorConfig};
use crate::error::{Error, Result};
use super::prompt::{RetryPolicy, batch_prompt, post_with_retry, split_response};
use super::traits::{Translator, TranslatorInfo};

/// Public Gemini endpoint, used when `api_base` is left at its default
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Model used when `model` is left at its default
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Google Gemini `generateContent` translator. Requires an API key.
pub struct GeminiTranslator {
    client: Client,
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

impl GeminiTranslator {
    /// Create a translator from the backend configuration. Settings still at
    /// their OpenAI-oriented defaults are replaced by Gemini's.
    ///
    /// # Panics
    /// Panics if the HTTP client cannot be created, which should only happen
    /// in extreme circumstances (e.g., TLS backend unavailable on the system).
    #[allow(clippy::expect_used)]
    pub fn new(config: &TranslatorConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        let defaults = TranslatorConfig::default();
        let api_base = if config.api_base == defaults.api_base {
            GEMINI_API_BASE.to_string()
        } else {
            config.api_base.clone()
        };
        let model = if config.model == defaults.model {
            GEMINI_DEFAULT_MODEL.to_string()
        } else {
            config.model.clone()
        };

        Self {
            client,
            api_base,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            model,
            retry: RetryPolicy::new(config.retry_count, config.retry_delay_ms),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        )
    }

    fn request(lines: &[String], target: &Lang) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: batch_prompt(lines, target),
                }],
            }],
        }
    }
}

/// Text of the first part of the first candidate, empty when absent.
fn first_candidate_text(response: &GenerateResponse) -> &str {
    response
        .candidates
        .first()
        .and_then(|c| c.content.parts.first())
        .map_or("", |p| p.text.as_str())
}

#[async_trait]
impl Translator for GeminiTranslator {
    fn info(&self) -> TranslatorInfo {
        TranslatorInfo {
            name: "Gemini",
            requires_api_key: true,
        }
    }

    async fn translate_batch(&self, lines: &[String], target: &Lang) -> Result<Vec<String>> {
        let Some(ref key) = self.api_key else {
            return Err(Error::TranslationMissingApiKey);
        };

        if lines.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.endpoint();
        let request = Self::request(lines, target);

        info!("Translating {} sentences into {} via {}", lines.len(), target, self.model);

        let response: GenerateResponse = post_with_retry(&self.client, self.retry, &url, |client| {
            client.post(&url).header("x-goog-api-key", key).json(&request)
        })
        .await?;

        Ok(split_response(first_candidate_text(&response)))
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(key: Option<&str>) -> TranslatorConfig {
        TranslatorConfig {
            api_key: key.map(str::to_string),
            ..TranslatorConfig::default()
        }
    }

    #[test]
    fn test_defaults_point_at_gemini() {
        let translator = GeminiTranslator::new(&config(Some("k")));
        assert_eq!(
            translator.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_availability_follows_key() {
        assert!(GeminiTranslator::new(&config(Some("k"))).is_available());
        assert!(!GeminiTranslator::new(&config(None)).is_available());
        assert!(!GeminiTranslator::new(&config(Some("  "))).is_available());
    }

    #[tokio::test]
    async fn test_missing_key_is_reported() {
        let translator = GeminiTranslator::new(&config(None));
        let err = translator
            .translate_batch(&["Hi.".to_string()], &Lang::new("fr"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TranslationMissingApiKey));
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Olá!\nComo vai?\n"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(split_response(first_candidate_text(&parsed)), vec!["Olá!", "Como vai?"]);

        let empty: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(first_candidate_text(&empty), "");
    }
}
