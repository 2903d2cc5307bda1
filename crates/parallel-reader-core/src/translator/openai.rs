use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::config::{Lang, TranslatorConfig};
use crate::error::{Error, Result};
use super::prompt::{RetryPolicy, batch_prompt, post_with_retry, split_response};
use super::traits::{Translator, TranslatorInfo};

/// OpenAI-compatible API translator
/// Works with: llama.cpp server, Ollama, DeepSeek, OpenAI, etc.
pub struct OpenAiTranslator {
    client: Client,
    /// Base URL for the API (e.g., "http://localhost:8080/v1")
    pub api_base: String,
    /// Optional API key for authentication
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OpenAiTranslator {
    /// Create a translator from the backend configuration.
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

        Self {
            client,
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            retry: RetryPolicy::new(config.retry_count, config.retry_delay_ms),
        }
    }

    fn request(&self, lines: &[String], target: &Lang) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: batch_prompt(lines, target),
            }],
            temperature: Some(0.3), // Lower temperature for more consistent translations
        }
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    fn info(&self) -> TranslatorInfo {
        TranslatorInfo {
            name: "OpenAI Compatible",
            requires_api_key: false, // Optional for local servers
        }
    }

    async fn translate_batch(&self, lines: &[String], target: &Lang) -> Result<Vec<String>> {
        if lines.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
        let request = self.request(lines, target);

        info!("Translating {} sentences into {} via {}", lines.len(), target, self.model);

        let response: ChatResponse = post_with_retry(&self.client, self.retry, &url, |client| {
            let req = client.post(&url).json(&request);
            match self.api_key {
                Some(ref key) => req.header("Authorization", format!("Bearer {key}")),
                None => req,
            }
        })
        .await?;

        let content = response
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or_else(|| Error::TranslationInvalidResponse("No choices in response".to_string()))?;

        Ok(split_response(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let translator = OpenAiTranslator::new(&TranslatorConfig::default());
        let body = serde_json::to_value(translator.request(&["Hi.".to_string()], &Lang::new("fr"))).unwrap();

        assert_eq!(body["model"], "default_model");
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(body["messages"][0]["content"].as_str().unwrap().ends_with("Hi."));
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"Salut.\nÇa va?"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(split_response(&parsed.choices[0].message.content), vec!["Salut.", "Ça va?"]);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_network() {
        let translator = OpenAiTranslator::new(&TranslatorConfig::default());
        assert!(translator.translate_batch(&[], &Lang::new("fr")).await.unwrap().is_empty());
    }
}
