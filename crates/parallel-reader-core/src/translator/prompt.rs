//! Batch prompt shared by the chat-style backends, and the HTTP retry loop
//! they run it through.

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::config::Lang;
use crate::error::{Error, Result};

/// One-sentence-per-line batch prompt.
pub fn batch_prompt(lines: &[String], target: &Lang) -> String {
    format!(
        "Translate the following sentences into {}.\n\
         Preserve the meaning and keep commas and punctuation where they are whenever possible.\n\
         Return ONLY the translations, one per line, in exactly the same order, \
         with no numbering and no markdown formatting.\n\
         Sentences:\n{}",
        language_name(target),
        lines.join("\n")
    )
}

/// Split a model answer into translated lines, dropping blank ones.
pub fn split_response(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Convert language code to human-readable name for prompts
pub fn language_name(lang: &Lang) -> String {
    let name = match lang.as_str() {
        "en" => "English",
        "pt-BR" => "Brazilian Portuguese",
        "pt-PT" => "European Portuguese",
        "zh-CN" => "Simplified Chinese",
        "zh-TW" => "Traditional Chinese",
        _ => match lang.primary().as_str() {
            "en" => "English",
            "ja" => "Japanese",
            "ko" => "Korean",
            "zh" => "Chinese",
            "es" => "Spanish",
            "fr" => "French",
            "de" => "German",
            "it" => "Italian",
            "pt" => "Portuguese",
            "ru" => "Russian",
            "ar" => "Arabic",
            "hi" => "Hindi",
            "th" => "Thai",
            "vi" => "Vietnamese",
            // The model still understands most BCP 47 codes
            _ => return format!("the language with code {lang}"),
        },
    };
    name.to_string()
}

/// Attempt count and pause between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay_ms: u64) -> Self {
        Self {
            attempts: attempts.max(1),
            delay: Duration::from_millis(delay_ms),
        }
    }
}

/// Send the request built by `build` until a 2xx answer parses as `R`.
///
/// 429 responses wait for `retry-after` (5 s when absent); other failures
/// wait `policy.delay`. The last error is returned when attempts run out.
pub async fn post_with_retry<R, B>(client: &Client, policy: RetryPolicy, url: &str, build: B) -> Result<R>
where
    R: DeserializeOwned,
    B: Fn(&Client) -> RequestBuilder,
{
    let mut last_error = None;

    for attempt in 0..policy.attempts {
        debug!(
            "Translation request attempt {}/{} to {}",
            attempt + 1,
            policy.attempts,
            url
        );

        match build(client).send().await {
            Ok(response) => {
                if response.status().is_success() {
                    match response.json::<R>().await {
                        Ok(parsed) => return Ok(parsed),
                        Err(e) => {
                            warn!("Failed to parse response: {}", e);
                            last_error = Some(Error::TranslationInvalidResponse(e.to_string()));
                        }
                    }
                } else if response.status().as_u16() == 429 {
                    let retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse().ok());

                    warn!("Rate limited, retry after {:?}s", retry_after);
                    last_error = Some(Error::TranslationRateLimited { retry_after });

                    if attempt + 1 < policy.attempts {
                        let wait_time = retry_after.unwrap_or(5) * 1000;
                        tokio::time::sleep(Duration::from_millis(wait_time)).await;
                    }
                    continue;
                } else {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    warn!("API error: {} - {}", status, body);
                    last_error = Some(Error::TranslationRequest(format!("HTTP {status}: {body}")));
                }
            }
            Err(e) => {
                warn!("Request failed: {}", e);
                if e.is_timeout() {
                    last_error = Some(Error::TranslationTimeout);
                } else {
                    last_error = Some(Error::TranslationRequest(e.to_string()));
                }
            }
        }

        // Wait before retry
        if attempt + 1 < policy.attempts {
            tokio::time::sleep(policy.delay).await;
        }
    }

    error!("Translation failed after {} attempts", policy.attempts);
    Err(last_error.unwrap_or(Error::TranslationMaxRetriesExceeded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_name() {
        assert_eq!(language_name(&Lang::new("en")), "English");
        assert_eq!(language_name(&Lang::new("pt-BR")), "Brazilian Portuguese");
        assert_eq!(language_name(&Lang::new("fr-CA")), "French");
        assert_eq!(language_name(&Lang::new("xx")), "the language with code xx");
    }

    #[test]
    fn test_prompt_lists_one_sentence_per_line() {
        let lines = vec!["Hello!".to_string(), "How are you?".to_string()];
        let prompt = batch_prompt(&lines, &Lang::new("fr"));
        assert!(prompt.contains("into French"));
        assert!(prompt.contains("one per line"));
        assert!(prompt.ends_with("Sentences:\nHello!\nHow are you?"));
    }

    #[test]
    fn test_split_response_drops_blank_lines() {
        assert_eq!(
            split_response("  Olá!\n\n Como vai?  \r\n\n"),
            vec!["Olá!".to_string(), "Como vai?".to_string()]
        );
        assert!(split_response("").is_empty());
    }

    #[test]
    fn test_retry_policy_has_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, 10).attempts, 1);
        assert_eq!(RetryPolicy::new(3, 250).delay, Duration::from_millis(250));
    }
}
