mod gemini;
mod openai;
mod prompt;
mod traits;

pub use gemini::GeminiTranslator;
pub use openai::OpenAiTranslator;
pub use prompt::{batch_prompt, language_name};
pub use traits::{Translator, TranslatorInfo};

use crate::config::{Backend, TranslatorConfig};
use std::sync::Arc;
use tracing::debug;

/// Create a translator from configuration
pub fn create_translator(config: &TranslatorConfig) -> Arc<dyn Translator> {
    debug!("Creating {:?} translator for {}", config.backend, config.api_base);

    match config.backend {
        Backend::OpenAi => Arc::new(OpenAiTranslator::new(config)),
        Backend::Gemini => Arc::new(GeminiTranslator::new(config)),
    }
}
