//! Parallel Reader Core Library
//!
//! This library provides the reading pipeline behind a bilingual reader:
//! - Sentence streaming from multi-chapter markup
//! - Viewport-driven pagination
//! - Sentence translation via OpenAI-compatible or Gemini APIs
//! - Caching (memory and disk) with request coalescing and prefetch
//! - A navigation controller that ties them together

pub mod buffer;
pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod layout;
pub mod reader;
pub mod scheduler;
pub mod stream;
pub mod text;
pub mod translator;

pub use buffer::ChunkBuffer;
pub use cache::{TranslationCache, TranslationStore, clear_translation_cache};
pub use config::{
    AppConfig, Backend, CacheConfig, Lang, ReaderConfig, TranslatorConfig,
    DEFAULT_SOURCE_LANG, DEFAULT_TARGET_LANG,
};
pub use document::{Chapter, Document};
pub use error::{Error, Result};
pub use layout::{GridViewport, Page, Viewport, compute_layout};
pub use reader::{Position, ReaderController, ReaderState, RenderedPage, RenderedSentence};
pub use scheduler::{SentenceTranslation, TranslationScheduler, TranslationSource};
pub use stream::{Sentence, SentenceStreamer};
pub use translator::{Translator, create_translator};

use std::sync::Arc;
use tracing::debug;

/// Build the scheduler for `config`: its translator backend and its cache.
pub fn build_scheduler(config: &AppConfig) -> Result<Arc<TranslationScheduler>> {
    let translator = create_translator(&config.translator);
    let cache = TranslationCache::new(&config.cache)?;

    debug!(
        "Scheduler ready: {} translator, memory cache {}, disk cache {}",
        translator.name(),
        config.cache.memory_enabled,
        config.cache.disk_enabled
    );

    Ok(Arc::new(TranslationScheduler::new(translator, cache)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_scheduler_without_cache() {
        let mut config = AppConfig::default();
        config.cache.memory_enabled = false;
        config.cache.disk_enabled = false;

        let scheduler = build_scheduler(&config).unwrap();
        assert_eq!(scheduler.translator().name(), "OpenAI Compatible");
        assert!(!scheduler.is_loading());
    }
}
