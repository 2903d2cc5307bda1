//! Persistent sentence translation cache.
//!
//! One row per source sentence. A row remembers the language it was
//! translated into, so a lookup for any other language is a miss, and the
//! most recent write for a sentence wins.

mod disk;
mod key;
mod memory;

pub use disk::{DiskCache, clear_translation_cache};
pub use key::CacheKey;
pub use memory::MemoryCache;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{CacheConfig, Lang, default_cache_path};
use crate::error::Result;

/// A stored translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub original: String,
    pub translated: String,
    pub lang: Lang,
}

/// Raw storage behind [`TranslationCache`]. Errors are surfaced here and
/// swallowed by the facade.
#[async_trait]
pub trait TranslationStore: Send + Sync {
    async fn load(&self, original: &str) -> Result<Option<CacheEntry>>;

    async fn store(&self, entry: CacheEntry) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// Memory layer in front of a disk layer, either of which may be disabled.
pub struct TieredStore {
    memory: Option<MemoryCache>,
    disk: Option<DiskCache>,
}

impl TieredStore {
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let memory = if config.memory_enabled {
            Some(MemoryCache::new(
                config.memory_max_entries,
                config.memory_ttl_seconds,
            ))
        } else {
            None
        };

        let disk = if config.disk_enabled {
            let path = config.disk_path.clone().unwrap_or_else(default_cache_path);
            Some(DiskCache::new(path)?)
        } else {
            None
        };

        Ok(Self { memory, disk })
    }
}

#[async_trait]
impl TranslationStore for TieredStore {
    async fn load(&self, original: &str) -> Result<Option<CacheEntry>> {
        if let Some(ref memory) = self.memory
            && let Some(entry) = memory.get(original).await
        {
            return Ok(Some(entry));
        }

        if let Some(ref disk) = self.disk
            && let Some(entry) = disk.get(original)?
        {
            // Populate memory cache on disk hit
            if let Some(ref memory) = self.memory {
                memory.insert(entry.clone()).await;
            }
            return Ok(Some(entry));
        }

        Ok(None)
    }

    async fn store(&self, entry: CacheEntry) -> Result<()> {
        if let Some(ref disk) = self.disk {
            disk.insert(&entry)?;
        }

        if let Some(ref memory) = self.memory {
            memory.insert(entry).await;
        }

        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        if let Some(ref memory) = self.memory {
            memory.clear();
        }

        if let Some(ref disk) = self.disk {
            disk.clear()?;
        }

        Ok(())
    }
}

/// Language-aware, best-effort view of a [`TranslationStore`].
///
/// Never fails: storage errors are logged and read as misses.
#[derive(Clone)]
pub struct TranslationCache {
    store: Arc<dyn TranslationStore>,
}

impl TranslationCache {
    /// Build the configured memory/disk layers
    pub fn new(config: &CacheConfig) -> Result<Self> {
        Ok(Self::with_store(Arc::new(TieredStore::new(config)?)))
    }

    /// Memory-only cache, nothing touches disk
    pub fn in_memory(max_entries: u64) -> Self {
        Self::with_store(Arc::new(MemoryCache::new(max_entries, 0)))
    }

    pub fn with_store(store: Arc<dyn TranslationStore>) -> Self {
        Self { store }
    }

    /// Translation of `original` into `lang`, if one is stored.
    pub async fn get(&self, original: &str, lang: &Lang) -> Option<String> {
        match self.store.load(original).await {
            Ok(Some(entry)) if entry.lang == *lang => Some(entry.translated),
            Ok(Some(entry)) => {
                debug!("Cached row is {} not {}, treating as miss", entry.lang, lang);
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Cache read failed, treating as miss: {}", e);
                None
            }
        }
    }

    /// Record a translation, replacing whatever the sentence had before.
    pub async fn put(&self, original: &str, translated: &str, lang: &Lang) {
        let entry = CacheEntry {
            original: original.to_string(),
            translated: translated.to_string(),
            lang: lang.clone(),
        };

        if let Err(e) = self.store.store(entry).await {
            warn!("Cache write failed, translation not persisted: {}", e);
        }
    }

    pub async fn contains(&self, original: &str, lang: &Lang) -> bool {
        self.get(original, lang).await.is_some()
    }

    pub async fn clear(&self) {
        if let Err(e) = self.store.clear().await {
            warn!("Failed to clear cache: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct BrokenStore;

    #[async_trait]
    impl TranslationStore for BrokenStore {
        async fn load(&self, _original: &str) -> Result<Option<CacheEntry>> {
            Err(Error::CacheRead("disk gone".to_string()))
        }

        async fn store(&self, _entry: CacheEntry) -> Result<()> {
            Err(Error::CacheWrite("disk gone".to_string()))
        }

        async fn clear(&self) -> Result<()> {
            Err(Error::CacheWrite("disk gone".to_string()))
        }
    }

    #[tokio::test]
    async fn test_hit_only_for_stored_language() {
        let cache = TranslationCache::in_memory(100);
        let pt = Lang::new("pt-BR");

        cache.put("Hello.", "Olá.", &pt).await;
        assert_eq!(cache.get("Hello.", &pt).await.as_deref(), Some("Olá."));
        assert_eq!(cache.get("Hello.", &Lang::new("fr")).await, None);
        assert_eq!(cache.get("Bye.", &pt).await, None);
    }

    #[tokio::test]
    async fn test_new_language_replaces_row() {
        let cache = TranslationCache::in_memory(100);
        cache.put("Hello.", "Olá.", &Lang::new("pt-BR")).await;
        cache.put("Hello.", "Bonjour.", &Lang::new("fr")).await;

        assert!(cache.contains("Hello.", &Lang::new("fr")).await);
        assert!(!cache.contains("Hello.", &Lang::new("pt-BR")).await);
    }

    #[tokio::test]
    async fn test_store_errors_are_swallowed() {
        let cache = TranslationCache::with_store(Arc::new(BrokenStore));
        let fr = Lang::new("fr");

        cache.put("Hello.", "Bonjour.", &fr).await;
        assert_eq!(cache.get("Hello.", &fr).await, None);
        cache.clear().await;
    }

    #[tokio::test]
    async fn test_tiered_store_reads_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            disk_path: Some(dir.path().join("db")),
            ..CacheConfig::default()
        };
        let fr = Lang::new("fr");
        let store = TieredStore::new(&config).unwrap();

        store
            .disk
            .as_ref()
            .unwrap()
            .insert(&CacheEntry {
                original: "Thanks.".to_string(),
                translated: "Merci.".to_string(),
                lang: fr.clone(),
            })
            .unwrap();

        let cache = TranslationCache::with_store(Arc::new(store));
        assert_eq!(cache.get("Thanks.", &fr).await.as_deref(), Some("Merci."));

        cache.clear().await;
        assert_eq!(cache.get("Thanks.", &fr).await, None);
    }

    #[tokio::test]
    async fn test_disabled_layers_always_miss() {
        let config = CacheConfig {
            memory_enabled: false,
            disk_enabled: false,
            ..CacheConfig::default()
        };
        let cache = TranslationCache::new(&config).unwrap();
        cache.put("Hello.", "Olá.", &Lang::new("pt-BR")).await;
        assert!(!cache.contains("Hello.", &Lang::new("pt-BR")).await);
    }
}
