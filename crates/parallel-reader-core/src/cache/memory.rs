use async_trait::async_trait;
use moka::future::Cache;
use std::time::Duration;

use super::{CacheEntry, TranslationStore};
use crate::error::Result;

/// In-memory sentence cache using moka, bounded by entry count.
#[derive(Clone)]
pub struct MemoryCache {
    cache: Cache<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new(max_entries: u64, ttl_seconds: u64) -> Self {
        let mut builder = Cache::builder().max_capacity(max_entries);

        if ttl_seconds > 0 {
            builder = builder.time_to_live(Duration::from_secs(ttl_seconds));
        }

        Self {
            cache: builder.build(),
        }
    }

    pub async fn get(&self, original: &str) -> Option<CacheEntry> {
        self.cache.get(original).await
    }

    pub async fn insert(&self, entry: CacheEntry) {
        self.cache.insert(entry.original.clone(), entry).await;
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

#[async_trait]
impl TranslationStore for MemoryCache {
    async fn load(&self, original: &str) -> Result<Option<CacheEntry>> {
        Ok(self.get(original).await)
    }

    async fn store(&self, entry: CacheEntry) -> Result<()> {
        self.insert(entry).await;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        MemoryCache::clear(self);
        Ok(())
    }
}
