use async_trait::async_trait;
use sled::Db;
use std::path::Path;
use tracing::{debug, warn};

use super::{CacheEntry, CacheKey, TranslationStore};
use crate::error::{Error, Result};

/// Disk-based sentence cache using sled.
///
/// Rows are JSON `{original, translated, lang}` stored under the MD5 of the
/// original text.
pub struct DiskCache {
    db: Db,
}

impl DiskCache {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::CacheInit(format!(
                    "Failed to create cache directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let db = sled::open(path).map_err(|e| {
            let err_str = e.to_string();
            // Detect lock errors and provide actionable fix
            if err_str.contains("WouldBlock") || err_str.contains("lock") {
                Error::CacheInit(format!(
                    "Cache locked at {}\n\n\
                    Another reader is using the cache, or a previous instance crashed.\n\
                    To fix: rm {}/db/LOCK",
                    path.display(),
                    path.display()
                ))
            } else {
                Error::CacheInit(format!("Failed to open cache at {}: {}", path.display(), e))
            }
        })?;

        debug!("Opened disk cache at {}", path.display());

        Ok(Self { db })
    }

    pub fn get(&self, original: &str) -> Result<Option<CacheEntry>> {
        let key = CacheKey::for_sentence(original);
        let Some(bytes) = self
            .db
            .get(key.as_str().as_bytes())
            .map_err(|e| Error::CacheRead(e.to_string()))?
        else {
            return Ok(None);
        };

        let entry: CacheEntry = serde_json::from_slice(&bytes)
            .map_err(|e| Error::CacheRead(format!("corrupt row {key}: {e}")))?;

        // A hash collision must not serve another sentence's translation
        if entry.original != original {
            warn!("Cache key {} holds a different sentence, ignoring", key);
            return Ok(None);
        }

        Ok(Some(entry))
    }

    pub fn insert(&self, entry: &CacheEntry) -> Result<()> {
        let key = CacheKey::for_sentence(&entry.original);
        let value = serde_json::to_vec(entry).map_err(|e| Error::CacheWrite(e.to_string()))?;

        self.db
            .insert(key.as_str().as_bytes(), value)
            .map_err(|e| Error::CacheWrite(e.to_string()))?;

        self.db
            .flush()
            .map_err(|e| Error::CacheWrite(format!("Flush failed: {e}")))?;

        Ok(())
    }

    /// Remove every row; returns how many there were.
    pub fn clear(&self) -> Result<usize> {
        let count = self.db.len();
        self.db.clear().map_err(|e| Error::CacheWrite(e.to_string()))?;
        self.db
            .flush()
            .map_err(|e| Error::CacheWrite(format!("Flush failed: {e}")))?;
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}

#[async_trait]
impl TranslationStore for DiskCache {
    async fn load(&self, original: &str) -> Result<Option<CacheEntry>> {
        self.get(original)
    }

    async fn store(&self, entry: CacheEntry) -> Result<()> {
        self.insert(&entry)
    }

    async fn clear(&self) -> Result<()> {
        DiskCache::clear(self).map(|_| ())
    }
}

/// Clear the on-disk sentence cache at `path` (the default location when
/// `None`). Returns the number of rows removed.
pub fn clear_translation_cache(path: Option<&Path>) -> Result<usize> {
    let path = path.map_or_else(crate::config::default_cache_path, Path::to_path_buf);

    if !path.exists() {
        return Ok(0);
    }

    DiskCache::new(&path)?.clear()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Lang;

    fn entry(original: &str, translated: &str, lang: &str) -> CacheEntry {
        CacheEntry {
            original: original.to_string(),
            translated: translated.to_string(),
            lang: Lang::new(lang),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("db")).unwrap();

        cache.insert(&entry("Hello.", "Olá.", "pt-BR")).unwrap();
        assert_eq!(cache.get("Hello.").unwrap(), Some(entry("Hello.", "Olá.", "pt-BR")));
        assert_eq!(cache.get("Bye.").unwrap(), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("db")).unwrap();

        cache.insert(&entry("Hello.", "Olá.", "pt-BR")).unwrap();
        cache.insert(&entry("Hello.", "Bonjour.", "fr")).unwrap();
        assert_eq!(cache.get("Hello.").unwrap(), Some(entry("Hello.", "Bonjour.", "fr")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_colliding_row_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("db")).unwrap();

        // Plant a row for another sentence under this sentence's key
        let key = CacheKey::for_sentence("Hello.");
        let row = serde_json::to_vec(&entry("Other.", "Outro.", "pt-BR")).unwrap();
        cache.db.insert(key.as_str().as_bytes(), row).unwrap();

        assert_eq!(cache.get("Hello.").unwrap(), None);
    }

    #[test]
    fn test_corrupt_row_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("db")).unwrap();

        let key = CacheKey::for_sentence("Hello.");
        cache.db.insert(key.as_str().as_bytes(), b"not json".to_vec()).unwrap();

        assert!(matches!(cache.get("Hello."), Err(Error::CacheRead(_))));
    }

    #[test]
    fn test_clear_translation_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        {
            let cache = DiskCache::new(&path).unwrap();
            cache.insert(&entry("A.", "B.", "fr")).unwrap();
            cache.insert(&entry("C.", "D.", "fr")).unwrap();
            assert_eq!(cache.clear().unwrap(), 2);
            assert!(cache.is_empty());
        }
        assert_eq!(clear_translation_cache(Some(&dir.path().join("absent"))).unwrap(), 0);
    }
}
