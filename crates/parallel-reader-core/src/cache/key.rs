/// On-disk key for a sentence's translation row.
///
/// Sentences can be arbitrarily long, so the disk layer stores them under the
/// MD5 of the normalized text. Keys are opaque, fixed-length (32 hex chars)
/// and independent of the target language: one row per sentence, with the
/// language kept in the row itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    hash: String,
}

impl CacheKey {
    pub fn for_sentence(original: &str) -> Self {
        Self {
            hash: format!("{:x}", md5::compute(original.as_bytes())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_fixed_length_hash() {
        let k = CacheKey::for_sentence("Hello world.");
        assert_eq!(k.as_str().len(), 32);
        assert!(k.as_str().chars().all(|c| c.is_ascii_hexdigit()));

        let long = "word ".repeat(2000);
        assert_eq!(CacheKey::for_sentence(&long).as_str().len(), 32);
    }

    #[test]
    fn test_key_depends_only_on_text() {
        assert_eq!(CacheKey::for_sentence("Thanks."), CacheKey::for_sentence("Thanks."));
        assert_ne!(CacheKey::for_sentence("Thanks."), CacheKey::for_sentence("Thanks!"));
    }
}
