use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Language codes following BCP 47 (e.g. "en", "pt-BR", "zh-CN")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lang(pub String);

impl Lang {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Primary language subtag, lowercased ("pt-BR" -> "pt").
    pub fn primary(&self) -> String {
        self.0
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase()
    }
}

// Serde default functions for common languages
fn default_source_lang() -> Lang {
    Lang::new(DEFAULT_SOURCE_LANG)
}

fn default_target_lang() -> Lang {
    Lang::new(DEFAULT_TARGET_LANG)
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Lang {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Lang {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Which remote API the translator talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// OpenAI-compatible chat completions (llama.cpp, Ollama, DeepSeek, OpenAI, ...)
    #[default]
    OpenAi,
    /// Google Gemini `generateContent`
    Gemini,
}

impl std::str::FromStr for Backend {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" | "open-ai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            other => Err(crate::error::Error::ConfigInvalid {
                field: "translator.backend".to_string(),
                reason: format!("unknown backend '{other}'"),
            }),
        }
    }
}

/// Translator backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Attempts per batch; 1 means no transport-level retry
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl TranslatorConfig {
    /// Create a new translator config
    pub fn new(
        backend: Backend,
        api_base: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            api_base: api_base.into(),
            api_key,
            model: model.into(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_base() -> String {
    "http://localhost:8080/v1".to_string()
}

fn default_model() -> String {
    "default_model".to_string()
}

const fn default_retry_count() -> u32 {
    1
}

const fn default_retry_delay_ms() -> u64 {
    1000
}

const fn default_timeout_secs() -> u64 {
    60
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self::new(Backend::default(), default_api_base(), None, default_model())
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable memory cache
    #[serde(default = "default_true")]
    pub memory_enabled: bool,

    /// Maximum memory cache entries
    #[serde(default = "default_memory_max_entries")]
    pub memory_max_entries: u64,

    /// Memory cache TTL in seconds (0 = no expiry)
    #[serde(default)]
    pub memory_ttl_seconds: u64,

    /// Enable disk cache
    #[serde(default = "default_true")]
    pub disk_enabled: bool,

    /// Disk cache directory (defaults to $XDG_CACHE_HOME/parallel-reader)
    #[serde(default)]
    pub disk_path: Option<PathBuf>,
}

const fn default_true() -> bool {
    true
}

const fn default_memory_max_entries() -> u64 {
    10_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_enabled: true,
            memory_max_entries: default_memory_max_entries(),
            memory_ttl_seconds: 0,
            disk_enabled: true,
            disk_path: None,
        }
    }
}

/// Pagination and prefetch tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Sentences pulled from the streamer per buffer growth
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Upcoming pages warmed in the background
    #[serde(default = "default_prefetch_window")]
    pub prefetch_window: usize,

    /// Pause before each background translation request
    #[serde(default = "default_prefetch_delay_ms")]
    pub prefetch_delay_ms: u64,

    /// Complete pages kept buffered ahead of the current one
    #[serde(default = "default_lookahead_pages")]
    pub lookahead_pages: usize,

    /// Space added below every sentence, in viewport units
    #[serde(default = "default_sentence_margin")]
    pub sentence_margin: f32,

    /// Page size used when measurement is unusable
    #[serde(default = "default_fallback_sentences_per_page")]
    pub fallback_sentences_per_page: usize,
}

const fn default_chunk_size() -> usize {
    50
}

const fn default_prefetch_window() -> usize {
    3
}

const fn default_prefetch_delay_ms() -> u64 {
    1000
}

const fn default_lookahead_pages() -> usize {
    1
}

const fn default_sentence_margin() -> f32 {
    10.0
}

const fn default_fallback_sentences_per_page() -> usize {
    10
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            prefetch_window: default_prefetch_window(),
            prefetch_delay_ms: default_prefetch_delay_ms(),
            lookahead_pages: default_lookahead_pages(),
            sentence_margin: default_sentence_margin(),
            fallback_sentences_per_page: default_fallback_sentences_per_page(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Language of the book, drives sentence segmentation
    #[serde(default = "default_source_lang")]
    pub source_lang: Lang,

    /// Translation target language
    #[serde(default = "default_target_lang")]
    pub target_lang: Lang,

    /// Translator backend configuration
    #[serde(default)]
    pub translator: TranslatorConfig,

    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Pagination and prefetch tuning
    #[serde(default)]
    pub reader: ReaderConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_lang: default_source_lang(),
            target_lang: default_target_lang(),
            translator: TranslatorConfig::default(),
            cache: CacheConfig::default(),
            reader: ReaderConfig::default(),
        }
    }
}

/// Prefix for environment overrides, e.g. `PARALLEL_READER__TARGET_LANG=fr`
pub const ENV_PREFIX: &str = "PARALLEL_READER";

impl AppConfig {
    /// Load configuration from a single TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, crate::error::Error> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            crate::error::Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        toml::from_str(&content).map_err(|e| {
            crate::error::Error::ConfigLoad(format!("Failed to parse config: {e}"))
        })
    }

    /// Layer the given files (later wins) and `PARALLEL_READER__*` env vars.
    ///
    /// Missing files are skipped.
    pub fn from_sources(files: &[PathBuf]) -> Result<Self, crate::error::Error> {
        let mut builder = config::Config::builder();
        for file in files {
            builder = builder.add_source(
                config::File::from(file.clone())
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(config::Config::try_deserialize::<Self>)
            .map_err(|e| crate::error::Error::ConfigLoad(e.to_string()))
    }

    /// Load from default locations (~/.config/parallel-reader/config.toml,
    /// ./config.toml) plus environment overrides
    pub fn load() -> Self {
        let mut files = Vec::new();
        if let Some(config_dir) = xdg_dir("XDG_CONFIG_HOME", ".config") {
            files.push(config_dir.join("parallel-reader").join("config.toml"));
        }
        files.push(PathBuf::from("config.toml"));

        match Self::from_sources(&files) {
            Ok(config) => {
                tracing::debug!("Loaded config from {:?} and environment", files);
                config
            }
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Reject values the reader cannot work with.
    pub fn validate(&self) -> Result<(), crate::error::Error> {
        if self.reader.chunk_size == 0 {
            return Err(crate::error::Error::ConfigInvalid {
                field: "reader.chunk_size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.reader.fallback_sentences_per_page == 0 {
            return Err(crate::error::Error::ConfigInvalid {
                field: "reader.fallback_sentences_per_page".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.reader.sentence_margin.is_finite() || self.reader.sentence_margin < 0.0 {
            return Err(crate::error::Error::ConfigInvalid {
                field: "reader.sentence_margin".to_string(),
                reason: "must be a non-negative number".to_string(),
            });
        }
        if self.translator.retry_count == 0 {
            return Err(crate::error::Error::ConfigInvalid {
                field: "translator.retry_count".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// `$<var>` if set, otherwise `$HOME/<home_fallback>`.
fn xdg_dir(var: &str, home_fallback: &str) -> Option<PathBuf> {
    std::env::var_os(var)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(home_fallback)))
}

/// Where the sentence cache lives when `cache.disk_path` is unset.
pub fn default_cache_path() -> PathBuf {
    xdg_dir("XDG_CACHE_HOME", ".cache")
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("parallel-reader")
}

/// Default segmentation language code
pub const DEFAULT_SOURCE_LANG: &str = "en";
/// Default target language code
pub const DEFAULT_TARGET_LANG: &str = "pt-BR";
