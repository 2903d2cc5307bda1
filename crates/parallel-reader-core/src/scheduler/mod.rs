//! Fetch-or-serve translation for pages of sentences.
//!
//! Cached sentences resolve immediately. Misses go to the translator in one
//! batch per page, and a sentence that is already being translated for the
//! same language is never requested again: the second loader joins the
//! first loader's batch and reuses its outcome.
//!
//! Batches run as detached tasks, so a result still lands in the cache when
//! the page that asked for it has already been left.

mod prefetch;

pub use prefetch::Prefetcher;

use futures::future::{BoxFuture, FutureExt, Shared, join_all};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::TranslationCache;
use crate::config::Lang;
use crate::error::Error;
use crate::translator::Translator;

/// Prefix shown in place of a translation the backend failed to produce
pub const FAILED_PLACEHOLDER: &str = "[Translation failed]";
/// Prefix shown when no translation backend is configured
pub const UNAVAILABLE_PLACEHOLDER: &str = "[Translation unavailable - key not configured]";

/// Where a sentence's displayed translation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationSource {
    Cached,
    Fetched,
    /// Backend error; text is a placeholder and nothing was cached
    Failed,
    /// No usable backend; text is a placeholder and nothing was cached
    Unavailable,
    /// Blank input, echoed unchanged
    Untranslatable,
}

impl TranslationSource {
    pub const fn is_placeholder(self) -> bool {
        matches!(self, Self::Failed | Self::Unavailable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceTranslation {
    pub original: String,
    pub text: String,
    pub source: TranslationSource,
}

impl SentenceTranslation {
    fn echo(original: &str) -> Self {
        Self {
            original: original.to_string(),
            text: original.to_string(),
            source: TranslationSource::Untranslatable,
        }
    }

    fn placeholder(original: &str, source: TranslationSource) -> Self {
        let prefix = match source {
            TranslationSource::Unavailable => UNAVAILABLE_PLACEHOLDER,
            _ => FAILED_PLACEHOLDER,
        };
        Self {
            original: original.to_string(),
            text: format!("{prefix} {original}"),
            source,
        }
    }
}

#[derive(Debug)]
enum BatchOutcome {
    Translated(Vec<String>),
    Unavailable,
    Failed,
}

type BatchFuture = Shared<BoxFuture<'static, Arc<BatchOutcome>>>;
type InFlightKey = (String, Lang);

/// Sentences being translated right now, mapped to the batch that owns
/// them and their position in it.
type InFlight = Arc<Mutex<HashMap<InFlightKey, (BatchFuture, usize)>>>;

fn lock_inflight(
    inflight: &Mutex<HashMap<InFlightKey, (BatchFuture, usize)>>,
) -> std::sync::MutexGuard<'_, HashMap<InFlightKey, (BatchFuture, usize)>> {
    inflight.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the loading flag when the last foreground load finishes.
struct LoadingGuard<'a> {
    scheduler: &'a TranslationScheduler,
}

impl<'a> LoadingGuard<'a> {
    fn enter(scheduler: &'a TranslationScheduler) -> Self {
        let mut active = scheduler.active.lock().unwrap_or_else(PoisonError::into_inner);
        *active += 1;
        if *active == 1 {
            scheduler.loading.send_replace(true);
        }
        Self { scheduler }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut active = self
            .scheduler
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *active = active.saturating_sub(1);
        if *active == 0 {
            self.scheduler.loading.send_replace(false);
        }
    }
}

/// Page translation with caching and request coalescing.
pub struct TranslationScheduler {
    translator: Arc<dyn Translator>,
    cache: TranslationCache,
    inflight: InFlight,
    active: Mutex<usize>,
    loading: watch::Sender<bool>,
}

impl TranslationScheduler {
    pub fn new(translator: Arc<dyn Translator>, cache: TranslationCache) -> Self {
        let (loading, _) = watch::channel(false);
        Self {
            translator,
            cache,
            inflight: Arc::new(Mutex::new(HashMap::new())),
            active: Mutex::new(0),
            loading,
        }
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    pub fn translator(&self) -> &Arc<dyn Translator> {
        &self.translator
    }

    /// Foreground load of one page. Raises the loading flag only when some
    /// sentence has to go to the network.
    pub async fn load_page(&self, texts: &[String], lang: &Lang) -> Vec<SentenceTranslation> {
        self.resolve(texts, lang, true).await
    }

    /// Background load of one page; never touches the loading flag.
    pub async fn prefetch_page(&self, texts: &[String], lang: &Lang) -> Vec<SentenceTranslation> {
        self.resolve(texts, lang, false).await
    }

    /// True when every non-blank sentence already has a translation in `lang`.
    pub async fn is_cached(&self, texts: &[String], lang: &Lang) -> bool {
        for text in texts {
            if !text.trim().is_empty() && !self.cache.contains(text, lang).await {
                return false;
            }
        }
        true
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Watch the foreground loading flag.
    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    /// Resolve once no foreground load is running.
    pub async fn wait_idle(&self) {
        let mut rx = self.loading.subscribe();
        // The sender lives in self, so the channel cannot close here
        let _ = rx.wait_for(|loading| !*loading).await;
    }

    async fn resolve(&self, texts: &[String], lang: &Lang, foreground: bool) -> Vec<SentenceTranslation> {
        let mut results: Vec<Option<SentenceTranslation>> = Vec::with_capacity(texts.len());
        let mut misses = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            if text.trim().is_empty() {
                results.push(Some(SentenceTranslation::echo(text)));
            } else if let Some(translated) = self.cache.get(text, lang).await {
                results.push(Some(SentenceTranslation {
                    original: text.clone(),
                    text: translated,
                    source: TranslationSource::Cached,
                }));
            } else {
                results.push(None);
                misses.push(i);
            }
        }

        debug!(
            "Page of {} sentences: {} cached, {} to translate into {}",
            texts.len(),
            texts.len() - misses.len(),
            misses.len(),
            lang
        );

        if misses.is_empty() {
            return results.into_iter().flatten().collect();
        }

        if !self.translator.is_available() {
            warn!(
                "{} translator is not configured, showing page of {} sentences untranslated",
                self.translator.name(),
                texts.len()
            );
            return unavailable_page(texts);
        }

        let _guard = foreground.then(|| LoadingGuard::enter(self));

        let waits = self.claim(&misses.iter().map(|&i| texts[i].clone()).collect::<Vec<_>>(), lang);
        let outcomes = join_all(waits.iter().map(|(fut, _)| fut.clone())).await;

        if outcomes.iter().any(|o| matches!(o.as_ref(), BatchOutcome::Unavailable)) {
            return unavailable_page(texts);
        }

        for ((&i, (_, position)), outcome) in misses.iter().zip(&waits).zip(outcomes) {
            let text = &texts[i];
            results[i] = Some(match outcome.as_ref() {
                BatchOutcome::Translated(lines) => SentenceTranslation {
                    original: text.clone(),
                    text: lines.get(*position).cloned().unwrap_or_else(|| text.clone()),
                    source: TranslationSource::Fetched,
                },
                BatchOutcome::Unavailable | BatchOutcome::Failed => {
                    SentenceTranslation::placeholder(text, TranslationSource::Failed)
                }
            });
        }

        results.into_iter().flatten().collect()
    }

    /// For each text, the batch that will translate it and its position in
    /// that batch. Texts nobody is translating yet are grouped into one new
    /// batch owned by this caller.
    fn claim(&self, texts: &[String], lang: &Lang) -> Vec<(BatchFuture, usize)> {
        let mut inflight = lock_inflight(&self.inflight);

        let mut mine: Vec<String> = Vec::new();
        let mut slots: Vec<Result<(BatchFuture, usize), usize>> = Vec::with_capacity(texts.len());

        for text in texts {
            let key = (text.clone(), lang.clone());
            if let Some((fut, position)) = inflight.get(&key) {
                debug!("Joining in-flight translation of {:?}", text);
                slots.push(Ok((fut.clone(), *position)));
            } else if let Some(position) = mine.iter().position(|m| m == text) {
                slots.push(Err(position));
            } else {
                slots.push(Err(mine.len()));
                mine.push(text.clone());
            }
        }

        let batch = (!mine.is_empty()).then(|| {
            let fut = self.batch(mine.clone(), lang.clone());
            for (position, text) in mine.iter().enumerate() {
                inflight.insert((text.clone(), lang.clone()), (fut.clone(), position));
            }
            tokio::spawn(fut.clone());
            fut
        });

        slots
            .into_iter()
            .filter_map(|slot| match slot {
                Ok(joined) => Some(joined),
                Err(position) => batch.clone().map(|fut| (fut, position)),
            })
            .collect()
    }

    fn batch(&self, texts: Vec<String>, lang: Lang) -> BatchFuture {
        let translator = Arc::clone(&self.translator);
        let cache = self.cache.clone();
        let inflight = Arc::clone(&self.inflight);

        async move {
            // Re-read: a loader that missed the cache just before an earlier
            // batch finished must reuse that batch's writes.
            let mut lines: Vec<Option<String>> = Vec::with_capacity(texts.len());
            for text in &texts {
                lines.push(cache.get(text, &lang).await);
            }
            let pending: Vec<String> = texts
                .iter()
                .zip(&lines)
                .filter(|(_, line)| line.is_none())
                .map(|(text, _)| text.clone())
                .collect();

            let outcome = if pending.is_empty() {
                debug!("All {} sentences were cached before the request went out", texts.len());
                BatchOutcome::Translated(lines.into_iter().flatten().collect())
            } else {
                info!("Requesting {} translations into {}", pending.len(), lang);

                match translator.translate_batch(&pending, &lang).await {
                    Ok(fetched) => {
                        if fetched.len() != pending.len() {
                            warn!(
                                "Backend returned {} lines for {} sentences, echoing originals for the gap",
                                fetched.len(),
                                pending.len()
                            );
                        }
                        let mut fetched = fetched.into_iter();
                        let mut translated = Vec::with_capacity(texts.len());
                        for (text, line) in texts.iter().zip(lines) {
                            let line = match line {
                                Some(cached) => cached,
                                None => {
                                    let line = fetched.next().unwrap_or_else(|| text.clone());
                                    cache.put(text, &line, &lang).await;
                                    line
                                }
                            };
                            translated.push(line);
                        }
                        BatchOutcome::Translated(translated)
                    }
                    Err(Error::TranslationMissingApiKey) => {
                        warn!("Translation API key not configured");
                        BatchOutcome::Unavailable
                    }
                    Err(e) => {
                        warn!("Translation of {} sentences failed: {}", pending.len(), e);
                        BatchOutcome::Failed
                    }
                }
            };

            let mut map = lock_inflight(&inflight);
            for text in texts {
                map.remove(&(text, lang.clone()));
            }

            Arc::new(outcome)
        }
        .boxed()
        .shared()
    }
}

/// Whole page shown untranslated when no backend can serve it, cached
/// sentences included.
fn unavailable_page(texts: &[String]) -> Vec<SentenceTranslation> {
    texts
        .iter()
        .map(|text| {
            if text.trim().is_empty() {
                SentenceTranslation::echo(text)
            } else {
                SentenceTranslation::placeholder(text, TranslationSource::Unavailable)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::translator::TranslatorInfo;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Upper {
        calls: AtomicUsize,
        short: bool,
    }

    #[async_trait]
    impl Translator for Upper {
        fn info(&self) -> TranslatorInfo {
            TranslatorInfo {
                name: "Upper",
                requires_api_key: false,
            }
        }

        async fn translate_batch(&self, lines: &[String], _target: &Lang) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut out: Vec<String> = lines.iter().map(|l| l.to_uppercase()).collect();
            if self.short {
                out.pop();
            }
            Ok(out)
        }
    }

    fn scheduler(short: bool) -> (TranslationScheduler, Arc<Upper>) {
        let translator = Arc::new(Upper {
            calls: AtomicUsize::new(0),
            short,
        });
        let scheduler = TranslationScheduler::new(translator.clone(), TranslationCache::in_memory(100));
        (scheduler, translator)
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn test_hits_and_misses_merge_in_order() {
        let (scheduler, translator) = scheduler(false);
        let fr = Lang::new("fr");
        scheduler.cache().put("b.", "cached b", &fr).await;

        let page = scheduler.load_page(&texts(&["a.", "b.", "  ", "c."]), &fr).await;

        let shown: Vec<_> = page.iter().map(|t| (t.text.as_str(), t.source)).collect();
        assert_eq!(
            shown,
            vec![
                ("A.", TranslationSource::Fetched),
                ("cached b", TranslationSource::Cached),
                ("  ", TranslationSource::Untranslatable),
                ("C.", TranslationSource::Fetched),
            ]
        );
        assert_eq!(translator.calls.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_cached(&texts(&["a.", "b.", "c.", ""]), &fr).await);
    }

    #[tokio::test]
    async fn test_missing_line_echoes_original() {
        let (scheduler, _) = scheduler(true);
        let page = scheduler.load_page(&texts(&["one.", "two."]), &Lang::new("fr")).await;
        assert_eq!(page[0].text, "ONE.");
        assert_eq!(page[1].text, "two.");
    }

    #[tokio::test]
    async fn test_duplicate_sentence_in_page_is_requested_once() {
        let (scheduler, translator) = scheduler(false);
        let page = scheduler.load_page(&texts(&["same.", "same."]), &Lang::new("fr")).await;
        assert_eq!(page[0].text, "SAME.");
        assert_eq!(page[1].text, "SAME.");
        assert_eq!(translator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_loading_flag_clears_after_load() {
        let (scheduler, _) = scheduler(false);
        let mut rx = scheduler.subscribe_loading();
        scheduler.load_page(&texts(&["x."]), &Lang::new("fr")).await;

        assert!(rx.has_changed().unwrap());
        assert!(!*rx.borrow_and_update());
        assert!(!scheduler.is_loading());
        assert!(scheduler.inflight.lock().unwrap().is_empty());
    }

    #[test]
    fn test_placeholder_text() {
        let failed = SentenceTranslation::placeholder("Hi.", TranslationSource::Failed);
        assert_eq!(failed.text, "[Translation failed] Hi.");
        assert!(failed.source.is_placeholder());

        let unavailable = SentenceTranslation::placeholder("Hi.", TranslationSource::Unavailable);
        assert_eq!(unavailable.text, "[Translation unavailable - key not configured] Hi.");
    }
}
