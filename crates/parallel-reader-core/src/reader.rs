//! Navigation over a paginated, translated document.
//!
//! The controller owns the sentence buffer and the current page partition.
//! Every relayout is followed by re-resolving the current page's
//! translations, and every resolved page queues the next few pages for the
//! background prefetcher.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::buffer::ChunkBuffer;
use crate::config::{Lang, ReaderConfig};
use crate::document::Document;
use crate::error::Result;
use crate::layout::{LayoutOptions, Page, Viewport, clamp_page_index, compute_layout};
use crate::scheduler::{Prefetcher, TranslationScheduler, TranslationSource};
use crate::stream::SentenceStreamer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// No document opened yet
    Empty,
    /// Opening a document
    Loading,
    Ready { page: usize },
}

/// One sentence as shown: original above, translation below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSentence {
    pub chapter_index: usize,
    pub original: String,
    pub translation: String,
    pub source: TranslationSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub index: usize,
    pub sentences: Vec<RenderedSentence>,
}

/// Where the reader is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub page: usize,
    /// Pages laid out so far; grows as more text is buffered
    pub page_count: usize,
    /// Chapter of the first sentence on the page
    pub chapter_index: Option<usize>,
    /// More text remains upstream of the buffer
    pub has_more: bool,
}

struct Session {
    document: Arc<Document>,
    buffer: ChunkBuffer,
    pages: Vec<Page>,
}

impl Session {
    fn relayout<V: Viewport>(&mut self, viewport: &V, options: &LayoutOptions) {
        let sentences = self.buffer.sentences();
        self.pages = compute_layout(
            sentences,
            |i| viewport.measure(i, &sentences[i]),
            viewport.available_height(),
            options,
        );
    }

    /// Grow the buffer until `page` has `lookahead` complete pages after it,
    /// not counting the last page, which may still be filling up.
    fn ensure_lookahead<V: Viewport>(
        &mut self,
        page: usize,
        lookahead: usize,
        viewport: &V,
        options: &LayoutOptions,
    ) {
        while !self.buffer.is_exhausted()
            && (self.pages.is_empty() || page + lookahead >= self.pages.len() - 1)
        {
            let buffered = self.buffer.len();
            if self.buffer.ensure_available(buffered + 1) == buffered {
                break;
            }
            self.relayout(viewport, options);
        }
    }

    fn page_texts(&self, index: usize) -> Vec<String> {
        self.pages.get(index).map_or_else(Vec::new, |page| {
            self.buffer.sentences()[page.range()]
                .iter()
                .map(|s| s.text.clone())
                .collect()
        })
    }
}

/// Reading session over one document at a time.
pub struct ReaderController<V: Viewport> {
    scheduler: Arc<TranslationScheduler>,
    prefetcher: Prefetcher,
    viewport: V,
    config: ReaderConfig,
    options: LayoutOptions,
    source_lang: Lang,
    target_lang: Lang,
    session: Option<Session>,
    state: ReaderState,
    current: Option<RenderedPage>,
}

impl<V: Viewport> ReaderController<V> {
    /// Must be called inside a tokio runtime; starts the prefetch worker.
    pub fn new(
        scheduler: Arc<TranslationScheduler>,
        viewport: V,
        config: ReaderConfig,
        source_lang: Lang,
        target_lang: Lang,
    ) -> Self {
        let prefetcher = Prefetcher::spawn(
            Arc::clone(&scheduler),
            Duration::from_millis(config.prefetch_delay_ms),
        );
        let options = LayoutOptions::from(&config);

        Self {
            scheduler,
            prefetcher,
            viewport,
            config,
            options,
            source_lang,
            target_lang,
            session: None,
            state: ReaderState::Empty,
            current: None,
        }
    }

    /// Start reading `document` at `start_chapter`, on its first page.
    pub async fn open(&mut self, document: Arc<Document>, start_chapter: usize) -> Result<()> {
        let streamer =
            SentenceStreamer::new(Arc::clone(&document), start_chapter, self.source_lang.clone())?;

        self.state = ReaderState::Loading;
        self.current = None;
        self.prefetcher.clear();

        info!(
            "Opening \"{}\" at chapter {} of {}",
            document.title,
            start_chapter,
            document.chapter_count()
        );

        let mut session = Session {
            document,
            buffer: ChunkBuffer::new(streamer, self.config.chunk_size),
            pages: Vec::new(),
        };
        session.ensure_lookahead(0, self.config.lookahead_pages, &self.viewport, &self.options);
        self.session = Some(session);

        self.show(0).await;
        Ok(())
    }

    /// Move one page forward, buffering more text if needed. Returns false
    /// at the end of the document.
    pub async fn navigate_next(&mut self) -> bool {
        let Some(page) = self.page_index() else {
            return false;
        };
        let Some(session) = self.session.as_mut() else {
            return false;
        };

        session.ensure_lookahead(page + 1, self.config.lookahead_pages, &self.viewport, &self.options);
        if page + 1 >= session.pages.len() {
            debug!("Already on the last page");
            return false;
        }

        self.show(page + 1).await;
        true
    }

    /// Move one page back. Returns false on the first page.
    pub async fn navigate_prev(&mut self) -> bool {
        match self.page_index() {
            Some(page) if page > 0 => {
                self.show(page - 1).await;
                true
            }
            _ => false,
        }
    }

    /// Lay out again for a new surface, keeping the page index when it
    /// still exists.
    pub async fn resize(&mut self, viewport: V) {
        self.viewport = viewport;

        let Some(page) = self.page_index() else {
            return;
        };
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let before = session.pages.len();
        session.relayout(&self.viewport, &self.options);
        let page = clamp_page_index(page, session.pages.len());
        session.ensure_lookahead(page, self.config.lookahead_pages, &self.viewport, &self.options);

        debug!("Resized: {} pages -> {} pages, now on page {}", before, session.pages.len(), page);

        self.show(page).await;
    }

    /// Switch the target language and reload the current page.
    pub async fn set_language(&mut self, lang: Lang) {
        if lang == self.target_lang {
            return;
        }
        info!("Target language {} -> {}", self.target_lang, lang);
        self.target_lang = lang;

        if let Some(page) = self.page_index() {
            self.show(page).await;
        }
    }

    pub const fn state(&self) -> ReaderState {
        self.state
    }

    pub const fn current_page(&self) -> Option<&RenderedPage> {
        self.current.as_ref()
    }

    pub fn position(&self) -> Option<Position> {
        let page = self.page_index()?;
        let session = self.session.as_ref()?;
        let chapter_index = session
            .pages
            .get(page)
            .and_then(|p| session.buffer.get(p.start))
            .map(|s| s.chapter_index);

        Some(Position {
            page,
            page_count: session.pages.len(),
            chapter_index,
            has_more: !session.buffer.is_exhausted(),
        })
    }

    pub fn page_count(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.pages.len())
    }

    pub fn document(&self) -> Option<&Arc<Document>> {
        self.session.as_ref().map(|s| &s.document)
    }

    pub const fn target_lang(&self) -> &Lang {
        &self.target_lang
    }

    pub const fn viewport(&self) -> &V {
        &self.viewport
    }

    /// A foreground page load is waiting on the network.
    pub fn is_translating(&self) -> bool {
        self.scheduler.is_loading()
    }

    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.scheduler.subscribe_loading()
    }

    /// Pages queued for background translation.
    pub fn prefetch_pending(&self) -> usize {
        self.prefetcher.pending()
    }

    const fn page_index(&self) -> Option<usize> {
        match self.state {
            ReaderState::Ready { page } => Some(page),
            ReaderState::Empty | ReaderState::Loading => None,
        }
    }

    /// Make `index` the current page, resolve its translations and queue
    /// the following pages for prefetch.
    async fn show(&mut self, index: usize) {
        self.state = ReaderState::Ready { page: index };

        let Some(session) = self.session.as_ref() else {
            return;
        };

        let texts = session.page_texts(index);
        let chapters: Vec<usize> = session
            .pages
            .get(index)
            .map(|page| session.buffer.sentences()[page.range()].iter().map(|s| s.chapter_index).collect())
            .unwrap_or_default();

        let upcoming: Vec<Vec<String>> = (index + 1..session.pages.len())
            .take(self.config.prefetch_window)
            .map(|i| session.page_texts(i))
            .collect();

        let translations = self.scheduler.load_page(&texts, &self.target_lang).await;

        self.current = Some(RenderedPage {
            index,
            sentences: chapters
                .into_iter()
                .zip(translations)
                .map(|(chapter_index, t)| RenderedSentence {
                    chapter_index,
                    original: t.original,
                    translation: t.text,
                    source: t.source,
                })
                .collect(),
        });

        self.prefetcher.schedule(upcoming, &self.target_lang);
    }
}
