//! Lazy sentence production over a multi-chapter document.

use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

use crate::config::Lang;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::text::extract_sentences;

/// A normalized sentence tagged with the chapter it came from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sentence {
    pub text: String,
    pub chapter_index: usize,
}

impl Sentence {
    pub fn new(text: impl Into<String>, chapter_index: usize) -> Self {
        Self {
            text: text.into(),
            chapter_index,
        }
    }
}

/// Walks the chapters in order, segmenting one chapter at a time.
///
/// Every sentence of the document (from the starting chapter on) is emitted
/// exactly once and in order, however the output is chunked by `pull`.
pub struct SentenceStreamer {
    document: Arc<Document>,
    lang: Lang,
    /// Next chapter to segment
    next_chapter: usize,
    /// Segmented but not yet emitted sentences of the current chapter
    pending: VecDeque<Sentence>,
}

impl SentenceStreamer {
    pub fn new(document: Arc<Document>, start_chapter: usize, lang: Lang) -> Result<Self> {
        let total = document.chapter_count();
        if start_chapter >= total {
            return Err(Error::ChapterOutOfRange {
                index: start_chapter,
                total,
            });
        }

        let mut streamer = Self {
            document,
            lang,
            next_chapter: start_chapter,
            pending: VecDeque::new(),
        };
        streamer.refill();
        Ok(streamer)
    }

    /// Up to `n` sentences not emitted before; empty once exhausted.
    pub fn pull(&mut self, n: usize) -> Vec<Sentence> {
        let mut out = Vec::with_capacity(n.min(self.pending.len()));
        while out.len() < n {
            let Some(sentence) = self.pending.pop_front() else {
                break;
            };
            out.push(sentence);
            if self.pending.is_empty() {
                self.refill();
            }
        }
        out
    }

    pub fn has_more(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Segment chapters until one yields sentences or none are left.
    fn refill(&mut self) {
        while self.pending.is_empty() && self.next_chapter < self.document.chapter_count() {
            let index = self.next_chapter;
            self.next_chapter += 1;

            let chapter = &self.document.chapters[index];
            let sentences = extract_sentences(&chapter.text, &self.lang);
            debug!(
                "Segmented chapter {} ({}) into {} sentences",
                index,
                chapter.id,
                sentences.len()
            );
            self.pending
                .extend(sentences.into_iter().map(|text| Sentence::new(text, index)));
        }
    }
}
