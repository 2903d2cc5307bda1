//! Pagination from measured sentence heights.
//!
//! Layout is a pure function of the sentences, a height oracle and the
//! available height. The caller recomputes the whole partition whenever the
//! buffer grows or the viewport changes; pages are never patched.

use std::ops::Range;
use tracing::debug;

use crate::config::ReaderConfig;
use crate::stream::Sentence;

/// A contiguous run of sentence buffer indices that fits one screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Page {
    pub start: usize,
    pub end: usize,
}

impl Page {
    pub const fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Rendering surface: how tall each sentence renders and how much room a
/// page has, in the same (arbitrary) unit.
pub trait Viewport: Send + Sync {
    /// Rendered height of the sentence at buffer position `index`.
    fn measure(&self, index: usize, sentence: &Sentence) -> f32;

    /// Height budget of one page.
    fn available_height(&self) -> f32;
}

/// Character-cell surface, e.g. a terminal. Heights are in rows.
///
/// Each sentence takes the rows its original text wraps to at `columns`,
/// plus the same again for the translation shown under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridViewport {
    pub columns: usize,
    pub rows: usize,
}

impl GridViewport {
    pub const fn new(columns: usize, rows: usize) -> Self {
        Self { columns, rows }
    }

    fn wrapped_rows(&self, text: &str) -> usize {
        let chars = text.chars().count();
        if self.columns == 0 {
            return 0;
        }
        chars.div_ceil(self.columns).max(1)
    }
}

impl Viewport for GridViewport {
    fn measure(&self, _index: usize, sentence: &Sentence) -> f32 {
        (self.wrapped_rows(&sentence.text) * 2) as f32
    }

    fn available_height(&self) -> f32 {
        self.rows as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutOptions {
    /// Added to every measured height
    pub sentence_margin: f32,
    /// Page size when measurement is unusable
    pub fallback_sentences_per_page: usize,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self::from(&ReaderConfig::default())
    }
}

impl From<&ReaderConfig> for LayoutOptions {
    fn from(config: &ReaderConfig) -> Self {
        Self {
            sentence_margin: config.sentence_margin,
            fallback_sentences_per_page: config.fallback_sentences_per_page,
        }
    }
}

/// True when the measured heights cannot drive pagination: nothing was
/// rendered yet (all zero), a value is negative or not finite, or there is
/// no usable page height.
pub fn measurement_is_degenerate(heights: &[f32], available_height: f32) -> bool {
    if !available_height.is_finite() || available_height <= 0.0 {
        return true;
    }
    if heights.iter().any(|h| !h.is_finite() || *h < 0.0) {
        return true;
    }
    heights.iter().all(|h| *h == 0.0)
}

/// Greedily pack sentences into pages.
///
/// A sentence joins the current page while the running total (height plus
/// margin per sentence) stays within `available_height`. A sentence that is
/// taller than a whole page gets a page to itself. Degenerate measurements
/// fall back to `fallback_sentences_per_page` sentences per page.
pub fn compute_layout<F>(
    sentences: &[Sentence],
    measure: F,
    available_height: f32,
    options: &LayoutOptions,
) -> Vec<Page>
where
    F: Fn(usize) -> f32,
{
    if sentences.is_empty() {
        return Vec::new();
    }

    let heights: Vec<f32> = (0..sentences.len()).map(measure).collect();
    if measurement_is_degenerate(&heights, available_height) {
        debug!(
            "Degenerate measurement for {} sentences (available {}), using {} per page",
            heights.len(),
            available_height,
            options.fallback_sentences_per_page
        );
        return fixed_partition(sentences.len(), options.fallback_sentences_per_page);
    }

    let mut pages = Vec::new();
    let mut start = 0;
    let mut used = 0.0_f32;
    for (i, height) in heights.iter().enumerate() {
        let cost = height + options.sentence_margin;
        if i > start && used + cost > available_height {
            pages.push(Page { start, end: i });
            start = i;
            used = 0.0;
        }
        used += cost;
    }
    pages.push(Page {
        start,
        end: heights.len(),
    });

    pages
}

/// `per_page` sentences per page, last page possibly shorter.
pub fn fixed_partition(len: usize, per_page: usize) -> Vec<Page> {
    let per_page = per_page.max(1);
    (0..len)
        .step_by(per_page)
        .map(|start| Page {
            start,
            end: (start + per_page).min(len),
        })
        .collect()
}

/// Keep `current` if the new layout still has it, else the last page.
pub const fn clamp_page_index(current: usize, page_count: usize) -> usize {
    if page_count == 0 {
        0
    } else if current < page_count {
        current
    } else {
        page_count - 1
    }
}
