use tracing::debug;

use crate::stream::{Sentence, SentenceStreamer};

/// The growing, append-only prefix of the streamer's output.
///
/// Indices handed out by the buffer stay valid for its whole lifetime.
pub struct ChunkBuffer {
    streamer: SentenceStreamer,
    sentences: Vec<Sentence>,
    chunk_size: usize,
}

impl ChunkBuffer {
    pub fn new(streamer: SentenceStreamer, chunk_size: usize) -> Self {
        Self {
            streamer,
            sentences: Vec::new(),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Pull whole chunks until `count` sentences are buffered or the
    /// document runs out. Returns the buffered length.
    pub fn ensure_available(&mut self, count: usize) -> usize {
        while self.sentences.len() < count {
            if self.grow() == 0 {
                break;
            }
        }
        self.sentences.len()
    }

    /// Pull one chunk; returns how many sentences were added.
    pub fn grow(&mut self) -> usize {
        let chunk = self.streamer.pull(self.chunk_size);
        let added = chunk.len();
        self.sentences.extend(chunk);
        if added > 0 {
            debug!("Sentence buffer grew by {} to {}", added, self.sentences.len());
        }
        added
    }

    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }

    pub fn get(&self, index: usize) -> Option<&Sentence> {
        self.sentences.get(index)
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    /// Nothing left upstream; the buffer holds the whole remaining document.
    pub fn is_exhausted(&self) -> bool {
        !self.streamer.has_more()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Lang;
    use crate::document::{Chapter, Document};
    use std::sync::Arc;

    fn buffer(sentences: usize, chunk_size: usize) -> ChunkBuffer {
        let text = (0..sentences).map(|i| format!("Sentence {i}.")).collect::<Vec<_>>().join(" ");
        let doc = Arc::new(Document::new("t", vec![Chapter::new("c", text)]).unwrap());
        ChunkBuffer::new(SentenceStreamer::new(doc, 0, Lang::new("en")).unwrap(), chunk_size)
    }

    #[test]
    fn test_grows_in_whole_chunks() {
        let mut buf = buffer(20, 4);
        assert_eq!(buf.ensure_available(5), 8);
        assert_eq!(buf.ensure_available(3), 8, "never shrinks or over-pulls");
        assert!(!buf.is_exhausted());
    }

    #[test]
    fn test_stops_at_document_end() {
        let mut buf = buffer(6, 4);
        assert_eq!(buf.ensure_available(100), 6);
        assert!(buf.is_exhausted());
        assert_eq!(buf.grow(), 0);
    }

    #[test]
    fn test_indices_are_stable_across_growth() {
        let mut buf = buffer(10, 3);
        buf.ensure_available(3);
        let first: Vec<_> = buf.sentences().to_vec();
        buf.ensure_available(10);
        assert_eq!(&buf.sentences()[..3], first.as_slice());
        assert_eq!(buf.get(9).map(|s| s.text.as_str()), Some("Sentence 9."));
    }

    #[test]
    fn test_zero_chunk_size_still_progresses() {
        let mut buf = buffer(2, 0);
        assert_eq!(buf.ensure_available(2), 2);
    }
}
