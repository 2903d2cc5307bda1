//! Markup to sentences: strip a chapter's (X)HTML to plain text, then split
//! it on sentence boundaries.

mod markup;
mod segment;

pub use markup::to_plain_text;
pub use segment::split_sentences;

use crate::config::Lang;

/// Extract the normalized sentences of one chapter.
pub fn extract_sentences(markup: &str, lang: &Lang) -> Vec<String> {
    split_sentences(&to_plain_text(markup), lang)
}

/// Collapse whitespace runs to a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) const fn is_line_break(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{0b}' | '\u{0c}' | '\u{85}' | '\u{2028}' | '\u{2029}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_sentences_from_paragraphs() {
        let html = "
            <p>Hello! How are you?</p>
            <p>I am fine. Thanks.</p>
        ";
        assert_eq!(
            extract_sentences(html, &Lang::new("en")),
            ["Hello!", "How are you?", "I am fine.", "Thanks."]
        );
    }

    #[test]
    fn test_adjacent_blocks_do_not_glue() {
        assert_eq!(
            extract_sentences("<h2>Part One</h2><p>It began</p>", &Lang::new("en")),
            ["Part One", "It began"]
        );
    }

    #[test]
    fn test_empty_chapter() {
        assert!(extract_sentences("<html><body>  </body></html>", &Lang::new("en")).is_empty());
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \n\t b  "), "a b");
        assert_eq!(normalize_whitespace(""), "");
    }
}
