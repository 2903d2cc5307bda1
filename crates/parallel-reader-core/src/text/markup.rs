use scraper::{ElementRef, Html, Node};

/// Elements whose end starts a new line, so adjacent blocks never run into
/// one sentence.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote", "section", "article",
    "header", "footer", "pre", "tr", "dt", "dd", "figcaption",
];

/// Elements whose text is never shown to the reader.
const SKIPPED_ELEMENTS: &[&str] = &["head", "script", "style", "template", "noscript"];

/// Strip (X)HTML markup down to the visible body text.
///
/// Line breaks inside text nodes are source formatting and become spaces;
/// the only newlines in the output come from block boundaries and `<br>`.
/// Entities are decoded by the HTML parser.
pub fn to_plain_text(markup: &str) -> String {
    let html = Html::parse_document(markup);
    let root = html.root_element();
    let body = root
        .children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "body")
        .unwrap_or(root);

    let mut out = String::with_capacity(markup.len() / 2);
    collect_text(body, &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIPPED_ELEMENTS.contains(&name) {
        return;
    }
    if name == "br" {
        out.push('\n');
        return;
    }

    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            collect_text(child_element, out);
        } else if let Node::Text(text) = child.value() {
            out.extend(text.chars().map(|c| if super::is_line_break(c) { ' ' } else { c }));
        }
    }

    if BLOCK_ELEMENTS.contains(&name) {
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(markup: &str) -> Vec<String> {
        to_plain_text(markup)
            .lines()
            .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|l| !l.is_empty())
            .collect()
    }

    #[test]
    fn test_blocks_land_on_their_own_lines() {
        assert_eq!(
            lines("<h1>Title</h1><p>First.</p><p>Second.</p>"),
            ["Title", "First.", "Second."]
        );
    }

    #[test]
    fn test_inline_markup_is_joined() {
        assert_eq!(lines("<p>A <em>very</em> <b>bold</b> claim.</p>"), ["A very bold claim."]);
    }

    #[test]
    fn test_source_line_wraps_are_not_breaks() {
        assert_eq!(
            lines("<p>This sentence was\n    wrapped by an editor.</p>"),
            ["This sentence was wrapped by an editor."]
        );
    }

    #[test]
    fn test_head_script_and_style_are_ignored() {
        let markup = r#"<?xml version="1.0" encoding="utf-8"?>
            <html><head><title>Chapter 1</title><style>p { color: red }</style></head>
            <body><script>var x = 1;</script><p>Only this.</p></body></html>"#;
        assert_eq!(lines(markup), ["Only this."]);
    }

    #[test]
    fn test_entities_are_decoded() {
        assert_eq!(lines("<p>Fish &amp; chips&nbsp;&mdash; yes.</p>"), ["Fish & chips — yes."]);
    }

    #[test]
    fn test_br_breaks_lines() {
        assert_eq!(lines("<p>Roses are red<br/>Violets are blue</p>"), ["Roses are red", "Violets are blue"]);
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(lines("Hello! How are you?"), ["Hello! How are you?"]);
    }
}
