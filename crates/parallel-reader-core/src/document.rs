//! Already-extracted book content: an ordered list of chapters holding raw
//! markup. Container formats are unpacked elsewhere; this module only reads
//! the result, either as JSON or as a directory of chapter files.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Error, Result};

const CHAPTER_EXTENSIONS: &[&str] = &["html", "xhtml", "htm"];

fn default_title() -> String {
    "Unknown Title".to_string()
}

/// One spine entry with its raw (X)HTML markup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub text: String,
}

impl Chapter {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// An immutable, ordered chapter list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default = "default_title")]
    pub title: String,
    pub chapters: Vec<Chapter>,
}

impl Document {
    /// Build a document, rejecting an empty chapter list.
    pub fn new(title: impl Into<String>, chapters: Vec<Chapter>) -> Result<Self> {
        let doc = Self {
            title: title.into(),
            chapters,
        };
        doc.validate()?;
        Ok(doc)
    }

    /// Parse `{"title": ..., "chapters": [{"id": ..., "text": ...}]}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: Self =
            serde_json::from_str(json).map_err(|e| Error::Parse(format!("invalid document JSON: {e}")))?;
        doc.validate()?;
        Ok(doc)
    }

    /// Load a JSON document file, or a directory whose `.html`/`.xhtml`/`.htm`
    /// files are the chapters in file-name order.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if path.is_dir() {
            return Self::from_dir(path);
        }

        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Parse(format!("failed to read {}: {e}", path.display())))?;
        let doc = Self::from_json(&json)?;
        info!(
            "Loaded \"{}\" from {} ({} chapters)",
            doc.title,
            path.display(),
            doc.chapters.len()
        );
        Ok(doc)
    }

    fn from_dir(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| Error::Parse(format!("failed to list {}: {e}", dir.display())))?;

        let mut files: Vec<_> = entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| CHAPTER_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            })
            .collect();
        files.sort();

        let mut chapters = Vec::with_capacity(files.len());
        for file in files {
            let text = std::fs::read_to_string(&file)
                .map_err(|e| Error::Parse(format!("failed to read chapter {}: {e}", file.display())))?;
            let id = file
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("chapter")
                .to_string();
            debug!("Chapter {} ({} bytes)", id, text.len());
            chapters.push(Chapter { id, text });
        }

        let title = dir
            .file_name()
            .and_then(|s| s.to_str())
            .map_or_else(default_title, str::to_string);

        let doc = Self::new(title, chapters)?;
        info!(
            "Loaded \"{}\" from {} ({} chapters)",
            doc.title,
            dir.display(),
            doc.chapters.len()
        );
        Ok(doc)
    }

    fn validate(&self) -> Result<()> {
        if self.chapters.is_empty() {
            return Err(Error::Parse("document has no chapters".to_string()));
        }
        Ok(())
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let doc = Document::from_json(
            r#"{"title": "Book", "chapters": [{"id": "c1", "text": "<p>Hi.</p>"}]}"#,
        )
        .unwrap();
        assert_eq!(doc.title, "Book");
        assert_eq!(doc.chapters, vec![Chapter::new("c1", "<p>Hi.</p>")]);
    }

    #[test]
    fn test_from_json_defaults_title() {
        let doc = Document::from_json(r#"{"chapters": [{"id": "c1", "text": ""}]}"#).unwrap();
        assert_eq!(doc.title, "Unknown Title");
    }

    #[test]
    fn test_missing_chapter_text_is_parse_failure() {
        let result = Document::from_json(r#"{"chapters": [{"id": "c1"}]}"#);
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn test_no_chapters_is_parse_failure() {
        assert!(matches!(
            Document::from_json(r#"{"chapters": []}"#),
            Err(Error::Parse(_))
        ));
        assert!(matches!(Document::new("t", Vec::new()), Err(Error::Parse(_))));
    }

    #[test]
    fn test_from_dir_orders_by_file_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("02-second.xhtml"), "<p>Two.</p>").unwrap();
        std::fs::write(dir.path().join("01-first.html"), "<p>One.</p>").unwrap();
        std::fs::write(dir.path().join("styles.css"), "p {}").unwrap();

        let doc = Document::from_path(dir.path()).unwrap();
        let ids: Vec<_> = doc.chapters.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["01-first", "02-second"]);
    }

    #[test]
    fn test_from_path_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Document::from_path(dir.path().join("nope.json"));
        assert!(matches!(result, Err(Error::Parse(_))));
    }
}
