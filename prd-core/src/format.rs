use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Doc,
    Txt,
}

impl DocumentFormat {
    /// Detect the format from the file extension, ignoring case.
    pub fn from_filename(filename: &str) -> Result<Self> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| CoreError::UnsupportedFormat(filename.to_string()))?;

        match extension.as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" => Ok(DocumentFormat::Docx),
            "doc" => Ok(DocumentFormat::Doc),
            "txt" => Ok(DocumentFormat::Txt),
            other => Err(CoreError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// An uploaded file, alive only for the duration of one parse request.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub filename: String,
    pub format: DocumentFormat,
    pub bytes: Vec<u8>,
}

impl RawDocument {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let filename = filename.into();
        let format = DocumentFormat::from_filename(&filename)?;
        Ok(Self {
            filename,
            format,
            bytes,
        })
    }
}

/// Decoded text of a document with whatever metadata the decoder found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedContent {
    pub text: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub filename: String,
    pub format: DocumentFormat,
    pub page_count: Option<usize>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub word_count: usize,
    pub char_count: usize,
}

impl ParsedContent {
    /// Wrap decoded text, deriving counts and a title from the first
    /// non-blank line.
    pub fn new(text: String, filename: &str, format: DocumentFormat) -> Self {
        let title = text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string);

        let metadata = DocumentMetadata {
            filename: filename.to_string(),
            format,
            page_count: None,
            title,
            author: None,
            word_count: text.split_whitespace().count(),
            char_count: text.chars().count(),
        };

        Self { text, metadata }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(DocumentFormat::from_filename("plan.PDF"), Ok(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_filename("a/b/spec.docx"), Ok(DocumentFormat::Docx));
        assert_eq!(DocumentFormat::from_filename("old.doc"), Ok(DocumentFormat::Doc));
        assert_eq!(DocumentFormat::from_filename("notes.txt"), Ok(DocumentFormat::Txt));
    }

    #[test]
    fn test_unsupported_format() {
        assert_eq!(
            DocumentFormat::from_filename("deck.pptx"),
            Err(CoreError::UnsupportedFormat("pptx".to_string()))
        );
        assert!(matches!(
            DocumentFormat::from_filename("README"),
            Err(CoreError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_parsed_content_metadata() {
        let parsed = ParsedContent::new(
            "\n  Checkout Revamp  \nSecond line here".to_string(),
            "revamp.txt",
            DocumentFormat::Txt,
        );
        assert_eq!(parsed.metadata.title.as_deref(), Some("Checkout Revamp"));
        assert_eq!(parsed.metadata.word_count, 5);
        assert_eq!(parsed.metadata.page_count, None);
    }
}
