//! Decoding uploaded files into plain text.
//!
//! PDF pages are rasterized with `pdf2image` and read back by a vision model.
//! DOCX/DOC files go through `docx-rs`, keeping only live paragraph text.
//! Plain text is decoded as lossy UTF-8.

use anyhow::anyhow;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use docx_rs::{DocumentChild, Paragraph, ParagraphChild, RunChild, read_docx};
use image::{DynamicImage, ImageFormat};
use pdf2image::{PDF, Pages};
use prd_core::{CoreError, DocumentFormat, ParsedContent, RawDocument};
use serde_json::json;
use std::io::Cursor;
use thiserror::Error;
use tracing::{info, warn};

use crate::llm::OpenRouterClient;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error(transparent)]
    UnsupportedFormat(#[from] CoreError),

    #[error("Failed to decode {format:?} document: {details}")]
    Decode {
        format: DocumentFormat,
        details: String,
    },

    #[error("Text recognition failed: {0}")]
    Ocr(String),

    #[error("No text could be extracted from {0}")]
    Empty(String),
}

/// Decode a raw document into text and metadata.
pub async fn extract_document(
    document: &RawDocument,
    ocr: &OpenRouterClient,
) -> Result<ParsedContent, ExtractionError> {
    info!(
        filename = %document.filename,
        format = ?document.format,
        bytes = document.bytes.len(),
        "Extracting document text"
    );

    let parsed = match document.format {
        DocumentFormat::Pdf => extract_pdf(document, ocr).await?,
        DocumentFormat::Docx | DocumentFormat::Doc => extract_docx(document)?,
        DocumentFormat::Txt => extract_txt(document),
    };

    if parsed.text.trim().is_empty() {
        warn!(filename = %document.filename, "No text extracted from document");
        return Err(ExtractionError::Empty(document.filename.clone()));
    }

    info!(
        filename = %document.filename,
        words = parsed.metadata.word_count,
        "Document text extracted"
    );
    Ok(parsed)
}

fn extract_txt(document: &RawDocument) -> ParsedContent {
    let text = String::from_utf8_lossy(&document.bytes).into_owned();
    ParsedContent::new(text, &document.filename, document.format)
}

fn extract_docx(document: &RawDocument) -> Result<ParsedContent, ExtractionError> {
    let docx = read_docx(&document.bytes).map_err(|e| ExtractionError::Decode {
        format: document.format,
        details: format!("{:?}", e),
    })?;

    let paragraphs: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(paragraph) => Some(paragraph_text(paragraph)),
            _ => None,
        })
        .filter(|text| !text.trim().is_empty())
        .collect();

    Ok(ParsedContent::new(
        paragraphs.join("\n"),
        &document.filename,
        document.format,
    ))
}

/// Text of the live runs in a paragraph. Tracked deletions are not runs of
/// the paragraph and are skipped.
fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        if let ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                match run_child {
                    RunChild::Text(t) => text.push_str(&t.text),
                    RunChild::Tab(_) => text.push('\t'),
                    _ => {}
                }
            }
        }
    }
    text
}

async fn extract_pdf(
    document: &RawDocument,
    ocr: &OpenRouterClient,
) -> Result<ParsedContent, ExtractionError> {
    let images = convert_pdf_to_images(document.bytes.clone())
        .await
        .map_err(|e| ExtractionError::Decode {
            format: DocumentFormat::Pdf,
            details: e.to_string(),
        })?;

    if images.is_empty() {
        return Err(ExtractionError::Empty(document.filename.clone()));
    }

    info!("Generated {} images from PDF", images.len());

    let text = extract_text_with_llm_vision(&images, ocr)
        .await
        .map_err(|e| ExtractionError::Ocr(e.to_string()))?;

    let mut parsed = ParsedContent::new(text, &document.filename, DocumentFormat::Pdf);
    parsed.metadata.page_count = Some(images.len());
    Ok(parsed)
}

/// Rasterize every page on a blocking thread.
async fn convert_pdf_to_images(bytes: Vec<u8>) -> anyhow::Result<Vec<DynamicImage>> {
    let images = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<DynamicImage>> {
        let pdf = PDF::from_bytes(bytes).map_err(|e| anyhow!("Failed to load PDF: {}", e))?;

        let rendered_images = pdf
            .render(Pages::All, None)
            .map_err(|e| anyhow!("Failed to render PDF pages: {}", e))?;

        info!("Rendered {} pages from PDF", rendered_images.len());
        Ok(rendered_images)
    })
    .await??;

    Ok(images)
}

/// Send all pages to a vision model in a single call.
async fn extract_text_with_llm_vision(
    images: &[DynamicImage],
    ocr: &OpenRouterClient,
) -> anyhow::Result<String> {
    let mut content = vec![json!({
        "type": "text",
        "text": format!(
            "You are a document OCR system. I'm providing you with {} pages of a product requirements document. \
            Extract ALL text from these pages, preserving headings, bullet points and the order of sections. \
            Put every heading on its own line.

            Return ONLY the extracted text without any commentary or explanations.",
            images.len()
        )
    })];

    for image in images {
        let base64_image = image_to_base64(image)?;
        content.push(json!({
            "type": "image_url",
            "image_url": {
                "url": format!("data:image/png;base64,{}", base64_image)
            }
        }));
    }

    let extracted_text = ocr.complete(content, 4000).await?;

    info!(
        "LLM vision OCR completed: {} total characters extracted",
        extracted_text.len()
    );
    Ok(extracted_text)
}

fn image_to_base64(image: &DynamicImage) -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);

    image
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| anyhow!("Failed to encode image: {}", e))?;

    Ok(STANDARD.encode(&buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

    const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

    const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"></Relationships>"#;

    fn write_package(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, contents) in parts {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    /// Minimal WordprocessingML package around the given `<w:body>` content.
    fn build_docx(body: &str) -> Vec<u8> {
        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );
        write_package(&[
            ("[Content_Types].xml", CONTENT_TYPES),
            ("_rels/.rels", PACKAGE_RELS),
            ("word/_rels/document.xml.rels", DOCUMENT_RELS),
            ("word/document.xml", &document),
        ])
    }

    fn offline_client() -> OpenRouterClient {
        OpenRouterClient::new(None, "openai/gpt-4.1-mini")
    }

    #[tokio::test]
    async fn test_extract_txt() {
        let raw = RawDocument::new("prd.txt", b"Solution\nShip it & iterate".to_vec()).unwrap();
        let parsed = extract_document(&raw, &offline_client()).await.unwrap();

        assert_eq!(parsed.text, "Solution\nShip it & iterate");
        assert_eq!(parsed.metadata.format, DocumentFormat::Txt);
        assert_eq!(parsed.metadata.title.as_deref(), Some("Solution"));
    }

    #[tokio::test]
    async fn test_extract_docx() {
        let body = r#"<w:p><w:r><w:t>Problem Statement</w:t></w:r></w:p>
            <w:p/>
            <w:p><w:r><w:t xml:space="preserve">Reports take &amp; waste</w:t></w:r><w:r><w:tab/><w:t>hours</w:t></w:r></w:p>"#;
        let raw = RawDocument::new("reporting.docx", build_docx(body)).unwrap();

        let parsed = extract_document(&raw, &offline_client()).await.unwrap();

        assert_eq!(parsed.text, "Problem Statement\nReports take & waste\thours");
        assert_eq!(parsed.metadata.format, DocumentFormat::Docx);
        assert_eq!(parsed.metadata.title.as_deref(), Some("Problem Statement"));
    }

    #[tokio::test]
    async fn test_docx_decodes_character_references_and_skips_deletions() {
        let body = r#"<w:p><w:r><w:t>Users&#8217; pain</w:t></w:r><w:del w:id="1" w:author="Dana" w:date="2024-01-01T00:00:00Z"><w:r><w:delText>REMOVED DRAFT</w:delText></w:r></w:del></w:p>"#;
        let raw = RawDocument::new("draft.docx", build_docx(body)).unwrap();

        let parsed = extract_document(&raw, &offline_client()).await.unwrap();
        assert_eq!(parsed.text, "Users\u{2019} pain");
    }

    #[tokio::test]
    async fn test_docx_without_body_is_rejected() {
        let bytes = write_package(&[("other.xml", "<x/>")]);

        let raw = RawDocument::new("broken.docx", bytes).unwrap();
        let err = extract_document(&raw, &offline_client()).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_legacy_doc_that_is_not_a_zip() {
        let raw = RawDocument::new("legacy.doc", vec![0xD0, 0xCF, 0x11, 0xE0]).unwrap();
        let err = extract_document(&raw, &offline_client()).await.unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::Decode {
                format: DocumentFormat::Doc,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected() {
        let raw = RawDocument::new("blank.txt", b"  \n \n".to_vec()).unwrap();
        let err = extract_document(&raw, &offline_client()).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Empty(_)));
    }
}
