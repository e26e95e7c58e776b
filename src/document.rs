//! Writing label and manifest documents to disk or any async writer.
//!
//! The provider returns documents either inline as base64 (optionally one
//! entry per page) or as a URL to download. [`DocumentWriter`] handles both,
//! streaming downloads chunk by chunk.

use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// How a document's content is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    /// `contents` is a download URL.
    Url,
    /// `contents` or each page is base64 data.
    Base64,
}

/// One page of a multi-page base64 document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Base64 page data.
    pub contents: String,
}

/// A document attached to a shipment or manifest response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Document kind, e.g. `SHIPPING_LABEL`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// How the content is delivered.
    pub content_type: ContentType,

    /// File format, e.g. `PDF`, `PNG`, `ZPL2`.
    pub file_format: String,

    /// Page size, e.g. `DOC_4X6`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    /// URL or base64 data for single-part documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,

    /// Base64 pages for multi-page documents.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<Page>,
}

/// Writes [`Document`]s.
#[derive(Debug, Clone, Default)]
pub struct DocumentWriter {
    http_client: reqwest::Client,
}

impl DocumentWriter {
    /// Creates a writer with its own HTTP client for URL documents.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a writer around an existing HTTP client.
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Writes the whole document to `writer`, pages back to back.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error if the document has no content, the base64 data is
    /// invalid, the download fails, or writing fails.
    pub async fn write_to<W>(&self, document: &Document, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let written = match document.content_type {
            ContentType::Url => {
                let url = document
                    .contents
                    .as_deref()
                    .ok_or_else(|| Error::Document("URL document has no contents".to_string()))?;
                self.download(url, writer).await?
            }
            ContentType::Base64 => {
                let mut total = 0;
                for part in base64_parts(document)? {
                    let bytes = decode_page(part)?;
                    writer.write_all(&bytes).await?;
                    total += bytes.len() as u64;
                }
                total
            }
        };
        writer.flush().await?;
        Ok(written)
    }

    /// Writes each page to its own file, named by `path_for_page(index)`.
    ///
    /// URL documents and single-part base64 documents produce one file.
    /// Returns the paths written, in page order.
    ///
    /// # Errors
    ///
    /// Same as [`write_to`](Self::write_to), plus file creation failures.
    pub async fn write_pages<F>(
        &self,
        document: &Document,
        mut path_for_page: F,
    ) -> Result<Vec<PathBuf>>
    where
        F: FnMut(usize) -> PathBuf,
    {
        if document.content_type == ContentType::Url || document.pages.is_empty() {
            let path = path_for_page(0);
            let mut file = tokio::fs::File::create(&path).await?;
            self.write_to(document, &mut file).await?;
            return Ok(vec![path]);
        }

        let mut paths = Vec::with_capacity(document.pages.len());
        for (index, page) in document.pages.iter().enumerate() {
            let path = path_for_page(index);
            let bytes = decode_page(&page.contents)?;
            let mut file = tokio::fs::File::create(&path).await?;
            file.write_all(&bytes).await?;
            file.flush().await?;
            tracing::debug!(path = %path.display(), page = index, "Document page written");
            paths.push(path);
        }
        Ok(paths)
    }

    async fn download<W>(&self, url: &str, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        tracing::debug!(url = %url, "Downloading document");

        let mut response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Document(format!(
                "Document download failed with status {}",
                status.as_u16()
            )));
        }

        let mut total = 0;
        while let Some(chunk) = response.chunk().await? {
            writer.write_all(&chunk).await?;
            total += chunk.len() as u64;
        }
        Ok(total)
    }
}

fn base64_parts(document: &Document) -> Result<Vec<&str>> {
    if !document.pages.is_empty() {
        return Ok(document.pages.iter().map(|p| p.contents.as_str()).collect());
    }
    document
        .contents
        .as_deref()
        .map(|c| vec![c])
        .ok_or_else(|| Error::Document("Base64 document has no contents".to_string()))
}

fn decode_page(contents: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(contents.trim())
        .map_err(|e| Error::Document(format!("Invalid base64 content: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base64_document(pages: &[&str]) -> Document {
        Document {
            kind: Some("SHIPPING_LABEL".to_string()),
            content_type: ContentType::Base64,
            file_format: "PNG".to_string(),
            size: Some("DOC_4X6".to_string()),
            contents: None,
            pages: pages
                .iter()
                .map(|p| Page {
                    contents: STANDARD.encode(p),
                })
                .collect(),
        }
    }

    #[test]
    fn test_document_wire_format() {
        let document: Document = serde_json::from_str(
            concat!(
                r#"{"type":"SHIPPING_LABEL","contentType":"URL","size":"DOC_4X6","#,
                r#""fileFormat":"PDF","contents":"https://example.com/label.pdf"}"#
            ),
        )
        .unwrap();
        assert_eq!(document.content_type, ContentType::Url);
        assert_eq!(document.file_format, "PDF");
        assert!(document.pages.is_empty());
    }

    #[tokio::test]
    async fn test_pages_written_back_to_back() {
        let document = base64_document(&["page one|", "page two"]);
        let mut out = Vec::new();

        let written = DocumentWriter::new()
            .write_to(&document, &mut out)
            .await
            .unwrap();
        assert_eq!(out, b"page one|page two");
        assert_eq!(written, 17);
    }

    #[tokio::test]
    async fn test_invalid_or_missing_content() {
        let mut document = base64_document(&[]);
        let writer = DocumentWriter::new();
        let mut out = Vec::new();
        assert!(matches!(
            writer.write_to(&document, &mut out).await,
            Err(Error::Document(_))
        ));

        document.contents = Some("not base64!!".to_string());
        assert!(matches!(
            writer.write_to(&document, &mut out).await,
            Err(Error::Document(_))
        ));
    }

    #[tokio::test]
    async fn test_one_file_per_page() {
        let dir = tempfile::tempdir().unwrap();
        let document = base64_document(&["first", "second"]);

        let paths = DocumentWriter::new()
            .write_pages(&document, |page| dir.path().join(format!("label-p{}.png", page)))
            .await
            .unwrap();

        assert_eq!(paths.len(), 2);
        assert_eq!(std::fs::read(&paths[0]).unwrap(), b"first");
        assert_eq!(std::fs::read(&paths[1]).unwrap(), b"second");
    }
}
