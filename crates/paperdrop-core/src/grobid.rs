//! Title extraction through GROBID's header endpoint.
//!
//! GROBID answers `processHeaderDocument` with a TEI document whose
//! `teiHeader/fileDesc/titleStmt/title` holds the paper title. Anything that
//! goes wrong after the HTTP call succeeded degrades to the file name.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use thiserror::Error;

/// Multipart field GROBID reads the PDF from.
pub const INPUT_FIELD: &str = "input";

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("GROBID returned HTTP {0}")]
    Status(StatusCode),
}

#[derive(Error, Debug)]
pub enum TitleParseError {
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("document ends inside <{0}>")]
    Unclosed(String),
    #[error("document has no root element")]
    NoRoot,
}

/// Where a title came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleSource {
    Grobid,
    /// GROBID answered but had no usable title; the file name was used.
    FileStem,
}

/// Metadata extracted for one import attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub title: String,
    pub source: TitleSource,
}

/// Something that can derive metadata for a PDF on disk.
pub trait MetadataExtractor: Send + Sync {
    fn extract<'a>(
        &'a self,
        path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<Metadata, ExtractError>> + Send + 'a>>;
}

/// HTTP client for a GROBID `processHeaderDocument` endpoint.
#[derive(Debug, Clone)]
pub struct GrobidClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl GrobidClient {
    pub fn new(client: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_header(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ExtractError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let part = Part::bytes(bytes)
            .file_name(file_name(path))
            .mime_str("application/pdf")?;
        let form = Form::new().part(INPUT_FIELD, part);

        let resp = self
            .client
            .post(&self.url)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(ExtractError::Status(status));
        }

        Ok(resp.text().await?)
    }
}

impl MetadataExtractor for GrobidClient {
    fn extract<'a>(
        &'a self,
        path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<Metadata, ExtractError>> + Send + 'a>> {
        Box::pin(async move {
            let body = self.fetch_header(path).await?;
            Ok(title_from_response(&body, path))
        })
    }
}

/// Pick the title out of a GROBID response, falling back to the file stem.
pub fn title_from_response(xml: &str, path: &Path) -> Metadata {
    match parse_title(xml) {
        Ok(Some(title)) => Metadata {
            title,
            source: TitleSource::Grobid,
        },
        Ok(None) => Metadata {
            title: file_stem(path),
            source: TitleSource::FileStem,
        },
        Err(e) => {
            tracing::warn!(file = %file_name(path), error = %e, "unreadable GROBID response");
            Metadata {
                title: file_stem(path),
                source: TitleSource::FileStem,
            }
        }
    }
}

/// Text of the first `title` directly under a `titleStmt`, trimmed.
///
/// Elements are matched by local name, so the TEI namespace is irrelevant.
/// Returns `Ok(None)` when the element is missing or blank. The whole
/// document is read so that malformed input is always reported.
pub fn parse_title(xml: &str) -> Result<Option<String>, TitleParseError> {
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut saw_root = false;
    // Stack depth of the title element currently being read.
    let mut capture_at: Option<usize> = None;
    let mut text = String::new();
    let mut found: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                saw_root = true;
                let local = e.local_name();
                if found.is_none()
                    && capture_at.is_none()
                    && is_title_in_stmt(local.as_ref(), &stack)
                {
                    capture_at = Some(stack.len());
                }
                stack.push(local.as_ref().to_vec());
            }
            Event::Empty(e) => {
                saw_root = true;
                if found.is_none()
                    && capture_at.is_none()
                    && is_title_in_stmt(e.local_name().as_ref(), &stack)
                {
                    found = Some(String::new());
                }
            }
            Event::Text(e) if capture_at.is_some() => {
                text.push_str(&e.unescape().map_err(quick_xml::Error::from)?);
            }
            Event::CData(e) if capture_at.is_some() => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Event::End(_) => {
                stack.pop();
                if capture_at == Some(stack.len()) {
                    found = Some(std::mem::take(&mut text));
                    capture_at = None;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(TitleParseError::Unclosed(
            String::from_utf8_lossy(open).into_owned(),
        ));
    }
    if !saw_root {
        return Err(TitleParseError::NoRoot);
    }

    Ok(found
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty()))
}

fn is_title_in_stmt(local: &[u8], stack: &[Vec<u8>]) -> bool {
    local == b"title" && stack.last().is_some_and(|parent| parent == b"titleStmt")
}

/// File name without its extension, used when no title is available.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEI: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TEI xmlns="http://www.tei-c.org/ns/1.0">
  <teiHeader xml:lang="en">
    <fileDesc>
      <titleStmt>
        <title level="a" type="main">  Deep Learning Survey  </title>
      </titleStmt>
      <sourceDesc><biblStruct><analytic><title>Wrong One</title></analytic></biblStruct></sourceDesc>
    </fileDesc>
  </teiHeader>
</TEI>"#;

    #[test]
    fn test_title_is_trimmed() {
        assert_eq!(
            parse_title(TEI).unwrap().as_deref(),
            Some("Deep Learning Survey")
        );
    }

    #[test]
    fn test_title_without_namespace() {
        let xml = "<TEI><titleStmt><title>Plain</title></titleStmt></TEI>";
        assert_eq!(parse_title(xml).unwrap().as_deref(), Some("Plain"));
    }

    #[test]
    fn test_title_with_prefixed_namespace() {
        let xml = r#"<tei:TEI xmlns:tei="http://www.tei-c.org/ns/1.0"><tei:titleStmt><tei:title>Prefixed</tei:title></tei:titleStmt></tei:TEI>"#;
        assert_eq!(parse_title(xml).unwrap().as_deref(), Some("Prefixed"));
    }

    #[test]
    fn test_title_keeps_inline_markup_text_and_entities() {
        let xml = "<TEI><titleStmt><title>On <hi>x</hi> &amp; y</title></titleStmt></TEI>";
        assert_eq!(parse_title(xml).unwrap().as_deref(), Some("On x & y"));
    }

    #[test]
    fn test_title_outside_title_stmt_is_ignored() {
        let xml = "<TEI><analytic><title>Not Here</title></analytic></TEI>";
        assert_eq!(parse_title(xml).unwrap(), None);
    }

    #[test]
    fn test_blank_and_empty_titles() {
        let blank = "<TEI><titleStmt><title>   \n </title></titleStmt></TEI>";
        assert_eq!(parse_title(blank).unwrap(), None);
        let empty = "<TEI><titleStmt><title/></titleStmt></TEI>";
        assert_eq!(parse_title(empty).unwrap(), None);
    }

    #[test]
    fn test_first_title_wins_even_if_blank() {
        let xml = "<TEI><titleStmt><title></title><title>Second</title></titleStmt></TEI>";
        assert_eq!(parse_title(xml).unwrap(), None);
    }

    #[test]
    fn test_malformed_documents() {
        let mismatched = "<TEI><titleStmt><title>Foo</titleStmt></TEI>";
        assert!(parse_title(mismatched).is_err());

        let truncated = "<TEI><titleStmt><title>Foo</title>";
        assert!(matches!(
            parse_title(truncated),
            Err(TitleParseError::Unclosed(name)) if name == "titleStmt"
        ));

        assert!(matches!(
            parse_title("this is not xml"),
            Err(TitleParseError::NoRoot)
        ));
        assert!(matches!(parse_title(""), Err(TitleParseError::NoRoot)));
    }

    #[test]
    fn test_fallback_uses_file_stem() {
        let path = Path::new("/papers/new/notes.v2.pdf");
        let meta = title_from_response("<TEI><teiHeader/></TEI>", path);
        assert_eq!(meta.title, "notes.v2");
        assert_eq!(meta.source, TitleSource::FileStem);

        let meta = title_from_response("<TEI><oops></TEI>", path);
        assert_eq!(meta.title, "notes.v2");
        assert_eq!(meta.source, TitleSource::FileStem);

        let meta = title_from_response(TEI, path);
        assert_eq!(meta.title, "Deep Learning Survey");
        assert_eq!(meta.source, TitleSource::Grobid);
    }
}
