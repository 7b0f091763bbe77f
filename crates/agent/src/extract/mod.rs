//! Plain-text extraction for the document types the summarizer accepts.

use thiserror::Error;

mod ooxml;
mod pdf;
mod text;

pub const PDF: &str = "application/pdf";
pub const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const PPTX: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const TEXT: &str = "text/plain";
pub const CSV: &str = "text/csv";

/// A page, slide or sheet of extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub page: Option<String>,
    pub text: String,
}

impl Section {
    pub fn new(page: Option<String>, text: impl Into<String>) -> Self {
        Self {
            page,
            text: text.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("invalid document archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("invalid document XML: {0}")]
    Xml(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::Error> for ExtractError {
    fn from(err: quick_xml::Error) -> Self {
        ExtractError::Xml(err.to_string())
    }
}

/// Whether [`extract_text`] handles `mime`.
pub fn is_supported(mime: &str) -> bool {
    matches!(
        essence(mime).as_str(),
        PDF | DOCX | PPTX | XLSX | TEXT | CSV
    )
}

/// `text/plain; charset=utf-8` → `text/plain`
fn essence(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn extract_text(bytes: &[u8], mime: &str) -> Result<Vec<Section>, ExtractError> {
    match essence(mime).as_str() {
        PDF => pdf::extract(bytes),
        DOCX => ooxml::docx(bytes),
        PPTX => ooxml::pptx(bytes),
        XLSX => ooxml::xlsx(bytes),
        TEXT | CSV => Ok(vec![Section::new(None, text::decode(bytes))]),
        _ => Err(ExtractError::Unsupported(mime.to_string())),
    }
}

/// [`extract_text`] on the blocking pool.
pub async fn extract_text_blocking(
    bytes: Vec<u8>,
    mime: String,
) -> Result<Vec<Section>, ExtractError> {
    tokio::task::spawn_blocking(move || extract_text(&bytes, &mime))
        .await
        .map_err(|e| ExtractError::Io(std::io::Error::other(e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_mime_is_unsupported_not_a_panic() {
        let err = extract_text(b"\x89PNG", "image/png").unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported(m) if m == "image/png"));
        assert!(!is_supported("application/zip"));
    }

    #[test]
    fn mime_parameters_are_ignored() {
        assert!(is_supported("Text/Plain; charset=utf-8"));
        let sections = extract_text(b"hello", "text/plain; charset=utf-8").unwrap();
        assert_eq!(sections, vec![Section::new(None, "hello")]);
    }

    #[test]
    fn garbage_office_file_is_an_archive_error() {
        let err = extract_text(b"not a zip", DOCX).unwrap_err();
        assert!(matches!(err, ExtractError::Archive(_)));
    }

    #[tokio::test]
    async fn blocking_extraction_returns_sections() {
        let sections = extract_text_blocking(b"a,b\n1,2".to_vec(), CSV.to_string())
            .await
            .unwrap();
        assert_eq!(sections[0].text, "a,b\n1,2");
    }
}
