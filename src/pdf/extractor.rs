//! Text and metadata extraction facade over lopdf

use crate::error::{Error, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::Serialize;

/// Separator placed between page texts in full-document extraction
const PAGE_SEPARATOR: &str = "\n\n";

/// Pages between progress log lines
const PROGRESS_INTERVAL: usize = 50;

/// Document information dictionary fields plus page count
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PdfMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub pages: usize,
}

/// Text of a single page (0-indexed)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub index: usize,
    pub text: String,
}

/// An opened PDF, held for the duration of a single request
pub struct PdfExtractor {
    document: Document,
    /// Page numbers as lopdf knows them (1-based), in document order
    page_numbers: Vec<u32>,
}

impl std::fmt::Debug for PdfExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfExtractor")
            .field("pages", &self.page_numbers.len())
            .finish()
    }
}

impl PdfExtractor {
    /// Open a PDF from bytes
    pub fn open(data: &[u8]) -> Result<Self> {
        if data.len() < 4 || &data[0..4] != b"%PDF" {
            return Err(Error::parse("missing %PDF header"));
        }

        let document = Document::load_mem(data).map_err(Error::parse)?;
        document
            .catalog()
            .map_err(|e| Error::parse(format!("no document catalog: {}", e)))?;

        let page_numbers = document.get_pages().into_keys().collect();

        Ok(Self {
            document,
            page_numbers,
        })
    }

    /// Get the number of pages
    pub fn page_count(&self) -> usize {
        self.page_numbers.len()
    }

    /// Get document metadata. Missing or empty fields are `None`.
    pub fn metadata(&self) -> PdfMetadata {
        let info = self.info_dictionary();
        let field = |key: &[u8]| info.and_then(|dict| self.text_field(dict, key));

        PdfMetadata {
            title: field(b"Title"),
            author: field(b"Author"),
            subject: field(b"Subject"),
            keywords: field(b"Keywords"),
            pages: self.page_count(),
        }
    }

    /// Extract text from every page, joined with a blank line and trimmed
    pub fn extract_all_text(&self) -> String {
        let total = self.page_count();
        let mut parts = Vec::with_capacity(total);

        for index in 0..total {
            parts.push(self.page_text(index));
            let done = index + 1;
            if done % PROGRESS_INTERVAL == 0 {
                tracing::debug!(processed = done, total, "extracting pages");
            }
        }

        parts.join(PAGE_SEPARATOR).trim().to_string()
    }

    /// Extract text for the requested page indices.
    ///
    /// Results keep the requested order; indices outside `[0, page_count)`
    /// are skipped.
    pub fn extract_pages_text(&self, indices: &[i64]) -> Vec<PageText> {
        indices
            .iter()
            .filter_map(|&idx| usize::try_from(idx).ok())
            .filter(|&idx| idx < self.page_count())
            .map(|index| PageText {
                index,
                text: self.page_text(index),
            })
            .collect()
    }

    /// Text of one in-range page, with trailing whitespace removed
    fn page_text(&self, index: usize) -> String {
        let page_number = self.page_numbers[index];
        match self.document.extract_text(&[page_number]) {
            Ok(text) => text.trim_end().to_string(),
            Err(e) => {
                tracing::warn!(page = index, error = %e, "page text could not be decoded");
                String::new()
            }
        }
    }

    fn info_dictionary(&self) -> Option<&Dictionary> {
        let info = self.document.trailer.get(b"Info").ok()?;
        self.resolve(info)?.as_dict().ok()
    }

    fn text_field(&self, dict: &Dictionary, key: &[u8]) -> Option<String> {
        let value = self.resolve(dict.get(key).ok()?)?;
        match value {
            Object::String(bytes, _) => {
                let text = decode_text_string(bytes);
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            _ => None,
        }
    }

    fn resolve<'a>(&'a self, object: &'a Object) -> Option<&'a Object> {
        match object {
            Object::Reference(id) => self.get_object(*id),
            other => Some(other),
        }
    }

    fn get_object(&self, id: ObjectId) -> Option<&Object> {
        self.document.get_object(id).ok()
    }
}

/// Decode a PDF text string: UTF-16BE when it carries a byte order mark,
/// otherwise single-byte PDFDocEncoding (read as Latin-1).
fn decode_text_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8_lossy(rest).into_owned(),
        _ => bytes.iter().map(|&b| b as char).collect(),
    }
}
