//! PDF processing layer
//!
//! A thin facade over lopdf: open a document from memory, read its
//! information dictionary and pull plain text per page.

mod extractor;

pub use extractor::{PageText, PdfExtractor, PdfMetadata};
