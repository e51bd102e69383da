//! PDF Extractor Library
//!
//! An HTTP service that extracts text and metadata from PDFs:
//! - `POST /extract/text`: full text and metadata from an uploaded PDF
//! - `POST /extract/text/pages`: text of selected pages from an uploaded PDF
//! - `POST /extract/text/url`: full text and metadata from a PDF at a URL
//! - `POST /extract/text/pages/url`: text of selected pages from a PDF at a URL
//! - `GET /healthz`: liveness check

pub mod config;
pub mod error;
pub mod pdf;
pub mod server;
pub mod source;

pub use config::{ConfigError, Settings};
pub use error::{Error, ErrorKind, Result};
pub use server::{
    router, run_server, AppState, ExtractTextResponse, PagesPayload, PagesResponse,
    UrlPagesRequest, UrlRequest,
};
