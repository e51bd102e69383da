//! Remote PDF sources

pub mod fetcher;

pub use fetcher::{filename_from_url, parse_url, Fetcher, DEFAULT_REMOTE_FILENAME};
