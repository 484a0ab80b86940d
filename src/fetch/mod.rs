//! Downloads and archive extraction.

pub mod archive;
pub mod download;

pub use archive::{extract_zip, ExtractSummary};
pub use download::{url_extension, Downloader, HttpDownloader, MemoryDownloader};
