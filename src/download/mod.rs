//! Streaming downloads with collision-safe atomic writes.
//!
//! Targets discovered by the crawl are fetched by a bounded worker pool
//! ([`Downloader`]), streamed into temp files inside the output directory,
//! and atomically renamed into place under the configured collision policy
//! (Overwrite, Rename-with-suffix, or Ignore). Filename derivation and the
//! free-name search live in [`filename`].

mod engine;
mod error;
pub mod filename;

pub use engine::{DownloadTarget, Downloader, EngineError};
pub use error::FetchError;
