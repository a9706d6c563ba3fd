//! Content Downloader Core Library
//!
//! This library crawls a paginated site hierarchy (top-level pages →
//! container pages → leaf pages), discovers downloadable resource links,
//! and fetches them to disk with collision-safe atomic writes.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`render`] - Page rendering capability (navigate, query-by-selector)
//! - [`session`] - Bounded pool of render sessions with login replay
//! - [`crawl`] - Pagination walker and two-level crawl orchestration
//! - [`download`] - Streaming download workers with collision policies
//! - [`progress`] - Live progress reporting over shared counters
//! - [`context`] - Per-run shared counters and completion flags
//! - [`config`] - Validated run configuration built from CLI arguments

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod context;
pub mod crawl;
pub mod download;
pub mod progress;
pub mod render;
pub mod session;

// Re-export commonly used types
pub use config::{AuthParams, CollisionPolicy, Config, ConfigError, FieldFill};
pub use context::RunContext;
pub use crawl::{LinkFinder, PageWalker, WorkQueue};
pub use download::{DownloadTarget, Downloader, EngineError, FetchError};
pub use render::{HtmlSessionFactory, RenderError, RenderSession, SessionFactory};
pub use session::{SessionError, SessionLease, SessionPool};
