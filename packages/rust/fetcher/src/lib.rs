//! Network fetch stage: URL → [`SourceDocument`].
//!
//! This crate provides:
//! - [`Fetcher`] — HTTP client with timeout, retry-with-backoff, and content
//!   type checks
//! - [`DocumentSource`] — the seam the orchestrator consumes, substitutable
//!   in tests
//! - [`parse`] — pure HTML/plain-text structural parsing
//!
//! [`SourceDocument`]: quizforge_shared::SourceDocument

pub mod fetch;
pub mod parse;

pub use fetch::{DocumentSource, FetchConfig, Fetcher};
pub use parse::{parse_html, parse_plain_text};
