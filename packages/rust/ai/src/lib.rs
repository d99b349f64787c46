//! AI text-generation capability for QuizForge.
//!
//! This crate provides:
//! - [`AiClient`] — the capability trait the synthesis/generation stages consume
//! - [`OpenRouterClient`] — the production reqwest-backed implementation
//! - [`AiError`] — the rate-limit/timeout/other taxonomy inspected by retries
//! - [`complete_with_retry`] — policy-driven retry around any client
//! - [`testing`] — scripted fakes for downstream stage tests

pub mod client;
pub mod error;
pub mod json;
pub mod openrouter;
pub mod testing;

pub use client::{AiClient, CompletionRequest, complete_with_retry};
pub use error::AiError;
pub use json::extract_json;
pub use openrouter::{OpenRouterClient, OpenRouterConfig};
