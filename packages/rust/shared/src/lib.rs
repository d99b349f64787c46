//! Shared types, error model, and configuration for QuizForge.
//!
//! This crate is the foundation depended on by all other QuizForge crates.
//! It provides:
//! - [`QuizForgeError`] — the unified error type
//! - Domain types ([`SourceDocument`], [`ContentBlock`], [`KnowledgePoint`],
//!   [`QuizItem`], [`QuizSite`])
//! - [`RetryPolicy`] and [`CancelToken`] shared by every remote-calling stage
//! - Configuration ([`AppConfig`], config loading)

pub mod cancel;
pub mod config;
pub mod error;
pub mod retry;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use cancel::CancelToken;
pub use config::{
    AiPoliciesConfig, AppConfig, DefaultsConfig, FetchPoliciesConfig, OpenRouterConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{QuizForgeError, Result};
pub use retry::RetryPolicy;
pub use types::{
    BlockId, ContentBlock, Difficulty, KnowledgePoint, QuizItem, QuizSite, RunId,
    SourceDocument, StructuralBlock, normalize_text,
};
