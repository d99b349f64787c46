//! Core domain types for the content-to-quiz pipeline.
//!
//! All entities are created once per pipeline run by their producing stage
//! and never mutated afterwards. The [`QuizSite`] is the terminal artifact
//! handed to the presentation/persistence layer; it is a plain serde value
//! with no behavior embedded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// BlockId
// ---------------------------------------------------------------------------

/// Stable, sequential identifier for a [`ContentBlock`] within one run.
///
/// Assigned by the extractor in document order; rerunning the extractor on
/// the same document yields the same ids.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BlockId(pub u32);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SourceDocument
// ---------------------------------------------------------------------------

/// A structural segment of the fetched page, pre-cleanup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralBlock {
    /// Whitespace-normalized text content.
    pub text: String,
    /// Heading level (1–6) if this block came from an `<h*>` element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_level: Option<u8>,
}

/// The fetcher's output: normalized text plus structural hints.
///
/// Immutable once produced; owned exclusively by the pipeline run that
/// created it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    /// The URL the document was fetched from.
    pub url: String,
    /// Page title, if one could be extracted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// When the fetch completed.
    pub fetched_at: DateTime<Utc>,
    /// SHA-256 hash of the raw response body.
    pub content_hash: String,
    /// Full normalized plain text of the page.
    pub raw_text: String,
    /// Ordered structural segments (headings and content blocks).
    pub blocks: Vec<StructuralBlock>,
}

// ---------------------------------------------------------------------------
// ContentBlock
// ---------------------------------------------------------------------------

/// A cleaned, bounded segment of source text used as a unit of AI input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Sequential id, unique within a run, in document order.
    pub id: BlockId,
    /// Non-empty cleaned text.
    pub text: String,
    /// Rough token estimate used for batching (ceil of chars / 4).
    pub approx_tokens: usize,
}

impl ContentBlock {
    /// Estimate the token count of a piece of text.
    pub fn approx_tokens_of(text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }
}

// ---------------------------------------------------------------------------
// KnowledgePoint
// ---------------------------------------------------------------------------

/// A single named concept extracted from source content, with an AI-authored
/// explanation.
///
/// Labels are unique within a run after normalization (casefold + collapsed
/// whitespace); the merge step in the synthesizer enforces this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgePoint {
    /// Deterministic id of the form `kp-{n}`, assigned after merging.
    pub id: String,
    /// Human-readable topic label, unique within the run.
    pub label: String,
    /// Concise non-empty explanation of the concept.
    pub summary: String,
    /// Content blocks this point was derived from. Sorted, deduplicated,
    /// never empty.
    pub source_blocks: Vec<BlockId>,
}

/// Normalize a label or answer string for uniqueness/equality comparison:
/// casefold and collapse runs of whitespace.
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ---------------------------------------------------------------------------
// QuizItem
// ---------------------------------------------------------------------------

/// Difficulty tag, derived deterministically from text length so repeated
/// runs over the same content agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Easy => write!(f, "easy"),
            Self::Medium => write!(f, "medium"),
            Self::Hard => write!(f, "hard"),
        }
    }
}

/// One practice question tied back to a knowledge point.
///
/// Invariants (enforced by the generator's local validation, never trusted
/// to the AI): prompt and answer non-empty; 2–5 distractors, mutually
/// distinct and distinct from the answer after normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizItem {
    /// Deterministic id of the form `q-{n}`.
    pub id: String,
    /// Id of the knowledge point this question tests. Must resolve within
    /// the same run.
    pub knowledge_point_id: String,
    /// Question text.
    pub prompt: String,
    /// The correct answer choice.
    pub correct_answer: String,
    /// Incorrect answer choices, in presentation order.
    pub distractors: Vec<String>,
    /// Derived difficulty tag.
    pub difficulty: Difficulty,
}

// ---------------------------------------------------------------------------
// QuizSite
// ---------------------------------------------------------------------------

/// The terminal artifact of a pipeline run, consumed by the serving layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSite {
    /// The URL the content came from.
    pub source_url: String,
    /// Page title carried through from the fetch, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// When packaging completed.
    pub generated_at: DateTime<Utc>,
    /// All knowledge points, in document order.
    pub knowledge_points: Vec<KnowledgePoint>,
    /// All quiz items, in knowledge-point order.
    pub quiz_items: Vec<QuizItem>,
}
