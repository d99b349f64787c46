//! Site packaging stage: pure assembly and cross-reference validation.
//!
//! No network or AI calls. A dangling reference here means an upstream stage
//! broke its contract; that is a bug and is surfaced as an internal
//! consistency error rather than a user-recoverable failure.

use std::collections::HashSet;

use chrono::Utc;

use quizforge_shared::{
    KnowledgePoint, QuizForgeError, QuizItem, QuizSite, Result, normalize_text,
};

/// Assemble the terminal [`QuizSite`] artifact.
pub fn package(
    source_url: &str,
    title: Option<String>,
    points: Vec<KnowledgePoint>,
    items: Vec<QuizItem>,
) -> Result<QuizSite> {
    let point_ids: HashSet<&str> = points.iter().map(|p| p.id.as_str()).collect();

    for item in &items {
        if !point_ids.contains(item.knowledge_point_id.as_str()) {
            return Err(QuizForgeError::internal(format!(
                "quiz item {} references unknown knowledge point {}",
                item.id, item.knowledge_point_id
            )));
        }
    }

    let mut labels = HashSet::new();
    for point in &points {
        if point.source_blocks.is_empty() {
            return Err(QuizForgeError::internal(format!(
                "knowledge point {} has no source blocks",
                point.id
            )));
        }
        if !labels.insert(normalize_text(&point.label)) {
            return Err(QuizForgeError::internal(format!(
                "duplicate normalized knowledge point label '{}'",
                point.label
            )));
        }
    }

    Ok(QuizSite {
        source_url: source_url.to_string(),
        title,
        generated_at: Utc::now(),
        knowledge_points: points,
        quiz_items: items,
    })
}
