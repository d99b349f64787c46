//! Quiz generation stage: knowledge points → validated quiz items.
//!
//! One AI call per knowledge point, fanned out under the concurrency bound.
//! Every reply is validated locally; a reply failing validation triggers
//! bounded regeneration, and an exhausted point is skipped rather than
//! failing the run. Difficulty is a deterministic local rule, never an AI
//! output.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use quizforge_ai::{AiClient, AiError, CompletionRequest, complete_with_retry, extract_json};
use quizforge_shared::{
    CancelToken, Difficulty, KnowledgePoint, QuizForgeError, QuizItem, Result, RetryPolicy,
    normalize_text,
};

use crate::fanout;
use crate::prompts;

/// Configuration for the generation stage.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Maximum concurrent AI calls.
    pub concurrency: usize,
    /// Retry policy for transient provider errors within one generation call.
    pub retry: RetryPolicy,
    /// Distractors requested per question.
    pub distractor_target: usize,
    /// Total generation attempts per point (first call + regenerations
    /// after validation failures).
    pub regen_attempts: u32,
    /// Token cap passed to the provider.
    pub max_tokens: Option<u32>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            retry: RetryPolicy::default(),
            distractor_target: 3,
            regen_attempts: 3,
            max_tokens: Some(512),
        }
    }
}

/// Result of the generation stage.
#[derive(Debug)]
pub struct GenerationOutput {
    /// Validated quiz items, in knowledge-point order.
    pub items: Vec<QuizItem>,
    /// Points skipped after exhausting regeneration attempts.
    pub points_skipped: usize,
}

/// The strict JSON shape demanded from the model.
#[derive(Debug, Deserialize)]
struct RawQuiz {
    prompt: String,
    correct_answer: String,
    #[serde(default)]
    distractors: Vec<String>,
}

/// A reply that passed local validation.
#[derive(Debug)]
struct ValidatedQuiz {
    prompt: String,
    correct_answer: String,
    distractors: Vec<String>,
}

/// Generate one validated quiz item per knowledge point where possible.
pub async fn generate<C: AiClient>(
    ai: &Arc<C>,
    url: &str,
    points: &[KnowledgePoint],
    config: &GeneratorConfig,
    cancel: &CancelToken,
) -> Result<GenerationOutput> {
    let config_owned = config.clone();
    let outcomes = fanout::run_ordered(
        points.to_vec(),
        config.concurrency,
        cancel,
        |_, point| {
            let ai = Arc::clone(ai);
            let config = config_owned.clone();
            let cancel = cancel.clone();
            async move { generate_for_point(ai, point, config, cancel).await }
        },
    )
    .await?;

    let mut items = Vec::new();
    let mut points_skipped = 0;

    for (point, outcome) in points.iter().zip(outcomes) {
        match outcome {
            Ok(valid) => {
                let difficulty = difficulty_for(&point.summary, &valid.correct_answer);
                items.push(QuizItem {
                    id: format!("q-{}", items.len()),
                    knowledge_point_id: point.id.clone(),
                    prompt: valid.prompt,
                    correct_answer: valid.correct_answer,
                    distractors: valid.distractors,
                    difficulty,
                });
            }
            Err(reason) => {
                warn!(point = %point.id, label = %point.label, %reason, "knowledge point skipped");
                points_skipped += 1;
            }
        }
    }

    // Points "skipped" because their calls were cancelled are not a
    // generation failure; report the cancellation itself.
    if cancel.is_cancelled() {
        return Err(QuizForgeError::Cancelled);
    }

    if items.is_empty() {
        return Err(QuizForgeError::generation(
            url,
            format!("no valid quiz item for any of {} knowledge points", points.len()),
        ));
    }

    info!(items = items.len(), points_skipped, "generation complete");
    Ok(GenerationOutput {
        items,
        points_skipped,
    })
}

/// Generation loop for one point: transient provider errors are retried by
/// the policy inside each call; validation failures consume regeneration
/// attempts. `Err` carries the skip reason.
async fn generate_for_point<C: AiClient>(
    ai: Arc<C>,
    point: KnowledgePoint,
    config: GeneratorConfig,
    cancel: CancelToken,
) -> std::result::Result<ValidatedQuiz, String> {
    let mut req = CompletionRequest::new(prompts::quiz_prompt(&point, config.distractor_target))
        .with_system(prompts::SYSTEM);
    req.max_tokens = config.max_tokens;

    let mut last_reason = String::new();
    for attempt in 0..config.regen_attempts.max(1) {
        let reply = match complete_with_retry(ai.as_ref(), &req, &config.retry, &cancel).await {
            Ok(reply) => reply,
            // A cancelled call never regenerates; the stage maps it back to
            // the run-level cancellation error.
            Err(AiError::Cancelled) => return Err(AiError::Cancelled.to_string()),
            Err(e) => {
                last_reason = e.to_string();
                continue;
            }
        };

        match validate_reply(&reply) {
            Ok(valid) => return Ok(valid),
            Err(reason) => {
                warn!(point = %point.id, attempt, %reason, "quiz reply rejected, regenerating");
                last_reason = reason;
            }
        }
    }

    Err(last_reason)
}

/// Local validation of a model reply. Nothing structural is trusted to the
/// AI output.
fn validate_reply(reply: &str) -> std::result::Result<ValidatedQuiz, String> {
    let raw: RawQuiz = serde_json::from_str(extract_json(reply))
        .map_err(|e| format!("reply was not a valid quiz object: {e}"))?;

    let prompt = raw.prompt.trim().to_string();
    let correct_answer = raw.correct_answer.trim().to_string();
    if prompt.is_empty() {
        return Err("empty prompt".into());
    }
    if correct_answer.is_empty() {
        return Err("empty correct answer".into());
    }

    let answer_key = normalize_text(&correct_answer);
    let mut seen = std::collections::HashSet::new();
    let mut distractors = Vec::new();
    for d in raw.distractors {
        let d = d.trim().to_string();
        if d.is_empty() {
            continue;
        }
        let key = normalize_text(&d);
        if key == answer_key {
            // The answer leaked into the distractor set.
            continue;
        }
        if seen.insert(key) {
            distractors.push(d);
        }
    }

    if distractors.len() < 2 {
        return Err(format!(
            "only {} distinct valid distractors after dedup",
            distractors.len()
        ));
    }
    distractors.truncate(5);

    Ok(ValidatedQuiz {
        prompt,
        correct_answer,
        distractors,
    })
}

/// Deterministic difficulty from text length: longer, more technical
/// material reads harder. Reproducible across runs by construction.
fn difficulty_for(summary: &str, answer: &str) -> Difficulty {
    let combined = summary.chars().count() + answer.chars().count();
    if combined < 120 {
        Difficulty::Easy
    } else if combined < 320 {
        Difficulty::Medium
    } else {
        Difficulty::Hard
    }
}
