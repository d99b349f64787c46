//! Knowledge-point synthesis stage: content blocks → merged knowledge points.
//!
//! Blocks are packed into token-budgeted batches, each batch goes to the AI
//! concurrently through the fan-out pool, and the typed replies are merged:
//! labels normalize-equal merge into one point with unioned source blocks.
//! A batch whose calls keep failing is skipped; the stage only fails when
//! every batch does.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info, warn};

use quizforge_ai::{AiClient, CompletionRequest, extract_json};
use quizforge_shared::{
    BlockId, CancelToken, ContentBlock, KnowledgePoint, QuizForgeError, Result, RetryPolicy,
    normalize_text,
};

use crate::fanout;
use crate::prompts;

/// Configuration for the synthesis stage.
#[derive(Debug, Clone)]
pub struct SynthesizerConfig {
    /// Maximum concurrent AI calls.
    pub concurrency: usize,
    /// Retry policy per batch; malformed replies and transient provider
    /// errors both consume attempts.
    pub retry: RetryPolicy,
    /// Approximate token budget per batch of blocks.
    pub batch_token_budget: usize,
    /// Token cap passed to the provider.
    pub max_tokens: Option<u32>,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            retry: RetryPolicy::default(),
            batch_token_budget: 1200,
            max_tokens: Some(1024),
        }
    }
}

/// Result of the synthesis stage.
#[derive(Debug)]
pub struct SynthesisOutput {
    /// Merged knowledge points in document order.
    pub points: Vec<KnowledgePoint>,
    /// Number of batches sent to the AI.
    pub batches_total: usize,
    /// Batches skipped after exhausting retries.
    pub batches_failed: usize,
}

/// A (label, summary) pair attributed to source blocks, pre-merge.
#[derive(Debug, Clone)]
struct RawPair {
    label: String,
    summary: String,
    source_blocks: Vec<BlockId>,
}

/// The strict JSON shape demanded from the model.
#[derive(Debug, Deserialize)]
struct RawPoint {
    label: String,
    summary: String,
    #[serde(default)]
    block: Option<String>,
}

/// Synthesize knowledge points from content blocks.
pub async fn synthesize<C: AiClient>(
    ai: &Arc<C>,
    url: &str,
    blocks: &[ContentBlock],
    config: &SynthesizerConfig,
    cancel: &CancelToken,
) -> Result<SynthesisOutput> {
    let batches = pack_batches(blocks, config.batch_token_budget);
    let batches_total = batches.len();
    debug!(blocks = blocks.len(), batches = batches_total, "synthesis fan-out starting");

    let retry = config.retry;
    let max_tokens = config.max_tokens;
    let outcomes = fanout::run_ordered(batches, config.concurrency, cancel, |index, batch| {
        let ai = Arc::clone(ai);
        async move { synthesize_batch(ai, index, batch, retry, max_tokens).await }
    })
    .await?;

    let mut raw_pairs: Vec<RawPair> = Vec::new();
    let mut batches_failed = 0;
    let mut last_error = String::new();

    for (index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(pairs) => raw_pairs.extend(pairs),
            Err(reason) => {
                warn!(batch = index, %reason, "synthesis batch skipped");
                batches_failed += 1;
                last_error = reason;
            }
        }
    }

    if batches_failed == batches_total {
        return Err(QuizForgeError::synthesis(
            url,
            format!("all {batches_total} batches failed; last error: {last_error}"),
        ));
    }

    let points = merge_points(raw_pairs);
    if points.is_empty() {
        return Err(QuizForgeError::synthesis(
            url,
            "model produced no knowledge points",
        ));
    }

    info!(
        points = points.len(),
        batches_failed, batches_total, "synthesis complete"
    );

    Ok(SynthesisOutput {
        points,
        batches_total,
        batches_failed,
    })
}

/// Greedily pack consecutive blocks into batches within the token budget.
/// An oversized single block still gets its own batch.
fn pack_batches(blocks: &[ContentBlock], budget: usize) -> Vec<Vec<ContentBlock>> {
    let mut batches: Vec<Vec<ContentBlock>> = Vec::new();
    let mut current: Vec<ContentBlock> = Vec::new();
    let mut tokens = 0usize;

    for block in blocks {
        if !current.is_empty() && tokens + block.approx_tokens > budget {
            batches.push(std::mem::take(&mut current));
            tokens = 0;
        }
        tokens += block.approx_tokens;
        current.push(block.clone());
    }
    if !current.is_empty() {
        batches.push(current);
    }

    batches
}

/// One batch's call loop. malformed replies and transient errors consume
/// retry attempts; a permanent provider error skips the batch immediately.
/// `Err` carries the skip reason.
async fn synthesize_batch<C: AiClient>(
    ai: Arc<C>,
    index: usize,
    batch: Vec<ContentBlock>,
    retry: RetryPolicy,
    max_tokens: Option<u32>,
) -> std::result::Result<Vec<RawPair>, String> {
    let mut req = CompletionRequest::new(prompts::knowledge_prompt(&batch))
        .with_system(prompts::SYSTEM);
    req.max_tokens = max_tokens;

    let mut attempt = 0;
    loop {
        let failure = match ai.complete(&req).await {
            Ok(reply) => match parse_points(&reply, &batch) {
                Ok(pairs) => return Ok(pairs),
                Err(reason) => reason,
            },
            Err(e) if e.is_transient() => e.to_string(),
            Err(e) => return Err(e.to_string()),
        };

        match retry.delay_for(attempt) {
            Some(delay) => {
                warn!(batch = index, attempt, reason = %failure, "retrying synthesis batch");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            None => return Err(failure),
        }
    }
}

/// Parse a model reply into attributed pairs. The reply is validated here,
/// at the boundary; loosely-typed data never flows further.
fn parse_points(
    reply: &str,
    batch: &[ContentBlock],
) -> std::result::Result<Vec<RawPair>, String> {
    let raw: Vec<RawPoint> = serde_json::from_str(extract_json(reply))
        .map_err(|e| format!("reply was not a valid point array: {e}"))?;

    let batch_ids: Vec<BlockId> = batch.iter().map(|b| b.id).collect();
    let pairs = raw
        .into_iter()
        .filter_map(|point| {
            let label = point.label.trim().to_string();
            let summary = point.summary.trim().to_string();
            if label.is_empty() || summary.is_empty() {
                return None;
            }
            // Attribute to the named block when the model identifies one we
            // actually sent; otherwise to the whole batch.
            let source_blocks = point
                .block
                .as_deref()
                .and_then(|name| batch_ids.iter().find(|id| id.to_string() == name))
                .map(|id| vec![*id])
                .unwrap_or_else(|| batch_ids.clone());
            Some(RawPair {
                label,
                summary,
                source_blocks,
            })
        })
        .collect();

    Ok(pairs)
}

/// Merge pairs whose normalized labels match: union source blocks, keep the
/// longest summary (earliest produced wins ties), order by first source
/// block then first occurrence, then assign deterministic ids.
fn merge_points(raw_pairs: Vec<RawPair>) -> Vec<KnowledgePoint> {
    struct Merged {
        label: String,
        summary: String,
        source_blocks: BTreeSet<BlockId>,
    }

    let mut merged: Vec<Merged> = Vec::new();
    let mut index_by_key: std::collections::HashMap<String, usize> =
        std::collections::HashMap::new();

    for pair in raw_pairs {
        let key = normalize_text(&pair.label);
        match index_by_key.get(&key) {
            Some(&i) => {
                let entry = &mut merged[i];
                entry.source_blocks.extend(pair.source_blocks);
                if pair.summary.len() > entry.summary.len() {
                    entry.summary = pair.summary;
                }
            }
            None => {
                index_by_key.insert(key, merged.len());
                merged.push(Merged {
                    label: pair.label,
                    summary: pair.summary,
                    source_blocks: pair.source_blocks.into_iter().collect(),
                });
            }
        }
    }

    // Stable sort: ties on first block keep first-produced order.
    merged.sort_by_key(|m| m.source_blocks.first().copied());

    merged
        .into_iter()
        .enumerate()
        .map(|(i, m)| KnowledgePoint {
            id: format!("kp-{i}"),
            label: m.label,
            summary: m.summary,
            source_blocks: m.source_blocks.into_iter().collect(),
        })
        .collect()
}
