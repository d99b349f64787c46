//! End-to-end pipeline: URL → fetch → extract → synthesize → generate → package.
//!
//! Stages run strictly sequentially; concurrency lives inside the synthesis
//! and generation fan-outs. A failure in any stage moves the run to its
//! failed terminal state and returns the typed error unchanged; there is no
//! automatic whole-run retry. Cancellation is checked at every stage
//! boundary and raced inside the fan-outs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, instrument};
use url::Url;

use quizforge_ai::AiClient;
use quizforge_extractor::ExtractOptions;
use quizforge_fetcher::DocumentSource;
use quizforge_shared::{CancelToken, QuizForgeError, QuizSite, Result, RunId};

use crate::generator::{self, GeneratorConfig};
use crate::packager;
use crate::synthesizer::{self, SynthesizerConfig};

// ---------------------------------------------------------------------------
// Stage machine
// ---------------------------------------------------------------------------

/// Pipeline run states. `Failed` is reachable from every non-terminal state
/// and carries the triggering error out through the run's return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Fetching,
    Extracting,
    Synthesizing,
    Generating,
    Packaging,
    Complete,
    Failed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Synthesizing => "synthesizing",
            Self::Generating => "generating",
            Self::Packaging => "packaging",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// Config & outcome
// ---------------------------------------------------------------------------

/// Configuration for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Extraction thresholds.
    pub extract: ExtractOptions,
    /// Synthesis stage settings.
    pub synthesizer: SynthesizerConfig,
    /// Generation stage settings.
    pub generator: GeneratorConfig,
}

/// Counters describing what one run produced and skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunStats {
    /// Content blocks after extraction.
    pub blocks: usize,
    /// Knowledge points after merging.
    pub knowledge_points: usize,
    /// Validated quiz items.
    pub quiz_items: usize,
    /// Synthesis batches skipped after retries.
    pub batches_skipped: usize,
    /// Knowledge points with no valid quiz item.
    pub points_skipped: usize,
}

/// Result of a completed pipeline run.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// Run identifier.
    pub run_id: RunId,
    /// The assembled site artifact.
    pub site: QuizSite,
    /// Run counters.
    pub stats: RunStats,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called on every stage transition.
    fn stage(&self, stage: Stage);
    /// Called when the pipeline completes.
    fn done(&self, outcome: &PipelineOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _stage: Stage) {}
    fn done(&self, _outcome: &PipelineOutcome) {}
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Run the full pipeline for one URL.
#[instrument(skip_all, fields(url = %url))]
pub async fn run<S, C>(
    url: &Url,
    config: &PipelineConfig,
    source: &S,
    ai: &Arc<C>,
    progress: &dyn ProgressReporter,
    cancel: &CancelToken,
) -> Result<PipelineOutcome>
where
    S: DocumentSource,
    C: AiClient,
{
    let run_id = RunId::new();
    info!(%run_id, "starting pipeline run");

    match run_stages(run_id, url, config, source, ai, progress, cancel).await {
        Ok(outcome) => {
            progress.stage(Stage::Complete);
            progress.done(&outcome);
            info!(
                run_id = %outcome.run_id,
                blocks = outcome.stats.blocks,
                points = outcome.stats.knowledge_points,
                items = outcome.stats.quiz_items,
                elapsed_ms = outcome.elapsed.as_millis(),
                "pipeline complete"
            );
            Ok(outcome)
        }
        Err(e) => {
            progress.stage(Stage::Failed);
            error!(%run_id, error = %e, "pipeline failed");
            Err(e)
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_stages<S, C>(
    run_id: RunId,
    url: &Url,
    config: &PipelineConfig,
    source: &S,
    ai: &Arc<C>,
    progress: &dyn ProgressReporter,
    cancel: &CancelToken,
) -> Result<PipelineOutcome>
where
    S: DocumentSource,
    C: AiClient,
{
    let start = Instant::now();

    // --- Fetch ---
    ensure_live(cancel)?;
    progress.stage(Stage::Fetching);
    let doc = source.fetch(url, cancel).await?;

    // --- Extract ---
    ensure_live(cancel)?;
    progress.stage(Stage::Extracting);
    let blocks = quizforge_extractor::extract(&doc, &config.extract)?;

    // --- Synthesize ---
    ensure_live(cancel)?;
    progress.stage(Stage::Synthesizing);
    let synthesis =
        synthesizer::synthesize(ai, url.as_str(), &blocks, &config.synthesizer, cancel).await?;

    // --- Generate ---
    ensure_live(cancel)?;
    progress.stage(Stage::Generating);
    let generation =
        generator::generate(ai, url.as_str(), &synthesis.points, &config.generator, cancel)
            .await?;

    // --- Package ---
    ensure_live(cancel)?;
    progress.stage(Stage::Packaging);
    let stats = RunStats {
        blocks: blocks.len(),
        knowledge_points: synthesis.points.len(),
        quiz_items: generation.items.len(),
        batches_skipped: synthesis.batches_failed,
        points_skipped: generation.points_skipped,
    };
    let site = packager::package(
        url.as_str(),
        doc.title.clone(),
        synthesis.points,
        generation.items,
    )?;

    Ok(PipelineOutcome {
        run_id,
        site,
        stats,
        elapsed: start.elapsed(),
    })
}

fn ensure_live(cancel: &CancelToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(QuizForgeError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizforge_ai::AiError;
    use quizforge_ai::testing::ScriptedAi;
    use quizforge_shared::{RetryPolicy, SourceDocument, StructuralBlock, normalize_text};

    // -----------------------------------------------------------------------
    // Test document sources
    // -----------------------------------------------------------------------

    /// Serves a pre-baked document.
    struct StaticSource(SourceDocument);

    impl DocumentSource for StaticSource {
        fn fetch(
            &self,
            _url: &Url,
            _cancel: &CancelToken,
        ) -> impl Future<Output = Result<SourceDocument>> + Send {
            let doc = self.0.clone();
            async move { Ok(doc) }
        }
    }

    /// Fails every fetch, like a host that always times out.
    struct FailingSource;

    impl DocumentSource for FailingSource {
        fn fetch(
            &self,
            url: &Url,
            _cancel: &CancelToken,
        ) -> impl Future<Output = Result<SourceDocument>> + Send {
            let err = QuizForgeError::fetch(url.as_str(), "request timed out (after 3 attempts)");
            async move { Err(err) }
        }
    }

    fn single_paragraph_doc() -> SourceDocument {
        SourceDocument {
            url: "https://example.com/photo".into(),
            title: Some("Photosynthesis".into()),
            fetched_at: chrono::Utc::now(),
            content_hash: "hash".into(),
            raw_text: "Photosynthesis converts light into chemical energy.".into(),
            blocks: vec![StructuralBlock {
                text: "Photosynthesis converts light into chemical energy.".into(),
                heading_level: None,
            }],
        }
    }

    fn serial_config() -> PipelineConfig {
        PipelineConfig {
            synthesizer: SynthesizerConfig {
                concurrency: 1,
                retry: RetryPolicy::none(),
                ..SynthesizerConfig::default()
            },
            generator: GeneratorConfig {
                concurrency: 1,
                retry: RetryPolicy::none(),
                regen_attempts: 1,
                ..GeneratorConfig::default()
            },
            ..PipelineConfig::default()
        }
    }

    fn url() -> Url {
        Url::parse("https://example.com/photo").expect("url")
    }

    // -----------------------------------------------------------------------
    // Scenarios
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn single_paragraph_end_to_end() {
        let source = StaticSource(single_paragraph_doc());
        let ai = Arc::new(ScriptedAi::new(vec![
            Ok(r#"[{"label": "Photosynthesis", "summary": "Converts light into chemical energy.", "block": "b0"}]"#.into()),
            Ok(r#"{"prompt": "What does photosynthesis convert light into?", "correct_answer": "Chemical energy", "distractors": ["Sound energy", "Nuclear energy", "Mass"]}"#.into()),
        ]));

        let outcome = run(
            &url(),
            &serial_config(),
            &source,
            &ai,
            &SilentProgress,
            &CancelToken::new(),
        )
        .await
        .expect("run succeeds");

        assert_eq!(outcome.stats.blocks, 1);
        assert_eq!(outcome.site.knowledge_points.len(), 1);
        assert!(outcome.site.knowledge_points[0].label.contains("Photosynthesis"));

        let item = &outcome.site.quiz_items[0];
        assert!(item.prompt.to_lowercase().contains("photosynthesis"));
        assert!(!item.correct_answer.is_empty());
        let answer_key = normalize_text(&item.correct_answer);
        assert!(item.distractors.iter().all(|d| normalize_text(d) != answer_key));

        // Cross-references resolve within the site.
        let point_ids: Vec<&str> = outcome
            .site
            .knowledge_points
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert!(point_ids.contains(&item.knowledge_point_id.as_str()));
    }

    #[tokio::test]
    async fn failing_fetcher_terminates_with_fetch_error() {
        let ai = Arc::new(ScriptedAi::constant("unused"));
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            run(
                &url(),
                &serial_config(),
                &FailingSource,
                &ai,
                &SilentProgress,
                &CancelToken::new(),
            ),
        )
        .await
        .expect("must terminate, never hang");

        let err = result.expect_err("fetch fails");
        assert!(matches!(err, QuizForgeError::Fetch { .. }));
        assert_eq!(ai.calls(), 0);
    }

    #[tokio::test]
    async fn all_synthesis_failures_end_run_with_synthesis_error() {
        let source = StaticSource(single_paragraph_doc());
        let ai = Arc::new(ScriptedAi::always(AiError::RateLimited));

        let err = run(
            &url(),
            &serial_config(),
            &source,
            &ai,
            &SilentProgress,
            &CancelToken::new(),
        )
        .await
        .expect_err("no site produced");
        assert!(matches!(err, QuizForgeError::Synthesis { .. }));
    }

    #[tokio::test]
    async fn cancelled_run_returns_cancelled() {
        let source = StaticSource(single_paragraph_doc());
        let ai = Arc::new(ScriptedAi::constant("unused"));
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = run(&url(), &serial_config(), &source, &ai, &SilentProgress, &cancel)
            .await
            .expect_err("cancelled before fetch");
        assert!(matches!(err, QuizForgeError::Cancelled));
        assert_eq!(ai.calls(), 0);
    }

    #[tokio::test]
    async fn progress_reports_stage_transitions() {
        use std::sync::Mutex;

        struct Recorder(Mutex<Vec<Stage>>);
        impl ProgressReporter for Recorder {
            fn stage(&self, stage: Stage) {
                self.0.lock().expect("lock").push(stage);
            }
            fn done(&self, _outcome: &PipelineOutcome) {}
        }

        let source = StaticSource(single_paragraph_doc());
        let ai = Arc::new(ScriptedAi::new(vec![
            Ok(r#"[{"label": "T", "summary": "s", "block": "b0"}]"#.into()),
            Ok(r#"{"prompt": "Q?", "correct_answer": "A", "distractors": ["b", "c"]}"#.into()),
        ]));
        let recorder = Recorder(Mutex::new(Vec::new()));

        run(&url(), &serial_config(), &source, &ai, &recorder, &CancelToken::new())
            .await
            .expect("run succeeds");

        let stages = recorder.0.into_inner().expect("into_inner");
        assert_eq!(
            stages,
            vec![
                Stage::Fetching,
                Stage::Extracting,
                Stage::Synthesizing,
                Stage::Generating,
                Stage::Packaging,
                Stage::Complete,
            ]
        );
    }

    #[test]
    fn stage_display_names() {
        assert_eq!(Stage::Idle.to_string(), "idle");
        assert_eq!(Stage::Synthesizing.to_string(), "synthesizing");
        assert_eq!(Stage::Failed.to_string(), "failed");
    }
}
