//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

use quizforge_ai::{OpenRouterClient, OpenRouterConfig};
use quizforge_core::pipeline::{
    PipelineConfig, PipelineOutcome, ProgressReporter, Stage,
};
use quizforge_core::{GeneratorConfig, SynthesizerConfig};
use quizforge_fetcher::{FetchConfig, Fetcher};
use quizforge_shared::{AppConfig, CancelToken, init_config, load_config, validate_api_key};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// QuizForge — turn a web page into a self-check quiz.
#[derive(Parser)]
#[command(
    name = "quizforge",
    version,
    about = "Turn a web page into a quiz: fetch, distill knowledge points, generate questions.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build a quiz site from a URL.
    Build {
        /// Page URL to turn into a quiz.
        url: String,

        /// Human-readable site name (defaults to the page title).
        #[arg(short, long)]
        name: Option<String>,

        /// Output directory (defaults to the configured output_dir).
        #[arg(short, long)]
        out: Option<String>,

        /// Model to use for synthesis and generation (defaults to config).
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "quizforge=info",
        1 => "quizforge=debug",
        _ => "quizforge=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Build {
            url,
            name,
            out,
            model,
        } => cmd_build(&url, name.as_deref(), out.as_deref(), model.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// build
// ---------------------------------------------------------------------------

async fn cmd_build(
    url: &str,
    name: Option<&str>,
    out: Option<&str>,
    model: Option<&str>,
) -> Result<()> {
    // Validate API key before doing anything
    let config = load_config()?;
    validate_api_key(&config)?;

    let parsed_url = Url::parse(url).map_err(|e| eyre!("invalid URL '{url}': {e}"))?;

    let output_dir = resolve_output_dir(out, &config)?;

    let api_key = std::env::var(&config.openrouter.api_key_env)
        .map_err(|_| eyre!("{} is not set", config.openrouter.api_key_env))?;

    let model_id = model.unwrap_or(&config.openrouter.default_model).to_string();

    let ai = Arc::new(OpenRouterClient::new(OpenRouterConfig {
        base_url: config.openrouter.base_url.clone(),
        api_key,
        model: model_id.clone(),
        timeout: Duration::from_secs(config.ai.timeout_secs),
    })?);

    let fetcher = Fetcher::new(FetchConfig::from(&config.fetch))?;

    let pipeline_config = PipelineConfig {
        synthesizer: SynthesizerConfig {
            concurrency: config.ai.concurrency,
            retry: config.ai.retry,
            ..SynthesizerConfig::default()
        },
        generator: GeneratorConfig {
            concurrency: config.ai.concurrency,
            retry: config.ai.retry,
            distractor_target: config.defaults.distractor_target,
            ..GeneratorConfig::default()
        },
        ..PipelineConfig::default()
    };

    info!(url, model = %model_id, out = %output_dir.display(), "building quiz site");

    // Ctrl-C flips the cancel token; in-flight stages observe it and unwind.
    let cancel = CancelToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, cancelling run...");
            ctrl_c_token.cancel();
        }
    });

    let reporter = CliProgress::new();
    let outcome = quizforge_core::pipeline::run(
        &parsed_url,
        &pipeline_config,
        &fetcher,
        &ai,
        &reporter,
        &cancel,
    )
    .await?;

    let mut site = outcome.site;
    if let Some(n) = name {
        site.title = Some(n.to_string());
    }

    std::fs::create_dir_all(&output_dir)
        .map_err(|e| eyre!("cannot create '{}': {e}", output_dir.display()))?;
    let site_path = output_dir.join("quiz_site.json");
    let json = serde_json::to_string_pretty(&site)?;
    std::fs::write(&site_path, json)
        .map_err(|e| eyre!("cannot write '{}': {e}", site_path.display()))?;

    // Print summary
    println!();
    println!("  Quiz site created successfully!");
    println!("  Run:       {}", outcome.run_id);
    println!(
        "  Title:     {}",
        site.title.as_deref().unwrap_or("(untitled)")
    );
    println!("  Blocks:    {}", outcome.stats.blocks);
    println!("  Points:    {}", outcome.stats.knowledge_points);
    println!("  Questions: {}", outcome.stats.quiz_items);
    if outcome.stats.batches_skipped > 0 || outcome.stats.points_skipped > 0 {
        println!(
            "  Skipped:   {} batches, {} points",
            outcome.stats.batches_skipped, outcome.stats.points_skipped
        );
    }
    println!("  Path:      {}", site_path.display());
    println!("  Time:      {:.1}s", outcome.elapsed.as_secs_f64());
    println!();

    Ok(())
}

/// Resolve the output directory: CLI flag, else configured default with `~`
/// expanded against the user's home.
fn resolve_output_dir(out: Option<&str>, config: &AppConfig) -> Result<PathBuf> {
    let raw = out.unwrap_or(&config.defaults.output_dir);
    if let Some(rest) = raw.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| eyre!("could not determine home directory"))?;
        Ok(home.join(rest))
    } else {
        Ok(PathBuf::from(raw))
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, stage: Stage) {
        let message = match stage {
            Stage::Idle => "Starting...",
            Stage::Fetching => "Fetching page...",
            Stage::Extracting => "Extracting content...",
            Stage::Synthesizing => "Distilling knowledge points...",
            Stage::Generating => "Generating questions...",
            Stage::Packaging => "Packaging site...",
            Stage::Complete | Stage::Failed => "",
        };
        if message.is_empty() {
            self.spinner.finish_and_clear();
        } else {
            self.spinner.set_message(message);
        }
    }

    fn done(&self, _outcome: &PipelineOutcome) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
