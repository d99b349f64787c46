//! Application configuration for QuizForge.
//!
//! User config lives at `~/.quizforge/quizforge.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{QuizForgeError, Result};
use crate::retry::RetryPolicy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "quizforge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".quizforge";

// ---------------------------------------------------------------------------
// Config structs (matching quizforge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// OpenRouter settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Fetch policies.
    #[serde(default)]
    pub fetch: FetchPoliciesConfig,

    /// AI call policies.
    #[serde(default)]
    pub ai: AiPoliciesConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default output directory for generated sites.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Target number of distractors per quiz item.
    #[serde(default = "default_distractor_target")]
    pub distractor_target: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            distractor_target: default_distractor_target(),
        }
    }
}

fn default_output_dir() -> String {
    "~/quizforge-sites".into()
}
fn default_distractor_target() -> usize {
    3
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Default model to use for synthesis and generation.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            base_url: default_base_url(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "moonshotai/kimi-k2.5".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchPoliciesConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// Retry policy for transient fetch failures.
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for FetchPoliciesConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            retry: RetryPolicy::default(),
        }
    }
}

fn default_fetch_timeout() -> u64 {
    30
}

/// `[ai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiPoliciesConfig {
    /// Per-call timeout in seconds.
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent AI calls within a fan-out stage.
    #[serde(default = "default_ai_concurrency")]
    pub concurrency: usize,

    /// Retry policy for transient provider errors.
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for AiPoliciesConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_ai_timeout(),
            concurrency: default_ai_concurrency(),
            retry: RetryPolicy::default(),
        }
    }
}

fn default_ai_timeout() -> u64 {
    60
}
fn default_ai_concurrency() -> usize {
    4
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Directory the config file lives in (`~/.quizforge/`).
pub fn config_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME))
        .ok_or_else(|| QuizForgeError::config("could not determine home directory"))
}

/// Full path of the config file (`~/.quizforge/quizforge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the config from its default location. A missing file is not an
/// error; every section has defaults.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;
    if path.exists() {
        load_config_from(&path)
    } else {
        tracing::debug!(?path, "no config file, running on defaults");
        Ok(AppConfig::default())
    }
}

/// Load and parse a config file at an explicit path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| QuizForgeError::io(path, e))?;
    toml::from_str(&content)
        .map_err(|e| QuizForgeError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write a fresh default config file, creating `~/.quizforge/` if needed.
/// Returns the path written.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| QuizForgeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| QuizForgeError::config(e.to_string()))?;
    std::fs::write(&path, content).map_err(|e| QuizForgeError::io(&path, e))?;

    tracing::info!(?path, "wrote default config file");
    Ok(path)
}

/// Check that the configured API key env var is set and non-empty. The key
/// itself never lives in the config file.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.openrouter.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(QuizForgeError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))),
    }
}
