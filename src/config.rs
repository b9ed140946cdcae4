//! Configuration for claimflow.
//!
//! Loaded from claimflow.yml in the working directory or
//! ~/.config/claimflow/claimflow.yml, with defaults for everything.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ClaimflowError, Result};
use crate::pipeline::{ExtractOptions, ServiceEndpoints};
use crate::reasoner::OpenAiConfig;
use crate::runner::RunnerConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Loop driver budgets.
    pub engine: EngineConfig,

    /// Reasoning oracle settings.
    pub reasoner: ReasonerConfig,

    /// Document-processing service settings.
    pub services: ServicesConfig,

    /// Extraction and translation settings.
    pub processing: ProcessingConfig,

    /// Report and storage locations.
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. claimflow.yml in current directory
    /// 3. ~/.config/claimflow/claimflow.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // Explicit path takes precedence
        if let Some(path) = config_path {
            return Self::load_from_file(path).map_err(|e| {
                ClaimflowError::Config(format!("failed to load config from {}: {e}", path.display()))
            });
        }

        // Try project config
        let project_config = PathBuf::from("claimflow.yml");
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => {
                    info!("loaded config from claimflow.yml");
                    return Ok(config);
                }
                Err(e) => {
                    warn!("failed to load claimflow.yml: {e}");
                }
            }
        }

        // Try user config
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("claimflow").join("claimflow.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => {
                        info!("loaded config from {}", user_config.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        warn!("failed to load {}: {e}", user_config.display());
                    }
                }
            }
        }

        // Use defaults
        info!("no config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| ClaimflowError::Config(format!("failed to parse config file: {e}")))?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.engine.max_iterations == 0 {
            return Err(ClaimflowError::Config(
                "engine.max-iterations must be > 0".to_string(),
            ));
        }
        if self.engine.think_timeout_secs == 0 || self.engine.act_timeout_secs == 0 {
            return Err(ClaimflowError::Config(
                "engine timeouts must be > 0".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.reasoner.temperature) {
            return Err(ClaimflowError::Config(
                "reasoner.temperature must be between 0.0 and 2.0".to_string(),
            ));
        }
        if self.processing.start_page == 0 || self.processing.end_page < self.processing.start_page
        {
            return Err(ClaimflowError::Config(
                "processing page window must satisfy 1 <= start-page <= end-page".to_string(),
            ));
        }
        if self.services.timeout_secs == 0 {
            return Err(ClaimflowError::Config(
                "services.timeout-secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loop driver budgets.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Most loop cycles one claim may consume.
    #[serde(rename = "max-iterations")]
    pub max_iterations: u32,

    /// Budget for a single oracle call, in seconds.
    #[serde(rename = "think-timeout-secs")]
    pub think_timeout_secs: u64,

    /// Budget for a single action dispatch, in seconds.
    #[serde(rename = "act-timeout-secs")]
    pub act_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let runner = RunnerConfig::default();
        Self {
            max_iterations: runner.max_iterations,
            think_timeout_secs: runner.think_timeout.as_secs(),
            act_timeout_secs: runner.act_timeout.as_secs(),
        }
    }
}

impl EngineConfig {
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            max_iterations: self.max_iterations,
            think_timeout: Duration::from_secs(self.think_timeout_secs),
            act_timeout: Duration::from_secs(self.act_timeout_secs),
        }
    }
}

/// Reasoning oracle settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReasonerConfig {
    /// Model name passed to the chat-completions endpoint.
    pub model: String,

    /// Chat-completions endpoint URL.
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Per-request timeout in seconds.
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Environment variable holding the API key.
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        let oracle = OpenAiConfig::default();
        Self {
            model: oracle.model,
            base_url: oracle.base_url,
            temperature: oracle.temperature,
            timeout_secs: oracle.timeout.as_secs(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl ReasonerConfig {
    pub fn oracle_config(&self) -> OpenAiConfig {
        OpenAiConfig {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Document-processing service settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Base URL expanded into all capability endpoints. When set it wins
    /// over any per-capability endpoint below.
    #[serde(rename = "base-url")]
    pub base_url: Option<String>,

    /// Per-capability endpoint URLs.
    pub endpoints: ServiceEndpoints,

    /// Per-request timeout in seconds.
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            endpoints: ServiceEndpoints::default(),
            timeout_secs: crate::pipeline::DEFAULT_SERVICE_TIMEOUT.as_secs(),
        }
    }
}

impl ServicesConfig {
    /// Endpoint set for this run.
    pub fn endpoints(&self) -> ServiceEndpoints {
        match &self.base_url {
            Some(base) => ServiceEndpoints::with_base(base),
            None => self.endpoints.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Extraction and translation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Default translation target language.
    pub language: String,

    /// First page sent to OCR and table extraction.
    #[serde(rename = "start-page")]
    pub start_page: u32,

    /// Last page sent to OCR and table extraction.
    #[serde(rename = "end-page")]
    pub end_page: u32,

    /// Directory for per-claim text derivatives.
    #[serde(rename = "work-dir")]
    pub work_dir: PathBuf,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        let options = ExtractOptions::default();
        Self {
            language: options.default_language,
            start_page: options.start_page,
            end_page: options.end_page,
            work_dir: options.work_dir,
        }
    }
}

impl ProcessingConfig {
    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            work_dir: self.work_dir.clone(),
            default_language: self.language.clone(),
            start_page: self.start_page,
            end_page: self.end_page,
        }
    }
}

/// Report and storage locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory where adjudication reports are written.
    #[serde(rename = "reports-dir")]
    pub reports_dir: PathBuf,

    /// Directory holding the claims JSONL store.
    #[serde(rename = "data-dir")]
    pub data_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("claimflow");

        Self {
            reports_dir: PathBuf::from("reports"),
            data_dir,
        }
    }
}
