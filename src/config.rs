//! Configuration system for workshop-pilot
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (PILOT_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Main pilot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PilotConfig {
    /// Advisory (language model) service settings
    pub advisory: AdvisorySettings,

    /// Per-persona simulation settings
    pub simulation: SimulationSettings,

    /// Group scheduling and rate limiting
    pub orchestrator: OrchestratorSettings,

    /// Report aggregation settings
    pub analysis: AnalysisSettings,

    /// Logging configuration
    pub logging: LoggingSettings,

    /// Catalog and artifact paths
    pub storage: StorageSettings,
}

/// Which advisory backend to drive the simulation with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AdvisoryProvider {
    /// OpenAI-compatible chat completions endpoint
    #[value(name = "openai")]
    OpenAi,
    /// Deterministic offline backend
    Mock,
}

impl std::str::FromStr for AdvisoryProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "mock" => Ok(Self::Mock),
            other => Err(Error::config_field_invalid(
                "advisory.provider",
                format!("unknown provider '{}', expected openai or mock", other),
            )),
        }
    }
}

impl std::fmt::Display for AdvisoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

/// Advisory service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorySettings {
    pub provider: AdvisoryProvider,

    /// API base URL (e.g., "https://api.openai.com/v1", "http://localhost:11434/v1")
    pub base_url: String,

    /// API key (empty string for local servers like Ollama)
    pub api_key: String,

    pub model: String,

    /// Per-call timeout in seconds
    pub timeout_secs: u64,

    /// Total attempts per stage before falling back to a degraded result
    pub max_attempts: u32,

    /// Base backoff between attempts, doubled after each failure
    pub retry_backoff_ms: u64,

    pub temperature: f32,
    pub max_tokens: u32,

    /// Behaviour of the offline backend
    pub mock: MockSettings,
}

/// A scripted early exit for the mock backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedDropout {
    pub persona: String,
    pub stage: u32,
}

/// Offline backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MockSettings {
    /// Mixed into the reply hash so different seeds give different runs
    pub seed: String,

    /// Simulated latency per call in milliseconds
    pub latency_ms: u64,

    /// Percentage (0-100) of calls answered with unparseable text
    pub malformed_percent: u8,

    /// Personas that answer wouldContinue=false at a given stage
    pub dropouts: Vec<ScriptedDropout>,

    /// Personas whose every call is rejected as a non-retryable error
    pub reject_personas: Vec<String>,
}

/// Simulation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// How many previous stages the context digest keeps
    pub digest_max_stages: usize,

    /// Maximum characters of the top pain point kept per digest entry
    pub digest_pain_point_chars: usize,
}

/// Group orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    /// Personas per group (K)
    pub group_size: usize,

    /// Personas simulated concurrently (1 = sequential)
    pub max_concurrent_personas: usize,

    /// Advisory calls in flight at once, across all workers
    pub max_in_flight_calls: usize,

    /// Minimum spacing between consecutive advisory calls in milliseconds
    pub min_call_spacing_ms: u64,
}

/// Aggregation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Composite score below which a persona counts as struggling at a stage
    pub struggling_threshold: f64,

    /// Number of lowest-scoring stages reported as problematic
    pub problematic_stage_count: usize,

    /// Also render final_report.md next to final_report.json
    pub write_markdown: bool,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

/// Storage path settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory receiving group folders and the final report
    pub output_dir: String,

    /// Persona catalog override (None = bundled catalog)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personas_file: Option<String>,

    /// Stage catalog override (None = bundled catalog)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stages_file: Option<String>,
}

// Default implementations

impl Default for AdvisorySettings {
    fn default() -> Self {
        Self {
            provider: AdvisoryProvider::OpenAi,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 60,
            max_attempts: 3,
            retry_backoff_ms: 500,
            temperature: 0.7,
            max_tokens: 1000,
            mock: MockSettings::default(),
        }
    }
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            seed: "pilot".to_string(),
            latency_ms: 0,
            malformed_percent: 0,
            dropouts: vec![],
            reject_personas: vec![],
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            digest_max_stages: 3,
            digest_pain_point_chars: 80,
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            group_size: 5,
            max_concurrent_personas: 1,
            max_in_flight_calls: 2,
            min_call_spacing_ms: 1000,
        }
    }
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            struggling_threshold: 7.5,
            problematic_stage_count: 3,
            write_markdown: true,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_files: 5,
            json_format: false,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            output_dir: "./pilot-results".to_string(),
            personas_file: None,
            stages_file: None,
        }
    }
}

impl PilotConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            config = Self::from_file(&path)?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration file without overrides or validation
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| Error::IoRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| Error::ConfigParse {
            message: format!("{}: {}", path.display(), e.message()),
            source: Some(e),
        })
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // If explicit path provided, use it (error if not found)
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::config_not_found(path));
        }

        let search_paths = [
            PathBuf::from("workshop-pilot.toml"),
            dirs::config_dir()
                .map(|p| p.join("workshop-pilot").join("config.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".workshop-pilot").join("config.toml"))
                .unwrap_or_default(),
        ];

        for path in &search_paths {
            if !path.as_os_str().is_empty() && path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Advisory settings
        if let Ok(val) = std::env::var("PILOT_PROVIDER") {
            if let Ok(provider) = val.parse() {
                self.advisory.provider = provider;
            }
        }
        if let Ok(val) = std::env::var("PILOT_BASE_URL") {
            self.advisory.base_url = val;
        }
        if let Ok(val) = std::env::var("PILOT_API_KEY") {
            self.advisory.api_key = val;
        }
        if let Ok(val) = std::env::var("PILOT_MODEL") {
            self.advisory.model = val;
        }
        if let Ok(val) = std::env::var("PILOT_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.advisory.timeout_secs = n;
            }
        }
        if let Ok(val) = std::env::var("PILOT_MAX_ATTEMPTS") {
            if let Ok(n) = val.parse() {
                self.advisory.max_attempts = n;
            }
        }

        // Orchestrator settings
        if let Ok(val) = std::env::var("PILOT_GROUP_SIZE") {
            if let Ok(n) = val.parse() {
                self.orchestrator.group_size = n;
            }
        }
        if let Ok(val) = std::env::var("PILOT_CONCURRENCY") {
            if let Ok(n) = val.parse() {
                self.orchestrator.max_concurrent_personas = n;
            }
        }
        if let Ok(val) = std::env::var("PILOT_CALL_SPACING_MS") {
            if let Ok(n) = val.parse() {
                self.orchestrator.min_call_spacing_ms = n;
            }
        }

        // Logging settings
        if let Ok(val) = std::env::var("PILOT_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("PILOT_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("PILOT_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }

        // Storage settings
        if let Ok(val) = std::env::var("PILOT_OUTPUT_DIR") {
            self.storage.output_dir = val;
        }
        if let Ok(val) = std::env::var("PILOT_PERSONAS_FILE") {
            self.storage.personas_file = Some(val);
        }
        if let Ok(val) = std::env::var("PILOT_STAGES_FILE") {
            self.storage.stages_file = Some(val);
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        self.storage.output_dir = expand_path(&self.storage.output_dir);
        for file in [
            &mut self.storage.personas_file,
            &mut self.storage.stages_file,
            &mut self.logging.file,
        ]
        .into_iter()
        .flatten()
        {
            *file = expand_path(file);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.advisory.provider == AdvisoryProvider::OpenAi {
            if self.advisory.base_url.is_empty() {
                return Err(Error::config_field_invalid(
                    "advisory.base_url",
                    "base URL cannot be empty",
                ));
            }
            let parsed = url::Url::parse(&self.advisory.base_url).map_err(|e| {
                Error::config_field_invalid("advisory.base_url", format!("invalid URL: {}", e))
            })?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(Error::config_field_invalid(
                    "advisory.base_url",
                    "base URL must start with http:// or https://",
                ));
            }
        }

        if self.advisory.max_attempts == 0 {
            return Err(Error::config_field_invalid(
                "advisory.max_attempts",
                "at least one attempt is required",
            ));
        }
        if self.advisory.timeout_secs == 0 {
            return Err(Error::config_field_invalid(
                "advisory.timeout_secs",
                "timeout must be positive",
            ));
        }
        if self.advisory.mock.malformed_percent > 100 {
            return Err(Error::config_field_invalid(
                "advisory.mock.malformed_percent",
                "must be between 0 and 100",
            ));
        }

        if self.simulation.digest_max_stages == 0 {
            return Err(Error::config_field_invalid(
                "simulation.digest_max_stages",
                "digest must keep at least one stage",
            ));
        }

        let orchestrator = &self.orchestrator;
        for (field, value) in [
            ("orchestrator.group_size", orchestrator.group_size),
            ("orchestrator.max_concurrent_personas", orchestrator.max_concurrent_personas),
            ("orchestrator.max_in_flight_calls", orchestrator.max_in_flight_calls),
        ] {
            if value == 0 {
                return Err(Error::config_field_invalid(field, "must be at least 1"));
            }
        }

        let threshold = self.analysis.struggling_threshold;
        if !(threshold > 0.0 && threshold <= 10.0) {
            return Err(Error::config_field_invalid(
                "analysis.struggling_threshold",
                "must be within (0, 10]",
            ));
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Get the output directory as a PathBuf
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.output_dir)
    }
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| PathBuf::from("workshop-pilot.toml"));

    if config_path.exists() && !force {
        return Err(Error::config_validation(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| Error::IoWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(&config_path, generate_default_config()).map_err(|source| Error::IoWrite {
        path: config_path.clone(),
        source,
    })?;

    Ok(config_path)
}

/// Generate default configuration content with comments
fn generate_default_config() -> String {
    r#"# workshop-pilot configuration

[advisory]
# Backend: "openai" (any OpenAI-compatible endpoint) or "mock" (offline, deterministic)
provider = "openai"

# API base URL (OpenAI, Ollama, vLLM, LM Studio, etc.)
base_url = "https://api.openai.com/v1"

# API key (prefer the PILOT_API_KEY environment variable)
api_key = ""

model = "gpt-4o-mini"

# Per-call timeout in seconds
timeout_secs = 60

# Attempts per stage before a neutral, degraded result is recorded
max_attempts = 3

# Backoff before the second attempt, doubled afterwards
retry_backoff_ms = 500

temperature = 0.7
max_tokens = 1000

[advisory.mock]
seed = "pilot"
latency_ms = 0
malformed_percent = 0
# dropouts = [{ persona = "P003", stage = 4 }]
# reject_personas = ["P005"]

[simulation]
# Previous stages summarized into each prompt
digest_max_stages = 3
digest_pain_point_chars = 80

[orchestrator]
# Personas per group
group_size = 5

# Personas simulated at once (1 = sequential)
max_concurrent_personas = 1

# Advisory calls in flight at once, shared by all personas
max_in_flight_calls = 2

# Minimum gap between consecutive advisory calls
min_call_spacing_ms = 1000

[analysis]
# Composite score below which a persona is reported as struggling
struggling_threshold = 7.5
problematic_stage_count = 3
write_markdown = true

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "./pilot-results/logs/pilot.log"

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false

[storage]
output_dir = "./pilot-results"

# Catalog overrides (bundled catalogs are used when unset)
# personas_file = "./personas.json"
# stages_file = "./stages.json"
"#
    .to_string()
}
