//! Configuration loading, validation, and management for OpsClaw.
//!
//! Loads configuration from `~/.opsclaw/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.opsclaw/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the LLM extractor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Natural-language extractor settings
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Resource query worker process settings
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Token recognizers for zones, namespaces and resource kinds
    #[serde(default)]
    pub vocabulary: VocabularyConfig,

    /// Resource kind to tool name mapping and display order
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Interactive shell settings
    #[serde(default)]
    pub cli: CliConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("extractor", &self.extractor)
            .field("worker", &self.worker)
            .field("vocabulary", &self.vocabulary)
            .field("catalog", &self.catalog)
            .field("cli", &self.cli)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// "keyword" (offline, rule based) or "llm"
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Base URL of an OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Character budget for the previous-turn snapshot sent as context
    #[serde(default = "default_snapshot_budget")]
    pub snapshot_budget_chars: usize,
}

fn default_backend() -> String {
    "keyword".into()
}
fn default_api_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_max_tokens() -> u32 {
    512
}
fn default_snapshot_budget() -> usize {
    4000
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            api_url: default_api_url(),
            model: default_model(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            snapshot_budget_chars: default_snapshot_budget(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Executable started once per resolved query
    #[serde(default = "default_worker_command")]
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Per-task deadline, measured from spawn
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Time between the graceful and forceful signal at shutdown
    #[serde(default = "default_kill_grace_secs")]
    pub kill_grace_secs: u64,
}

fn default_worker_command() -> String {
    "ops-query-server".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_kill_grace_secs() -> u64 {
    3
}

impl WorkerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.kill_grace_secs)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            command: default_worker_command(),
            args: vec![],
            env: HashMap::new(),
            timeout_secs: default_timeout_secs(),
            kill_grace_secs: default_kill_grace_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyConfig {
    /// Zone keywords (deployment regions)
    #[serde(default = "default_zones")]
    pub zones: Vec<String>,

    /// Literal prefix that marks a namespace token
    #[serde(default = "default_namespace_prefix")]
    pub namespace_prefix: String,

    /// Verbs and filler words dropped before recognition
    #[serde(default = "default_fillers")]
    pub fillers: Vec<String>,

    /// Fillers that turn a query into an inspect query
    #[serde(default = "default_inspect_verbs")]
    pub inspect_verbs: Vec<String>,

    /// Keyword (incl. plurals and synonyms) -> canonical resource kind
    #[serde(default = "default_resource_kinds")]
    pub resource_kinds: BTreeMap<String, String>,
}

fn default_zones() -> Vec<String> {
    ["hzh", "bja", "gzg", "usw"].into_iter().map(String::from).collect()
}
fn default_namespace_prefix() -> String {
    "ns-".into()
}
fn default_fillers() -> Vec<String> {
    [
        "describe", "inspect", "logs", "get", "show", "list", "check", "view", "find", "in",
        "of", "the", "for", "please", "and", "all",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_inspect_verbs() -> Vec<String> {
    ["describe", "inspect", "logs"].into_iter().map(String::from).collect()
}
fn default_resource_kinds() -> BTreeMap<String, String> {
    [
        ("devbox", "devbox"),
        ("devboxes", "devbox"),
        ("cluster", "cluster"),
        ("clusters", "cluster"),
        ("db", "cluster"),
        ("database", "cluster"),
        ("databases", "cluster"),
        ("app", "app"),
        ("apps", "app"),
        ("pod", "pod"),
        ("pods", "pod"),
        ("svc", "service"),
        ("service", "service"),
        ("services", "service"),
        ("ingress", "ingress"),
        ("ingresses", "ingress"),
        ("cert", "certificate"),
        ("certificate", "certificate"),
        ("certificates", "certificate"),
        ("cronjob", "cronjob"),
        ("cronjobs", "cronjob"),
        ("bucket", "bucket"),
        ("buckets", "bucket"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            zones: default_zones(),
            namespace_prefix: default_namespace_prefix(),
            fillers: default_fillers(),
            inspect_verbs: default_inspect_verbs(),
            resource_kinds: default_resource_kinds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Canonical resource kind -> list tool name
    #[serde(default = "default_list_tools")]
    pub list_tools: BTreeMap<String, String>,

    /// Tool used for every inspect query
    #[serde(default = "default_inspect_tool")]
    pub inspect_tool: String,

    /// Kind used when a turn names scope but no resource kind
    #[serde(default = "default_generic_kind")]
    pub generic_kind: String,

    /// Display order of resource kinds; unknown kinds sort last
    #[serde(default = "default_priority")]
    pub priority: Vec<String>,
}

fn default_list_tools() -> BTreeMap<String, String> {
    [
        ("devbox", "list_devboxes"),
        ("cluster", "list_clusters"),
        ("app", "list_apps"),
        ("pod", "list_pods"),
        ("service", "list_services"),
        ("ingress", "list_ingresses"),
        ("certificate", "list_certificates"),
        ("cronjob", "list_cronjobs"),
        ("bucket", "list_buckets"),
        ("generic", "list_resources"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}
fn default_inspect_tool() -> String {
    "inspect_resource".into()
}
fn default_generic_kind() -> String {
    "generic".into()
}
fn default_priority() -> Vec<String> {
    [
        "devbox",
        "app",
        "cluster",
        "pod",
        "service",
        "ingress",
        "certificate",
        "cronjob",
        "bucket",
        "generic",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            list_tools: default_list_tools(),
            inspect_tool: default_inspect_tool(),
            generic_kind: default_generic_kind(),
            priority: default_priority(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Log lines requested when the override flag is missing or invalid
    #[serde(default = "default_line_limit")]
    pub default_line_limit: u32,

    /// A second interrupt within this window exits
    #[serde(default = "default_interrupt_window_secs")]
    pub interrupt_window_secs: u64,
}

fn default_line_limit() -> u32 {
    30
}
fn default_interrupt_window_secs() -> u64 {
    2
}

impl CliConfig {
    pub fn interrupt_window(&self) -> Duration {
        Duration::from_secs(self.interrupt_window_secs)
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            default_line_limit: default_line_limit(),
            interrupt_window_secs: default_interrupt_window_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.opsclaw/config.toml).
    ///
    /// Also checks environment variables:
    /// - `OPSCLAW_API_KEY`, `OPENROUTER_API_KEY`, `OPENAI_API_KEY` (first wins)
    /// - `OPSCLAW_MODEL`, `OPSCLAW_EXTRACTOR`, `OPSCLAW_WORKER_COMMAND`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("OPSCLAW_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("OPSCLAW_MODEL") {
            config.extractor.model = model;
        }

        if let Ok(backend) = std::env::var("OPSCLAW_EXTRACTOR") {
            config.extractor.backend = backend;
        }

        if let Ok(command) = std::env::var("OPSCLAW_WORKER_COMMAND") {
            config.worker.command = command;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".opsclaw")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "worker.timeout_secs must be > 0".into(),
            ));
        }

        if self.worker.kill_grace_secs == 0 {
            return Err(ConfigError::ValidationError(
                "worker.kill_grace_secs must be > 0".into(),
            ));
        }

        if self.cli.interrupt_window_secs == 0 {
            return Err(ConfigError::ValidationError(
                "cli.interrupt_window_secs must be > 0".into(),
            ));
        }

        if self.worker.command.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "worker.command must not be empty".into(),
            ));
        }

        if !(0.0..=2.0).contains(&self.extractor.temperature) {
            return Err(ConfigError::ValidationError(
                "extractor.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.cli.default_line_limit == 0 {
            return Err(ConfigError::ValidationError(
                "cli.default_line_limit must be > 0".into(),
            ));
        }

        let vocab = &self.vocabulary;
        if vocab.namespace_prefix.is_empty() {
            return Err(ConfigError::ValidationError(
                "vocabulary.namespace_prefix must not be empty".into(),
            ));
        }

        let prefix = vocab.namespace_prefix.to_lowercase();
        let zones = lowercase_set(&vocab.zones);
        let fillers = lowercase_set(&vocab.fillers);
        let kinds = lowercase_set(vocab.resource_kinds.keys());

        for zone in &zones {
            if fillers.contains(zone) || kinds.contains(zone) || zone.starts_with(&prefix) {
                return Err(ConfigError::ValidationError(format!(
                    "zone '{zone}' overlaps another recognizer"
                )));
            }
        }
        for kind in &kinds {
            if fillers.contains(kind) || kind.starts_with(&prefix) {
                return Err(ConfigError::ValidationError(format!(
                    "resource keyword '{kind}' overlaps another recognizer"
                )));
            }
        }
        if let Some(verb) = lowercase_set(&vocab.inspect_verbs)
            .into_iter()
            .find(|v| !fillers.contains(v))
        {
            return Err(ConfigError::ValidationError(format!(
                "inspect verb '{verb}' must also be listed as a filler"
            )));
        }

        if !self.catalog.list_tools.contains_key(&self.catalog.generic_kind) {
            return Err(ConfigError::ValidationError(format!(
                "catalog.list_tools has no entry for generic kind '{}'",
                self.catalog.generic_kind
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            extractor: ExtractorConfig::default(),
            worker: WorkerConfig::default(),
            vocabulary: VocabularyConfig::default(),
            catalog: CatalogConfig::default(),
            cli: CliConfig::default(),
        }
    }
}

fn lowercase_set<I, S>(items: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items.into_iter().map(|s| s.as_ref().to_lowercase()).collect()
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
