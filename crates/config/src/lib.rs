//! Configuration loading, validation, and management for shopchat.
//!
//! Loads configuration from `~/.shopchat/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.shopchat/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the completion provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Completion model
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Turn handling
    #[serde(default)]
    pub chat: ChatConfig,

    /// Static prompt files
    #[serde(default)]
    pub prompts: PromptsConfig,

    /// Knowledge retrieval
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Retrieval gate vocabulary
    #[serde(default)]
    pub gate: GateConfig,

    /// Session persistence
    #[serde(default)]
    pub session: SessionConfig,

    /// Metrics persistence and pricing
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// HTTP gateway
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    800
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
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("chat", &self.chat)
            .field("prompts", &self.prompts)
            .field("retrieval", &self.retrieval)
            .field("gate", &self.gate)
            .field("session", &self.session)
            .field("telemetry", &self.telemetry)
            .field("gateway", &self.gateway)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Longest accepted user message, in characters
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Keep the retrieved-knowledge system message in the saved history
    #[serde(default)]
    pub persist_retrieved_context: bool,

    /// Sliding window over non-system history sent to the provider (None = unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_history_messages: Option<usize>,
}

fn default_max_input_chars() -> usize {
    1000
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_input_chars: default_max_input_chars(),
            persist_retrieved_context: false,
            max_history_messages: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    #[serde(default = "default_prompts_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default = "default_guidelines")]
    pub guidelines: String,

    #[serde(default = "default_knowledge_base")]
    pub knowledge_base: String,
}

fn default_prompts_dir() -> PathBuf {
    PathBuf::from("prompts")
}
fn default_system_prompt() -> String {
    "sys_prompt.txt".into()
}
fn default_guidelines() -> String {
    "behaviour_guidelines.txt".into()
}
fn default_knowledge_base() -> String {
    "knowledge_base_techmarkt.txt".into()
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            dir: default_prompts_dir(),
            system_prompt: default_system_prompt(),
            guidelines: default_guidelines(),
            knowledge_base: default_knowledge_base(),
        }
    }
}

impl PromptsConfig {
    pub fn knowledge_base_path(&self) -> PathBuf {
        self.dir.join(&self.knowledge_base)
    }
}

/// How passages are scored against a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// Cosine similarity over provider embeddings
    #[default]
    Embedding,
    /// Term overlap, no provider calls
    Keyword,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub mode: RetrievalMode,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,

    /// Target chunk length in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters carried over between adjacent chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

fn default_top_k() -> usize {
    3
}
fn default_score_threshold() -> f32 {
    0.3
}
fn default_chunk_size() -> usize {
    400
}
fn default_chunk_overlap() -> usize {
    50
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            mode: RetrievalMode::default(),
            top_k: default_top_k(),
            score_threshold: default_score_threshold(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            embedding_model: default_embedding_model(),
        }
    }
}

/// Word lists driving the retrieval gate. Matching is case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Interrogatives, matched as whole words
    #[serde(default = "default_question_words")]
    pub question_words: Vec<String>,

    /// Intent phrases and stems, matched at the start of a word
    #[serde(default = "default_intent_phrases")]
    pub intent_phrases: Vec<String>,

    /// Product and domain nouns, matched at the start of a word
    #[serde(default = "default_product_terms")]
    pub product_terms: Vec<String>,
}

fn strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

fn default_question_words() -> Vec<String> {
    strings(&[
        // English
        "what", "how", "why", "where", "when", "which", "who",
        // German
        "was", "wie", "warum", "wo", "wann", "welche", "welcher", "welches",
    ])
}

fn default_intent_phrases() -> Vec<String> {
    strings(&[
        // English
        "i need", "i want", "looking for", "show me", "recommend", "buy", "purchas",
        "do you have", "can you", "is there",
        // German
        "ich brauche", "ich suche", "suche nach", "zeig mir", "zeige mir", "empfehlung",
        "empfiehl", "kaufen", "möchte", "will haben", "gibt es", "haben sie", "können sie",
        "kannst du",
    ])
}

fn default_product_terms() -> Vec<String> {
    strings(&[
        "laptop", "smartphone", "tablet", "monitor", "computer", "gaming", "programming",
        "tech", "device", "machine", "electronic", "homeoffice",
    ])
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            question_words: default_question_words(),
            intent_phrases: default_intent_phrases(),
            product_terms: default_product_terms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionBackend {
    #[default]
    Memory,
    File,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub backend: SessionBackend,

    /// Directory (file backend) or database path (sqlite backend)
    #[serde(default = "default_session_path")]
    pub path: PathBuf,

    /// Expire idle sessions after this many seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
}

/// TTL applied to the memory backend when `ttl_secs` is unset.
pub const DEFAULT_MEMORY_TTL_SECS: u64 = 24 * 60 * 60;

impl SessionConfig {
    /// The TTL the configured backend should enforce.
    ///
    /// The memory backend always expires sessions, falling back to
    /// [`DEFAULT_MEMORY_TTL_SECS`]. Durable backends keep sessions unless
    /// `ttl_secs` is set.
    pub fn effective_ttl(&self) -> Option<Duration> {
        match (self.backend, self.ttl_secs) {
            (_, Some(secs)) => Some(Duration::from_secs(secs)),
            (SessionBackend::Memory, None) => Some(Duration::from_secs(DEFAULT_MEMORY_TTL_SECS)),
            (_, None) => None,
        }
    }
}

fn default_session_path() -> PathBuf {
    PathBuf::from("sessions")
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::default(),
            path: default_session_path(),
            ttl_secs: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricsBackend {
    #[default]
    File,
    Sqlite,
    Memory,
}

/// Metrics persistence and pricing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub backend: MetricsBackend,

    /// JSON file (file backend) or database path (sqlite backend)
    #[serde(default = "default_metrics_path")]
    pub path: PathBuf,

    /// How many empty-retrieval queries to keep (most recent)
    #[serde(default = "default_empty_retrieval_log_capacity")]
    pub empty_retrieval_log_capacity: usize,

    /// Per-million-token pricing override for the configured model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<PricingOverrideConfig>,
}

fn default_metrics_path() -> PathBuf {
    PathBuf::from("metrics.json")
}
fn default_empty_retrieval_log_capacity() -> usize {
    1000
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            backend: MetricsBackend::default(),
            path: default_metrics_path(),
            empty_retrieval_log_capacity: default_empty_retrieval_log_capacity(),
            pricing: None,
        }
    }
}

/// Custom per-million-token pricing for a model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PricingOverrideConfig {
    /// Price per 1M input tokens in USD
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD
    pub output_per_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_port() -> u16 {
    5001
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_body_bytes() -> usize {
    64 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.shopchat/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load configuration from `path`, then apply environment overrides.
    ///
    /// Environment variables:
    /// - `SHOPCHAT_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `SHOPCHAT_MODEL`
    /// - `SHOPCHAT_PROMPTS_DIR`
    /// - `SHOPCHAT_PORT`
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;

        if let Some(key) = std::env::var("SHOPCHAT_API_KEY")
            .ok()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
        {
            config.api_key = Some(key);
        }

        if let Ok(model) = std::env::var("SHOPCHAT_MODEL") {
            config.model = model;
        }

        if let Ok(dir) = std::env::var("SHOPCHAT_PROMPTS_DIR") {
            config.prompts.dir = PathBuf::from(dir);
        }

        if let Ok(port) = std::env::var("SHOPCHAT_PORT") {
            config.gateway.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("SHOPCHAT_PORT is not a port number: {port}"))
            })?;
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
        dirs_home().join(".shopchat")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.chat.max_input_chars == 0 {
            return Err(ConfigError::ValidationError(
                "chat.max_input_chars must be > 0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.retrieval.score_threshold) {
            return Err(ConfigError::ValidationError(
                "retrieval.score_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be > 0".into(),
            ));
        }

        if self.retrieval.chunk_size == 0
            || self.retrieval.chunk_overlap >= self.retrieval.chunk_size
        {
            return Err(ConfigError::ValidationError(
                "retrieval.chunk_overlap must be smaller than a non-zero chunk_size".into(),
            ));
        }

        if self.telemetry.empty_retrieval_log_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "telemetry.empty_retrieval_log_capacity must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Render the config as TOML. The API key is never written out.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        let mut config = self.clone();
        config.api_key = None;
        toml::to_string_pretty(&config).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        Self::default().to_toml().unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            chat: ChatConfig::default(),
            prompts: PromptsConfig::default(),
            retrieval: RetrievalConfig::default(),
            gate: GateConfig::default(),
            session: SessionConfig::default(),
            telemetry: TelemetryConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
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

    #[error("Failed to render config: {0}")]
    SerializeError(String),
}
