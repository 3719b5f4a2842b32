//! Startup validation — builds every collaborator and fails closed.
//!
//! Checks, in order:
//!
//! 1. API key present
//! 2. Both static prompts load and are non-blank
//! 3. Session store passes a write/read/delete round trip
//! 4. Knowledge index builds with at least one chunk
//! 5. Metrics store loads
//!
//! `serve` and `chat` abort on the first failure; `doctor` runs each step
//! on its own and reports all of them.

use shopchat_agent::{ChatService, ChatSettings, ContextAssembler, ConversationManager, RetrievalGate};
use shopchat_config::{AppConfig, MetricsBackend, SessionBackend};
use shopchat_core::{FilePromptSource, Provider, Retriever, SessionStore, StaticInstructions};
use shopchat_memory::{FileSessionStore, InMemorySessionStore, KnowledgeIndex, SqliteSessionStore};
use shopchat_telemetry::{
    InMemoryMetricsStore, JsonFileMetricsStore, MetricsRecorder, MetricsStore, SqliteMetricsStore,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("No API key configured (set SHOPCHAT_API_KEY or OPENAI_API_KEY, or api_key in config.toml)")]
    MissingApiKey,

    #[error("Provider setup failed: {0}")]
    Provider(String),

    #[error("Static prompts unavailable: {0}")]
    Prompts(String),

    #[error("Retrieval gate word lists invalid: {0}")]
    Gate(String),

    #[error("Session store failed health check: {0}")]
    Sessions(String),

    #[error("Knowledge index failed to build: {0}")]
    Knowledge(String),

    #[error("Metrics store unavailable: {0}")]
    Metrics(String),
}

pub fn check_api_key(config: &AppConfig) -> Result<(), StartupError> {
    if config.has_api_key() {
        Ok(())
    } else {
        Err(StartupError::MissingApiKey)
    }
}

pub fn build_provider(config: &AppConfig) -> Result<Arc<dyn Provider>, StartupError> {
    shopchat_providers::build_from_config(config).map_err(|e| StartupError::Provider(e.to_string()))
}

pub fn load_instructions(config: &AppConfig) -> Result<StaticInstructions, StartupError> {
    let source = FilePromptSource::new(&config.prompts.dir);
    StaticInstructions::load(&source, &config.prompts.system_prompt, &config.prompts.guidelines)
        .map_err(|e| StartupError::Prompts(e.to_string()))
}

pub async fn open_session_store(config: &AppConfig) -> Result<Arc<dyn SessionStore>, StartupError> {
    let ttl = config.session.effective_ttl();
    let store: Arc<dyn SessionStore> = match config.session.backend {
        SessionBackend::Memory => {
            let store = InMemorySessionStore::new();
            Arc::new(match ttl {
                Some(ttl) => store.with_ttl(ttl),
                None => store,
            })
        }
        SessionBackend::File => Arc::new(FileSessionStore::new(&config.session.path)),
        SessionBackend::Sqlite => {
            let store = SqliteSessionStore::new(&config.session.path.to_string_lossy())
                .await
                .map_err(|e| StartupError::Sessions(e.to_string()))?;
            Arc::new(match ttl {
                Some(ttl) => store.with_ttl(ttl),
                None => store,
            })
        }
    };
    store
        .health_check()
        .await
        .map_err(|e| StartupError::Sessions(e.to_string()))?;
    Ok(store)
}

pub async fn build_knowledge_index(
    config: &AppConfig,
    provider: Arc<dyn Provider>,
) -> Result<KnowledgeIndex, StartupError> {
    let path = config.prompts.knowledge_base_path();
    let index = KnowledgeIndex::from_file(&path, &config.retrieval, provider)
        .await
        .map_err(|e| StartupError::Knowledge(e.to_string()))?;
    if index.chunk_count() == 0 {
        return Err(StartupError::Knowledge(format!(
            "{} produced no chunks",
            path.display()
        )));
    }
    Ok(index)
}

pub async fn open_metrics_store(config: &AppConfig) -> Result<Arc<dyn MetricsStore>, StartupError> {
    let store: Arc<dyn MetricsStore> = match config.telemetry.backend {
        MetricsBackend::File => Arc::new(JsonFileMetricsStore::new(&config.telemetry.path)),
        MetricsBackend::Sqlite => Arc::new(
            SqliteMetricsStore::new(&config.telemetry.path.to_string_lossy())
                .await
                .map_err(|e| StartupError::Metrics(e.to_string()))?,
        ),
        MetricsBackend::Memory => Arc::new(InMemoryMetricsStore::new()),
    };
    store
        .load()
        .await
        .map_err(|e| StartupError::Metrics(e.to_string()))?;
    Ok(store)
}

/// Run every check and wire up the chat service. Any failure is logged
/// and returned; the caller exits non-zero.
pub async fn build_chat_service(config: &AppConfig) -> Result<Arc<ChatService>, StartupError> {
    let result = try_build(config).await;
    match &result {
        Ok(_) => info!("Startup validation successful"),
        Err(e) => error!(error = %e, "Startup validation failed"),
    }
    result
}

async fn try_build(config: &AppConfig) -> Result<Arc<ChatService>, StartupError> {
    check_api_key(config)?;
    let provider = build_provider(config)?;

    let instructions = Arc::new(load_instructions(config)?);
    info!("Static prompts validated");

    let sessions = open_session_store(config).await?;
    info!(backend = sessions.name(), "Session store health check passed");

    let index: Arc<dyn Retriever> = Arc::new(build_knowledge_index(config, provider.clone()).await?);
    info!(retriever = index.name(), "Knowledge index ready");

    let metrics = open_metrics_store(config).await?;
    info!(backend = metrics.name(), "Metrics store loaded");

    let gate = RetrievalGate::from_config(&config.gate)
        .map_err(|e| StartupError::Gate(e.to_string()))?;
    let recorder = Arc::new(MetricsRecorder::from_config(
        metrics,
        &config.telemetry,
        &config.model,
    ));

    Ok(Arc::new(ChatService::new(
        provider,
        ContextAssembler::new(gate, index, recorder.clone()),
        ConversationManager::new(sessions, instructions),
        recorder,
        ChatSettings::from(config),
    )))
}
