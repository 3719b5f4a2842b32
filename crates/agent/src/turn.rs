//! Turn orchestration — `handle_turn(session, utterance)`.
//!
//! One turn runs start to finish:
//!
//! 1. **Validate** the utterance (blank or over-long input never reaches a collaborator)
//! 2. **Load** the session's conversation
//! 3. **Assemble** the user turn and any retrieved knowledge
//! 4. **Complete** with the provider, timing the call
//! 5. **Append** the assistant reply and **save** the conversation
//! 6. **Record** the turn in the metrics
//!
//! Any collaborator failure in steps 2–5 is logged with its detail, recorded
//! as a failed turn, and surfaced as [`TurnErrorKind::ServiceUnavailable`].

use crate::context::{AssembledTurn, ContextAssembler};
use crate::conversation::ConversationManager;
use shopchat_config::AppConfig;
use shopchat_core::message::Message;
use shopchat_core::provider::{Provider, ProviderRequest};
use shopchat_core::session::SessionId;
use shopchat_core::{Error, TurnErrorKind};
use shopchat_telemetry::{ContextText, MetricsRecorder, TurnMetrics, estimate_tokens, preview};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};

/// A turn that could not produce a reply.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Message too long: {chars} characters (max {max})")]
    InputTooLong { chars: usize, max: usize },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(#[from] Error),
}

impl TurnError {
    pub fn kind(&self) -> TurnErrorKind {
        match self {
            Self::InputTooLong { .. } => TurnErrorKind::InputTooLong,
            Self::MalformedInput(_) => TurnErrorKind::MalformedInput,
            Self::ServiceUnavailable(_) => TurnErrorKind::ServiceUnavailable,
        }
    }

    /// The fixed text shown to the end user. Never includes collaborator detail.
    pub fn user_message(&self) -> String {
        match self {
            Self::InputTooLong { max, .. } => format!("Message too long (max {max} characters)"),
            Self::MalformedInput(_) => "Invalid input/ request format.".into(),
            Self::ServiceUnavailable(_) => {
                "Service temporarily unavailable. Try again later.".into()
            }
        }
    }
}

/// Pull the utterance out of a `{"message": string}` request body.
pub fn utterance_from_json(body: &serde_json::Value) -> Result<&str, TurnError> {
    match body.get("message") {
        Some(serde_json::Value::String(s)) => Ok(s),
        Some(other) => Err(TurnError::MalformedInput(format!(
            "message must be a string, got {}",
            json_type(other)
        ))),
        None => Err(TurnError::MalformedInput("missing message field".into())),
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Per-turn knobs, usually taken from [`AppConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_input_chars: usize,
    /// Keep the retrieval message in the saved history.
    pub persist_retrieved_context: bool,
    /// Sliding window applied to the provider request only.
    pub max_history_messages: Option<usize>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ChatSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_input_chars: config.chat.max_input_chars,
            persist_retrieved_context: config.chat.persist_retrieved_context,
            max_history_messages: config.chat.max_history_messages,
        }
    }
}

/// The turn-level API: one utterance in, one reply (or error kind) out.
pub struct ChatService {
    provider: Arc<dyn Provider>,
    assembler: ContextAssembler,
    conversations: ConversationManager,
    recorder: Arc<MetricsRecorder>,
    settings: ChatSettings,
}

impl ChatService {
    pub fn new(
        provider: Arc<dyn Provider>,
        assembler: ContextAssembler,
        conversations: ConversationManager,
        recorder: Arc<MetricsRecorder>,
        settings: ChatSettings,
    ) -> Self {
        info!(
            provider = provider.name(),
            model = %settings.model,
            persist_retrieved_context = settings.persist_retrieved_context,
            "Chat service ready"
        );
        Self {
            provider,
            assembler,
            conversations,
            recorder,
            settings,
        }
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn recorder(&self) -> &Arc<MetricsRecorder> {
        &self.recorder
    }

    pub fn conversations(&self) -> &ConversationManager {
        &self.conversations
    }

    /// Handle one chat turn for `session`.
    pub async fn handle_turn(
        &self,
        session: &SessionId,
        utterance: &str,
    ) -> Result<String, TurnError> {
        self.validate(utterance)?;
        info!(
            session = %session,
            chars = utterance.chars().count(),
            "User message received"
        );

        match self.run(session, utterance).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                error!(
                    session = %session,
                    query = %preview(utterance, 50),
                    error = %e,
                    "Turn failed"
                );
                self.record(TurnMetrics::failed()).await;
                Err(TurnError::ServiceUnavailable(e))
            }
        }
    }

    /// Handle a turn from a JSON body of the form `{"message": string}`.
    pub async fn handle_json_turn(
        &self,
        session: &SessionId,
        body: &serde_json::Value,
    ) -> Result<String, TurnError> {
        let utterance = utterance_from_json(body).inspect_err(|e| {
            warn!(session = %session, error = %e, "Rejected malformed request");
        })?;
        self.handle_turn(session, utterance).await
    }

    fn validate(&self, utterance: &str) -> Result<(), TurnError> {
        let chars = utterance.chars().count();
        let max = self.settings.max_input_chars;
        if chars > max {
            warn!(chars, max, "User message too long");
            return Err(TurnError::InputTooLong { chars, max });
        }
        if utterance.trim().is_empty() {
            warn!("Empty user message");
            return Err(TurnError::MalformedInput("empty message".into()));
        }
        Ok(())
    }

    async fn run(&self, session: &SessionId, utterance: &str) -> Result<String, Error> {
        let history = self.conversations.get_or_init(session).await?;
        let turn = self.assembler.assemble(history, utterance).await?;

        let request = ProviderRequest {
            model: self.settings.model.clone(),
            messages: turn.request_messages(self.settings.max_history_messages),
            temperature: self.settings.temperature,
            max_tokens: Some(self.settings.max_tokens),
        };

        let prompt_tokens: u64 = request
            .messages
            .iter()
            .map(|m| estimate_tokens(&m.content))
            .sum();

        let started = Instant::now();
        let response = self.provider.complete(request).await?;
        let elapsed = started.elapsed();

        let reply = response.message.content;
        let total_tokens = match response.usage {
            Some(usage) => u64::from(usage.total_tokens),
            None => {
                warn!(model = %response.model, "Provider returned no usage, estimating tokens");
                estimate_tokens(&reply) + prompt_tokens
            }
        };
        info!(
            response = %preview(&reply, 50),
            tokens = total_tokens,
            latency_ms = elapsed.as_millis() as u64,
            "AI response generated"
        );

        let context = self.context_text(&turn);
        let mut saved = if self.settings.persist_retrieved_context {
            turn.augmented()
        } else {
            turn.conversation
        };
        saved.push(Message::assistant(reply.as_str()));
        self.conversations.save(session, &saved).await?;

        self.record(TurnMetrics::succeeded(elapsed, total_tokens, Some(context)))
            .await;
        Ok(reply)
    }

    fn context_text(&self, turn: &AssembledTurn) -> ContextText {
        ContextText {
            static_instructions: self.conversations.instructions().combined(),
            retrieved: turn.retrieved_context().map(str::to_string),
        }
    }

    async fn record(&self, metrics: TurnMetrics) {
        if let Err(e) = self.recorder.record(metrics).await {
            warn!(error = %e, "Failed to record turn metrics");
        }
    }
}
