//! Shared test helpers: scripted collaborators and a ready-made service.

use crate::context::ContextAssembler;
use crate::conversation::ConversationManager;
use crate::gate::RetrievalGate;
use crate::turn::{ChatService, ChatSettings};
use shopchat_config::GateConfig;
use shopchat_core::error::{ProviderError, RetrievalError};
use shopchat_core::message::Message;
use shopchat_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use shopchat_core::retriever::{RetrievedPassage, Retriever};
use shopchat_core::{InlinePromptSource, StaticInstructions};
use shopchat_memory::InMemorySessionStore;
use shopchat_telemetry::{InMemoryMetricsStore, MetricsRecorder, ModelPricing};
use std::sync::{Arc, Mutex};

pub const SYSTEM_PROMPT: &str = "You are TechMarkt's support assistant.";
pub const GUIDELINES: &str = "Answer briefly and politely.";

/// A mock provider that returns a sequence of scripted outcomes and
/// records every request it receives.
pub struct ScriptedProvider {
    outcomes: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(outcomes: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every scripted call with the given texts, in order.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(make_text_response(t, 15))).collect())
    }

    pub fn failing(error: ProviderError) -> Self {
        Self::new(vec![Err(error)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.is_empty() {
            panic!("ScriptedProvider: no more responses (call #{call})");
        }
        outcomes.remove(0)
    }
}

/// Create a simple text response with the given total token count.
pub fn make_text_response(text: &str, total_tokens: u32) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: total_tokens.saturating_sub(5),
            completion_tokens: total_tokens.min(5),
            total_tokens,
        }),
        model: "mock-model".into(),
    }
}

/// A retriever returning fixed passages (or a fixed error) for every query.
pub struct StaticRetriever {
    outcome: Result<Vec<RetrievedPassage>, RetrievalError>,
    queries: Mutex<Vec<String>>,
}

impl StaticRetriever {
    pub fn passages(texts: &[&str]) -> Self {
        Self {
            outcome: Ok(texts
                .iter()
                .enumerate()
                .map(|(i, t)| RetrievedPassage::new(*t, 0.9 - i as f32 * 0.1))
                .collect()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::passages(&[])
    }

    pub fn failing(error: RetrievalError) -> Self {
        Self {
            outcome: Err(error),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Retriever for StaticRetriever {
    fn name(&self) -> &str {
        "static_mock"
    }

    async fn query(&self, text: &str) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        self.queries.lock().unwrap().push(text.to_string());
        self.outcome.clone()
    }
}

pub fn instructions() -> Arc<StaticInstructions> {
    let source = InlinePromptSource::new()
        .with("sys_prompt.txt", SYSTEM_PROMPT)
        .with("behaviour_guidelines.txt", GUIDELINES);
    Arc::new(StaticInstructions::load(&source, "sys_prompt.txt", "behaviour_guidelines.txt").unwrap())
}

pub fn gate() -> RetrievalGate {
    RetrievalGate::from_config(&GateConfig::default()).unwrap()
}

pub fn recorder() -> Arc<MetricsRecorder> {
    Arc::new(MetricsRecorder::new(
        Arc::new(InMemoryMetricsStore::new()),
        Some(ModelPricing::new(0.15, 0.6)),
        1000,
    ))
}

/// Everything a service test needs to poke at after a turn.
pub struct Harness {
    pub service: ChatService,
    pub provider: Arc<ScriptedProvider>,
    pub retriever: Arc<StaticRetriever>,
    pub sessions: Arc<InMemorySessionStore>,
    pub recorder: Arc<MetricsRecorder>,
}

pub fn harness(
    provider: ScriptedProvider,
    retriever: StaticRetriever,
    settings: ChatSettings,
) -> Harness {
    let provider = Arc::new(provider);
    let retriever = Arc::new(retriever);
    let sessions = Arc::new(InMemorySessionStore::new());
    let recorder = recorder();
    let service = ChatService::new(
        provider.clone(),
        ContextAssembler::new(gate(), retriever.clone(), recorder.clone()),
        ConversationManager::new(sessions.clone(), instructions()),
        recorder.clone(),
        settings,
    );
    Harness {
        service,
        provider,
        retriever,
        sessions,
        recorder,
    }
}
