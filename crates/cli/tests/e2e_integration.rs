//! End-to-end integration tests for the shopchat turn pipeline.
//!
//! These wire the real library crates together (conversation manager,
//! retrieval gate, context assembler, session stores, metrics recorder)
//! around a scripted provider, and check whole turns from utterance to
//! stored history and aggregate metrics.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use shopchat_agent::{
    CONVERSATION_KEY, ChatService, ChatSettings, ContextAssembler, ConversationManager,
    RetrievalGate,
};
use shopchat_config::{GateConfig, RetrievalConfig};
use shopchat_core::error::{ProviderError, RetrievalError};
use shopchat_core::message::{Message, Role};
use shopchat_core::prompt::{InlinePromptSource, StaticInstructions};
use shopchat_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use shopchat_core::retriever::{RetrievedPassage, Retriever};
use shopchat_core::session::{SessionId, SessionStore};
use shopchat_core::TurnErrorKind;
use shopchat_memory::{FileSessionStore, InMemorySessionStore, IndexSettings, KnowledgeIndex};
use shopchat_telemetry::{
    AggregateMetrics, InMemoryMetricsStore, JsonFileMetricsStore, MetricsRecorder, MetricsStore,
    ModelPricing, TurnMetrics,
};

const SYSTEM_PROMPT: &str = "You are the TechMarkt shop assistant.";
const GUIDELINES: &str = "Answer briefly and politely.";

// ── Mock Provider ────────────────────────────────────────────────────────

/// Returns scripted replies in sequence and records every request.
struct ScriptedProvider {
    replies: Vec<Result<String, ProviderError>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn texts(replies: &[&str]) -> Self {
        Self {
            replies: replies.iter().map(|r| Ok(r.to_string())).collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            replies: vec![Err(ProviderError::Network("connection refused".into()))],
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, n: usize) -> ProviderRequest {
        self.requests.lock().unwrap()[n].clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let n = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };
        let reply = self
            .replies
            .get(n)
            .cloned()
            .unwrap_or_else(|| panic!("ScriptedProvider exhausted at call #{n}"))?;
        Ok(ProviderResponse {
            message: Message::assistant(reply),
            usage: Some(Usage {
                prompt_tokens: 80,
                completion_tokens: 20,
                total_tokens: 100,
            }),
            model: request.model,
        })
    }
}

// ── Mock Retriever ───────────────────────────────────────────────────────

struct StaticRetriever {
    passages: Vec<RetrievedPassage>,
    queries: Mutex<Vec<String>>,
}

impl StaticRetriever {
    fn with(passages: &[&str]) -> Self {
        Self {
            passages: passages
                .iter()
                .map(|p| RetrievedPassage::new(*p, 0.9))
                .collect(),
            queries: Mutex::new(Vec::new()),
        }
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Retriever for StaticRetriever {
    fn name(&self) -> &str {
        "static"
    }

    async fn query(&self, text: &str) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        self.queries.lock().unwrap().push(text.to_string());
        Ok(self.passages.clone())
    }
}

// ── Wiring ───────────────────────────────────────────────────────────────

fn instructions() -> Arc<StaticInstructions> {
    let source = InlinePromptSource::new()
        .with("sys_prompt.txt", SYSTEM_PROMPT)
        .with("behaviour_guidelines.txt", GUIDELINES);
    Arc::new(StaticInstructions::load(&source, "sys_prompt.txt", "behaviour_guidelines.txt").unwrap())
}

fn recorder() -> Arc<MetricsRecorder> {
    Arc::new(MetricsRecorder::new(
        Arc::new(InMemoryMetricsStore::new()),
        Some(ModelPricing::new(0.15, 0.6)),
        1000,
    ))
}

fn service(
    provider: Arc<dyn Provider>,
    retriever: Arc<dyn Retriever>,
    sessions: Arc<dyn SessionStore>,
    recorder: Arc<MetricsRecorder>,
) -> ChatService {
    let gate = RetrievalGate::from_config(&GateConfig::default()).unwrap();
    ChatService::new(
        provider,
        ContextAssembler::new(gate, retriever, recorder.clone()),
        ConversationManager::new(sessions, instructions()),
        recorder,
        ChatSettings::default(),
    )
}

fn stored_history(value: Option<serde_json::Value>) -> Vec<Message> {
    serde_json::from_value(value.expect("history saved")).unwrap()
}

// ── E2E: Turns ───────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_greeting_skips_retrieval() {
    let provider = Arc::new(ScriptedProvider::texts(&["Hello! How can I help?"]));
    let retriever = Arc::new(StaticRetriever::with(&["unused"]));
    let sessions = Arc::new(InMemorySessionStore::new());
    let recorder = recorder();
    let chat = service(provider.clone(), retriever.clone(), sessions.clone(), recorder.clone());

    let session = SessionId::from("greeting");
    let reply = chat.handle_turn(&session, "Hello").await.unwrap();
    assert_eq!(reply, "Hello! How can I help?");

    assert!(retriever.queries().is_empty());
    assert_eq!(
        provider.request(0).messages,
        vec![
            Message::system(SYSTEM_PROMPT),
            Message::system(GUIDELINES),
            Message::user("Hello"),
        ]
    );

    let history = stored_history(sessions.get(&session, CONVERSATION_KEY).await.unwrap());
    assert_eq!(history.len(), 4);
    assert_eq!(history[3], Message::assistant("Hello! How can I help?"));

    let summary = recorder.summary().await.unwrap();
    assert_eq!(summary.total_requests, 1);
    assert_eq!(summary.successful_requests, 1);
    assert_eq!(summary.total_tokens, 100);
}

#[tokio::test]
async fn e2e_product_question_injects_passages_transiently() {
    let provider = Arc::new(ScriptedProvider::texts(&["We have two laptops in stock."]));
    let retriever = Arc::new(StaticRetriever::with(&[
        "Laptop Pro 15: 1299 EUR",
        "Laptop Air 13: 899 EUR",
    ]));
    let sessions = Arc::new(InMemorySessionStore::new());
    let chat = service(provider.clone(), retriever.clone(), sessions.clone(), recorder());

    let session = SessionId::from("laptops");
    chat.handle_turn(&session, "Do you have laptops?").await.unwrap();

    assert_eq!(retriever.queries(), vec!["Do you have laptops?".to_string()]);
    let sent = provider.request(0).messages;
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[2], Message::user("Do you have laptops?"));
    assert_eq!(
        sent[3],
        Message::system("Laptop Pro 15: 1299 EUR\n\nLaptop Air 13: 899 EUR")
    );

    // The retrieval message is not part of the saved history.
    let history = stored_history(sessions.get(&session, CONVERSATION_KEY).await.unwrap());
    let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::System, Role::User, Role::Assistant]);
}

#[tokio::test]
async fn e2e_empty_retrieval_is_tracked() {
    let provider = Arc::new(ScriptedProvider::texts(&["Sorry, no laptops right now."]));
    let retriever = Arc::new(StaticRetriever::with(&[]));
    let recorder = recorder();
    let chat = service(
        provider.clone(),
        retriever,
        Arc::new(InMemorySessionStore::new()),
        recorder.clone(),
    );

    chat.handle_turn(&SessionId::new(), "Do you have laptops?")
        .await
        .unwrap();

    assert_eq!(provider.request(0).messages.len(), 3);
    let summary = recorder.summary().await.unwrap();
    assert_eq!(summary.empty_retrieval_count, 1);
    assert_eq!(
        summary.empty_retrieval_queries[0].query,
        "Do you have laptops?"
    );
    assert_eq!(summary.successful_requests, 1);
}

#[tokio::test]
async fn e2e_overlong_input_never_reaches_collaborators() {
    let provider = Arc::new(ScriptedProvider::texts(&[]));
    let retriever = Arc::new(StaticRetriever::with(&["unused"]));
    let sessions = Arc::new(InMemorySessionStore::new());
    let recorder = recorder();
    let chat = service(provider.clone(), retriever.clone(), sessions.clone(), recorder.clone());

    let session = SessionId::from("long");
    let err = chat
        .handle_turn(&session, &"a".repeat(1001))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), TurnErrorKind::InputTooLong);
    assert_eq!(err.user_message(), "Message too long (max 1000 characters)");

    assert_eq!(provider.calls(), 0);
    assert!(retriever.queries().is_empty());
    assert!(sessions.get(&session, CONVERSATION_KEY).await.unwrap().is_none());
    assert_eq!(recorder.summary().await.unwrap().total_requests, 0);

    // Exactly at the limit is accepted.
    let provider = Arc::new(ScriptedProvider::texts(&["ok"]));
    let chat = service(provider.clone(), retriever, sessions, recorder);
    chat.handle_turn(&session, &"a".repeat(1000)).await.unwrap();
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn e2e_provider_failure_is_recorded_and_not_saved() {
    let sessions = Arc::new(InMemorySessionStore::new());
    let recorder = recorder();
    let chat = service(
        Arc::new(ScriptedProvider::failing()),
        Arc::new(StaticRetriever::with(&[])),
        sessions.clone(),
        recorder.clone(),
    );

    let session = SessionId::from("outage");
    let err = chat.handle_turn(&session, "Hello").await.unwrap_err();
    assert_eq!(err.kind(), TurnErrorKind::ServiceUnavailable);
    assert!(!err.user_message().contains("connection refused"));

    assert!(sessions.get(&session, CONVERSATION_KEY).await.unwrap().is_none());
    let summary = recorder.summary().await.unwrap();
    assert_eq!(summary.total_requests, 1);
    assert_eq!(summary.successful_requests, 0);
    assert_eq!(summary.total_cost_usd, 0.0);
}

#[tokio::test]
async fn e2e_history_survives_store_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let session = SessionId::from("sarah");

    let provider = Arc::new(ScriptedProvider::texts(&["Nice to meet you, Sarah!"]));
    let chat = service(
        provider,
        Arc::new(StaticRetriever::with(&[])),
        Arc::new(FileSessionStore::new(dir.path())),
        recorder(),
    );
    chat.handle_turn(&session, "Hello, my name is Sarah")
        .await
        .unwrap();

    // A fresh store over the same directory sees the first turn.
    let provider = Arc::new(ScriptedProvider::texts(&["Your name is Sarah."]));
    let chat = service(
        provider.clone(),
        Arc::new(StaticRetriever::with(&[])),
        Arc::new(FileSessionStore::new(dir.path())),
        recorder(),
    );
    let reply = chat.handle_turn(&session, "What is my name").await.unwrap();
    assert_eq!(reply, "Your name is Sarah.");

    let sent = provider.request(0).messages;
    assert_eq!(sent.len(), 5);
    assert_eq!(sent[2], Message::user("Hello, my name is Sarah"));
    assert_eq!(sent[3], Message::assistant("Nice to meet you, Sarah!"));
    assert_eq!(sent[4], Message::user("What is my name"));
}

#[tokio::test]
async fn e2e_keyword_index_answers_product_question() {
    let index = KnowledgeIndex::keyword(
        "knowledge_base_techmarkt.txt",
        "Laptops start at 499 EUR.\n\nReturns are accepted within 30 days.",
        IndexSettings::from(&RetrievalConfig::default()),
    )
    .unwrap();
    let provider = Arc::new(ScriptedProvider::texts(&["Laptops start at 499 EUR."]));
    let chat = service(
        provider.clone(),
        Arc::new(index),
        Arc::new(InMemorySessionStore::new()),
        recorder(),
    );

    chat.handle_turn(&SessionId::new(), "Do you have laptops?")
        .await
        .unwrap();

    let sent = provider.request(0).messages;
    let retrieval = sent.last().unwrap();
    assert_eq!(retrieval.role, Role::System);
    assert!(retrieval.content.contains("Laptops start at 499 EUR."));
}

#[tokio::test]
async fn e2e_json_body_turns() {
    let provider = Arc::new(ScriptedProvider::texts(&["Hi!"]));
    let chat = service(
        provider,
        Arc::new(StaticRetriever::with(&[])),
        Arc::new(InMemorySessionStore::new()),
        recorder(),
    );
    let session = SessionId::new();

    let err = chat
        .handle_json_turn(&session, &serde_json::json!({"message": 42}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), TurnErrorKind::MalformedInput);

    let reply = chat
        .handle_json_turn(&session, &serde_json::json!({"message": "Hello"}))
        .await
        .unwrap();
    assert_eq!(reply, "Hi!");
}

// ── E2E: Metrics ─────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_record_then_summary() {
    let recorder = recorder();
    recorder
        .record(TurnMetrics::succeeded(Duration::from_secs(1), 100, None))
        .await
        .unwrap();

    let summary = recorder.summary().await.unwrap();
    assert_eq!(summary.total_requests, 1);
    assert_eq!(summary.successful_requests, 1);
    assert_eq!(summary.average_tokens_per_conversation, 100.0);
    assert_eq!(summary.average_response_time_secs, 1.0);
}

#[tokio::test]
async fn e2e_empty_retrieval_log_keeps_most_recent_thousand() {
    let recorder = recorder();
    for i in 0..1001 {
        recorder
            .record_empty_retrieval(&format!("query {i}"))
            .await
            .unwrap();
    }

    let summary = recorder.summary().await.unwrap();
    assert_eq!(summary.empty_retrieval_count, 1001);
    assert_eq!(summary.empty_retrieval_queries.len(), 1000);
    assert_eq!(summary.empty_retrieval_queries[0].query, "query 1");
    assert_eq!(summary.empty_retrieval_queries[999].query, "query 1000");
}

#[tokio::test]
async fn e2e_corrupt_metrics_file_is_archived_and_reset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.json");
    std::fs::write(&path, "{ this is not json").unwrap();

    let store = JsonFileMetricsStore::new(&path);
    let metrics = store.load().await.unwrap();
    assert_eq!(
        AggregateMetrics {
            last_updated: None,
            ..metrics
        },
        AggregateMetrics::default()
    );

    let archived: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("metrics.json.corrupted."))
        .collect();
    assert_eq!(archived.len(), 1);

    // The replacement record is usable.
    let recorder = MetricsRecorder::new(Arc::new(store), None, 1000);
    recorder
        .record(TurnMetrics::succeeded(Duration::from_millis(250), 40, None))
        .await
        .unwrap();
    assert_eq!(recorder.summary().await.unwrap().total_requests, 1);
}
