//! Context assembler — builds the message sequence for one turn.
//!
//! # Flow
//!
//! 1. Append the user turn to the conversation
//! 2. Ask the [`RetrievalGate`] whether the utterance needs knowledge
//! 3. If so, query the [`Retriever`]:
//!    - passages found: join them (retriever order, blank-line separated)
//!      into one system message placed right after the user turn
//!    - nothing found: log an empty-retrieval event and continue without
//! 4. Hand back the canonical conversation and the transient retrieval
//!    message separately, so the caller decides what gets persisted

use crate::gate::RetrievalGate;
use shopchat_core::error::RetrievalError;
use shopchat_core::message::{Conversation, Message};
use shopchat_core::retriever::{RetrievedPassage, Retriever};
use shopchat_telemetry::{MetricsRecorder, preview};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Separator placed between retrieved passages.
pub const PASSAGE_SEPARATOR: &str = "\n\n";

/// Result of assembling one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledTurn {
    /// History with the new user turn appended. Never contains this turn's
    /// retrieval message.
    pub conversation: Conversation,
    /// The synthetic system message carrying retrieved knowledge, if any.
    pub retrieval: Option<Message>,
}

impl AssembledTurn {
    /// The concatenated retrieved text, for context-size accounting.
    pub fn retrieved_context(&self) -> Option<&str> {
        self.retrieval.as_ref().map(|m| m.content.as_str())
    }

    /// The conversation with the retrieval message in place after the user turn.
    pub fn augmented(&self) -> Conversation {
        let mut augmented = self.conversation.clone();
        if let Some(retrieval) = &self.retrieval {
            augmented.push(retrieval.clone());
        }
        augmented
    }

    /// Messages to send to the provider.
    ///
    /// With `max_history` set, keeps the leading static instructions plus
    /// the last `max_history` later messages. The current user turn and its
    /// retrieval message are always kept.
    pub fn request_messages(&self, max_history: Option<usize>) -> Vec<Message> {
        let augmented = self.augmented();
        let Some(limit) = max_history else {
            return augmented.into_messages();
        };

        let leading = augmented.leading_system_count();
        let augmented = augmented.into_messages();
        let current_turn = 1 + usize::from(self.retrieval.is_some());
        let keep = limit.max(current_turn);
        let history_len = augmented.len() - leading;
        if history_len <= keep {
            return augmented;
        }

        let dropped = history_len - keep;
        debug!(dropped, kept = keep, "History window applied to request");
        let mut messages = augmented;
        messages.drain(leading..leading + dropped);
        messages
    }
}

/// Builds the augmented message sequence for a turn.
pub struct ContextAssembler {
    gate: RetrievalGate,
    retriever: Arc<dyn Retriever>,
    recorder: Arc<MetricsRecorder>,
}

impl ContextAssembler {
    pub fn new(
        gate: RetrievalGate,
        retriever: Arc<dyn Retriever>,
        recorder: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            gate,
            retriever,
            recorder,
        }
    }

    pub fn gate(&self) -> &RetrievalGate {
        &self.gate
    }

    /// Append `utterance` to `conversation` and fold in retrieved knowledge.
    ///
    /// A retriever failure is returned as-is; an empty result is not an error.
    pub async fn assemble(
        &self,
        mut conversation: Conversation,
        utterance: &str,
    ) -> Result<AssembledTurn, RetrievalError> {
        conversation.push(Message::user(utterance));

        if !self.gate.needs_retrieval(utterance) {
            debug!("Conversational turn, retrieval skipped");
            return Ok(AssembledTurn {
                conversation,
                retrieval: None,
            });
        }

        debug!(retriever = self.retriever.name(), "Retrieval gate passed");
        let passages = self.retriever.query(utterance).await?;

        if passages.is_empty() {
            info!(query = %preview(utterance, 50), "No relevant knowledge found");
            if let Err(e) = self.recorder.record_empty_retrieval(utterance).await {
                warn!(error = %e, "Failed to record empty retrieval");
            }
            return Ok(AssembledTurn {
                conversation,
                retrieval: None,
            });
        }

        info!(passages = passages.len(), "Knowledge retrieved");
        for (rank, passage) in passages.iter().enumerate() {
            debug!(
                rank,
                score = passage.score,
                preview = %preview(&passage.content, 80),
                "Retrieved passage"
            );
        }

        Ok(AssembledTurn {
            conversation,
            retrieval: Some(Message::system(join_passages(&passages))),
        })
    }
}

/// Concatenate passage texts in the order given.
pub fn join_passages(passages: &[RetrievedPassage]) -> String {
    passages
        .iter()
        .map(|p| p.content.as_str())
        .collect::<Vec<_>>()
        .join(PASSAGE_SEPARATOR)
}
