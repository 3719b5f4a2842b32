//! Conversation state manager — loads, seeds and saves one session's history.
//!
//! The conversation is stored under a single session key as a plain list of
//! `{role, content}` objects. Nothing is cached between turns.

use shopchat_core::error::SessionError;
use shopchat_core::message::Conversation;
use shopchat_core::prompt::StaticInstructions;
use shopchat_core::session::{SessionId, SessionStore};
use std::sync::Arc;
use tracing::{debug, info};

/// The session key the conversation lives under.
pub const CONVERSATION_KEY: &str = "messages";

pub struct ConversationManager {
    store: Arc<dyn SessionStore>,
    instructions: Arc<StaticInstructions>,
}

impl ConversationManager {
    pub fn new(store: Arc<dyn SessionStore>, instructions: Arc<StaticInstructions>) -> Self {
        Self {
            store,
            instructions,
        }
    }

    pub fn instructions(&self) -> &StaticInstructions {
        &self.instructions
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// The stored conversation, or a fresh one seeded with the static
    /// instructions (system prompt, then guidelines).
    pub async fn get_or_init(&self, session: &SessionId) -> Result<Conversation, SessionError> {
        match self.store.get(session, CONVERSATION_KEY).await? {
            Some(value) => {
                let conversation: Conversation = serde_json::from_value(value)
                    .map_err(|e| SessionError::Corrupt(format!("{session}: {e}")))?;
                if conversation.is_empty() {
                    return Ok(self.seed(session));
                }
                debug!(
                    session = %session,
                    messages = conversation.len(),
                    "Conversation loaded"
                );
                Ok(conversation)
            }
            None => Ok(self.seed(session)),
        }
    }

    /// Persist the full conversation for `session`.
    pub async fn save(
        &self,
        session: &SessionId,
        conversation: &Conversation,
    ) -> Result<(), SessionError> {
        let value = serde_json::to_value(conversation)
            .map_err(|e| SessionError::Storage(format!("serialise conversation: {e}")))?;
        self.store.set(session, CONVERSATION_KEY, value).await?;
        debug!(session = %session, messages = conversation.len(), "Conversation saved");
        Ok(())
    }

    fn seed(&self, session: &SessionId) -> Conversation {
        info!(session = %session, "New conversation initialized with system prompts");
        Conversation::seeded(self.instructions.in_order())
    }
}
