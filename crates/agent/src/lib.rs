//! Turn orchestration for shopchat.
//!
//! Each chat turn follows a fixed pipeline:
//!
//! 1. **Validate** the user utterance
//! 2. **Load** the session's conversation (seeded with static instructions)
//! 3. **Gate** — decide whether retrieval is warranted
//! 4. **Assemble** the request, folding in retrieved knowledge
//! 5. **Complete** via the configured provider
//! 6. **Save** the updated conversation and **record** metrics
//!
//! No conversation state is held in process between turns.

pub mod context;
pub mod conversation;
pub mod gate;
pub mod turn;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{AssembledTurn, ContextAssembler, join_passages};
pub use conversation::{CONVERSATION_KEY, ConversationManager};
pub use gate::RetrievalGate;
pub use turn::{ChatService, ChatSettings, TurnError, utterance_from_json};
