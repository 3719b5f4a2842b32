//! # shopchat core
//!
//! Domain types, collaborator traits, and error definitions for the shopchat
//! retrieval-augmented support assistant. This crate has **zero framework
//! dependencies**: it defines the model every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every collaborator the orchestration layer talks to is a trait here:
//! - [`Provider`]: completions and embeddings from a language model
//! - [`Retriever`]: scored knowledge passages for a query
//! - [`SessionStore`]: per-session key/value persistence
//! - [`PromptSource`]: static instruction text
//!
//! Implementations live in their respective crates, so tests can swap in
//! scripted stand-ins without touching the orchestration code.

pub mod error;
pub mod message;
pub mod prompt;
pub mod provider;
pub mod retriever;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result, TurnErrorKind};
pub use message::{Conversation, Message, Role};
pub use prompt::{FilePromptSource, InlinePromptSource, PromptSource, StaticInstructions};
pub use provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse, Usage,
};
pub use retriever::{RetrievedPassage, Retriever};
pub use session::{SessionId, SessionStore};
