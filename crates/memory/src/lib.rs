//! Session stores and the knowledge index for shopchat.
//!
//! Session stores implement `shopchat_core::SessionStore`; the knowledge
//! index implements `shopchat_core::Retriever`.

pub mod file_backend;
pub mod in_memory;
pub mod knowledge;
pub mod vector;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file_backend::FileSessionStore;
pub use in_memory::InMemorySessionStore;
pub use knowledge::{IndexSettings, KnowledgeIndex, TextChunker};
pub use vector::{cosine_similarity, top_k};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSessionStore;
