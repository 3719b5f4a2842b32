//! Per-turn context assembly.
//!
//! | Position | Source | Persisted |
//! |----------|--------|-----------|
//! | Static instructions | Prompt files | Yes |
//! | History | Session store | Yes |
//! | Current user turn | Caller | Yes |
//! | Retrieved knowledge | Retriever | Only with `persist_retrieved_context` |

pub mod assembler;

pub use assembler::{AssembledTurn, ContextAssembler, PASSAGE_SEPARATOR, join_passages};
