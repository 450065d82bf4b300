//! Conversation engine - LLM-driven lead gathering and commit
//!
//! This crate is the "brain" of leadline: it holds per-user dialogue state,
//! asks the language model to continue each conversation, and turns the
//! model's structured tool call into a lead commit.
//!
//! # Architecture
//!
//! The engine follows a constrained loop per incoming message:
//! 1. **Session lookup** (`session`) - Find or create the user's history
//! 2. **Model turn** (`llm`) - Full history in, reply or tool call out
//! 3. **Commit** (`conversation`) - Tool call → local sink + best-effort
//!    tracker task, exactly once per session
//!
//! # Key Types
//!
//! - `ConversationEngine` - Main orchestrator (see `conversation` module)
//! - `ChatModel` - Pluggable trait over the model provider
//! - `LeadSink` - Where committed leads land (direct store or HTTP ingest)
//!
//! # Safety Principle
//!
//! The model only decides *when* enough information has been gathered. What
//! gets persisted, how commits are bounded, and what the user is told on
//! failure are deterministic decisions made here.

pub mod conversation;
pub mod heuristics;
pub mod llm;
pub mod session;
pub mod sink;

pub use conversation::{ConversationEngine, EngineError};
pub use llm::{ChatModel, ChatTurn, ModelError, ModelOutput, OpenAiChatModel, Role};
pub use session::{ConversationPhase, Session, SessionStore};
pub use sink::{HttpIngestSink, LeadSink, StoreSink};
