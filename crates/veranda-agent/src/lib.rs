//! The query pipeline: load history, retrieve knowledge-base context,
//! assemble the prompt, invoke the model, persist the turn.
//!
//! Everything heavy happens in managed services reached through
//! [`veranda_client`]; this crate owns the orchestration order, the
//! prompt templates, and the always-answer error policy of the chat path.

/// The query orchestrator.
pub mod agent;
/// Model-inference and retrieval backends.
pub mod backends;
/// Agent configuration.
pub mod config;
/// Prompt assembly.
pub mod prompt;

pub use agent::{Agent, INITIAL_GREETING};
pub use backends::{ConverseClient, KnowledgeBaseClient, ModelBackend, Retriever};
pub use config::AgentConfig;
pub use prompt::{build_prompt, CONTEXT_SEPARATOR};
