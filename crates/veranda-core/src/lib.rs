//! Core types and error definitions shared across the Veranda workspace.
//!
//! Veranda proxies chat queries to managed cloud services (model inference,
//! vector knowledge base, conversation memory); this crate holds the types
//! those layers exchange.
//!
//! # Main types
//!
//! - [`VerandaError`] — Unified error enum for all Veranda subsystems.
//! - [`VerandaResult`] — Convenience alias for `Result<T, VerandaError>`.
//! - [`Role`] — Author of a chat message (user, assistant, system).
//! - [`ChatMessage`] — One message as sent to or returned by the model API.
//! - [`Turn`] — A completed (user, assistant) exchange.
//! - [`RetrievedChunk`] — A scored text snippet from the knowledge base.

use serde::{Deserialize, Serialize};

// --- Error types ---

/// Top-level error type for Veranda.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum VerandaError {
    /// An error from the model-inference service.
    #[error("Model error: {0}")]
    Model(String),

    /// An error from the knowledge-base retrieval service.
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// An error from the managed memory service.
    #[error("Memory error: {0}")]
    Memory(String),

    /// An error related to session persistence or lookup.
    #[error("Session error: {0}")]
    Session(String),

    /// A credential resolution or expiry error.
    #[error("Credential error: {0}")]
    Credential(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error from the HTTP gateway layer.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// An error from an outbound HTTP request.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`VerandaError`].
pub type VerandaResult<T> = Result<T, VerandaError>;

// --- Message types ---

/// The author of a [`ChatMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A human end-user.
    User,
    /// The AI assistant.
    Assistant,
    /// A system-level marker (e.g. the memory-cleared sentinel).
    System,
}

impl Role {
    /// Wire name used by the remote APIs ("user", "assistant", "system").
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    /// Display label for history rendering ("User", "Assistant", "System").
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::System => "System",
        }
    }
}

/// A single message exchanged with the model or memory service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message author.
    pub role: Role,
    /// The textual content of the message.
    pub content: String,
}

impl ChatMessage {
    /// Creates a new message with the given role and content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a new message with [`Role::User`].
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates a new message with [`Role::Assistant`].
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Creates a new message with [`Role::System`].
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// A completed (user, assistant) exchange. Immutable once stored; the
/// memory backend owns the canonical sequence of turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// What the user asked.
    pub user: String,
    /// What the assistant answered.
    pub assistant: String,
}

impl Turn {
    /// Creates a turn from the user's query and the assistant's answer.
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }

    /// Render as the two "Role: content" history lines.
    pub fn render(&self) -> String {
        format!("User: {}\nAssistant: {}", self.user, self.assistant)
    }
}

// --- Retrieval types ---

/// A text snippet plus relevance score returned by the knowledge base.
/// Ephemeral: consumed by the prompt assembler, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// The snippet text.
    pub text: String,
    /// Relevance score assigned by the vector search.
    pub score: f64,
}

impl RetrievedChunk {
    /// Creates a chunk from its snippet text and relevance score.
    pub fn new(text: impl Into<String>, score: f64) -> Self {
        Self {
            text: text.into(),
            score,
        }
    }
}
