use serde::{Deserialize, Serialize};
use veranda_client::RetryPolicy;

/// Default system prompt: a strictly grounded assistant for the Envision
/// Sustainable Infrastructure Framework manual.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are an expert assistant on the Envision Sustainable Infrastructure Framework Version 3. \
Your sole purpose is to answer questions based on the content of the provided 'ISI Envision.pdf' manual.

Follow these instructions precisely:
1.  When a user asks a question, find the answer *only* within the provided knowledge base context from the Envision manual.
2.  Provide clear, accurate, and concise answers based strictly on the information found in the document. You may quote or paraphrase from the text.
3.  If the user's question cannot be answered using the Envision manual, you must state that you can only answer questions about the Envision Sustainable Infrastructure Framework. Do not use any external knowledge or make assumptions.
4.  If the query is conversational (e.g., \"hello\", \"thank you\"), you may respond politely but briefly.
";

/// Agent configuration. Set once at construction, immutable for the
/// lifetime of the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model identifier passed to the inference API.
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Region the managed services live in.
    #[serde(default = "default_region")]
    pub region: String,
    /// Knowledge base to retrieve from; retrieval is skipped when unset.
    #[serde(default)]
    pub knowledge_base_id: Option<String>,
    /// Managed memory instance; conversation history is skipped when unset.
    #[serde(default)]
    pub memory_id: Option<String>,
    /// System prompt sent with every model invocation.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Completion token cap per invocation.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// How many past turns to load as conversation context.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Default retrieval breadth when the request does not specify one.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Overall timeout around the model-invocation step, in seconds.
    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,
    /// Credential-expiry retry settings for the remote calls.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_model_id() -> String {
    "us.amazon.nova-micro-v1:0".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_temperature() -> f64 {
    0.1
}

fn default_history_window() -> usize {
    5
}

fn default_max_results() -> usize {
    3
}

fn default_model_timeout_secs() -> u64 {
    60
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            region: default_region(),
            knowledge_base_id: None,
            memory_id: None,
            system_prompt: default_system_prompt(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            history_window: default_history_window(),
            max_results: default_max_results(),
            model_timeout_secs: default_model_timeout_secs(),
            retry: RetryPolicy::default(),
        }
    }
}
