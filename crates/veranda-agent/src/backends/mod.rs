/// Model-inference client.
pub mod converse;
/// Knowledge-base retrieval client.
pub mod knowledge_base;

pub use converse::ConverseClient;
pub use knowledge_base::KnowledgeBaseClient;

use async_trait::async_trait;
use veranda_core::{RetrievedChunk, VerandaResult};

/// Model-inference seam. One prompt in, one answer text out; the
/// implementation owns request shaping and response extraction.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// One completion: the prompt and system prompt in, the answer text out.
    async fn converse(&self, prompt: &str, system_prompt: &str) -> VerandaResult<String>;
}

/// Knowledge-base retrieval seam: ranked text snippets for a query.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// The `top_k` most relevant snippets for the query.
    async fn retrieve(&self, query: &str, top_k: usize) -> VerandaResult<Vec<RetrievedChunk>>;
}
