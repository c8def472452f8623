use super::Retriever;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use veranda_client::ClientPool;
use veranda_core::{RetrievedChunk, VerandaError, VerandaResult};

/// Service name of the knowledge-base retrieval runtime.
pub const AGENT_RUNTIME_SERVICE: &str = "bedrock-agent-runtime";

/// Vector-search retrieval client for one knowledge base.
pub struct KnowledgeBaseClient {
    pool: Arc<ClientPool>,
    knowledge_base_id: String,
}

impl KnowledgeBaseClient {
    /// Creates a retrieval client bound to one knowledge base.
    pub fn new(pool: Arc<ClientPool>, knowledge_base_id: impl Into<String>) -> Self {
        Self {
            pool,
            knowledge_base_id: knowledge_base_id.into(),
        }
    }
}

#[async_trait]
impl Retriever for KnowledgeBaseClient {
    async fn retrieve(&self, query: &str, top_k: usize) -> VerandaResult<Vec<RetrievedChunk>> {
        let client = self.pool.get(AGENT_RUNTIME_SERVICE)?;

        let body = serde_json::json!({
            "retrievalQuery": {"text": query},
            "retrievalConfiguration": {
                "vectorSearchConfiguration": {"numberOfResults": top_k}
            }
        });

        let resp = client
            .post(&format!("/knowledgebases/{}/retrieve", self.knowledge_base_id))
            .json(&body)
            .send()
            .await
            .map_err(|e| VerandaError::Http(e.to_string()))?;

        let status = resp.status();
        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| VerandaError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(VerandaError::Retrieval(format!(
                "retrieve failed with {status}: {payload}"
            )));
        }

        // Results missing a text field are skipped, not fatal.
        let chunks: Vec<RetrievedChunk> = payload["retrievalResults"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|r| {
                let text = r["content"]["text"].as_str()?;
                let score = r["score"].as_f64().unwrap_or(0.0);
                Some(RetrievedChunk::new(text, score))
            })
            .collect();

        debug!(
            knowledge_base_id = %self.knowledge_base_id,
            results = chunks.len(),
            "Knowledge base retrieval finished"
        );
        Ok(chunks)
    }
}
