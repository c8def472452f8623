use crate::backends::{ConverseClient, KnowledgeBaseClient, ModelBackend, Retriever};
use crate::config::AgentConfig;
use crate::prompt::{build_direct_prompt, build_prompt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use veranda_client::{call_with_retry, ClientPool};
use veranda_core::{RetrievedChunk, VerandaError, VerandaResult};
use veranda_memory::MemoryAdapter;

/// Greeting returned when a session is opened.
pub const INITIAL_GREETING: &str = "Hi there, I am your AI agent here to help with \
    questions about the Envision Sustainable Infrastructure Framework.";

/// The query orchestrator.
///
/// Runs the fixed pipeline — history, retrieval, prompt, inference,
/// persistence — and converts every fatal error into an apology string at
/// the boundary: the chat path always has an answer-shaped result for the
/// HTTP layer.
pub struct Agent {
    config: AgentConfig,
    pool: Arc<ClientPool>,
    model: Box<dyn ModelBackend>,
    retriever: Option<Box<dyn Retriever>>,
    memory: MemoryAdapter,
}

impl Agent {
    /// Build the agent with HTTP backends derived from the configuration.
    /// Retrieval is absent (and skipped at query time) when no knowledge
    /// base is configured.
    pub fn new(config: AgentConfig, pool: Arc<ClientPool>, memory: MemoryAdapter) -> Self {
        let model: Box<dyn ModelBackend> = Box::new(ConverseClient::new(
            pool.clone(),
            config.model_id.clone(),
            config.max_tokens,
            config.temperature,
        ));
        let retriever: Option<Box<dyn Retriever>> = config
            .knowledge_base_id
            .as_ref()
            .map(|kb| {
                Box::new(KnowledgeBaseClient::new(pool.clone(), kb.clone()))
                    as Box<dyn Retriever>
            });

        info!(
            model_id = %config.model_id,
            region = %config.region,
            has_knowledge_base = retriever.is_some(),
            has_memory = memory.is_enabled(),
            "Agent initialized"
        );

        Self {
            config,
            pool,
            model,
            retriever,
            memory,
        }
    }

    /// Build from explicit backends (custom providers and tests).
    pub fn with_backends(
        config: AgentConfig,
        pool: Arc<ClientPool>,
        model: Box<dyn ModelBackend>,
        retriever: Option<Box<dyn Retriever>>,
        memory: MemoryAdapter,
    ) -> Self {
        Self {
            config,
            pool,
            model,
            retriever,
            memory,
        }
    }

    /// The configuration this agent was built with.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// The memory adapter, for the clear-memory endpoint and health checks.
    pub fn memory(&self) -> &MemoryAdapter {
        &self.memory
    }

    /// Answer a query through the full RAG pipeline. Never fails: fatal
    /// errors become an apology string carrying the error detail.
    pub async fn answer(&self, query: &str, max_results: Option<usize>) -> String {
        match self.try_answer(query, max_results).await {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "Query pipeline failed");
                format!("Sorry, an error occurred while processing your request: {e}")
            }
        }
    }

    /// Answer without knowledge-base retrieval, still memory-aware.
    pub async fn answer_direct(&self, query: &str) -> String {
        match self.try_answer_direct(query).await {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, "Direct query failed");
                format!("Sorry, an error occurred: {e}")
            }
        }
    }

    async fn try_answer(&self, query: &str, max_results: Option<usize>) -> VerandaResult<String> {
        let history = self.memory.load_history(self.config.history_window).await;

        let contexts = match &self.retriever {
            Some(retriever) => {
                let top_k = max_results.unwrap_or(self.config.max_results);
                info!(query, top_k, "Retrieving knowledge base context");
                call_with_retry(&self.pool, &self.config.retry, || {
                    retriever.retrieve(query, top_k)
                })
                .await?
            }
            None => {
                info!("No knowledge base configured, skipping retrieval");
                Vec::new()
            }
        };

        let prompt = build_prompt(query, &contexts, &history);
        if contexts.is_empty() {
            info!(query, "No relevant context found in knowledge base");
        } else {
            info!(contexts = contexts.len(), "Generating grounded response");
        }

        let answer = self.invoke_model(&prompt).await?;

        // Best-effort: the user keeps their answer even if this fails.
        self.memory.store_turn(query, &answer).await;

        Ok(answer)
    }

    async fn try_answer_direct(&self, query: &str) -> VerandaResult<String> {
        let history = self.memory.load_history(self.config.history_window).await;
        let prompt = build_direct_prompt(query, &history);
        let answer = self.invoke_model(&prompt).await?;
        self.memory.store_turn(query, &answer).await;
        Ok(answer)
    }

    async fn invoke_model(&self, prompt: &str) -> VerandaResult<String> {
        let invocation = call_with_retry(&self.pool, &self.config.retry, || {
            self.model.converse(prompt, &self.config.system_prompt)
        });

        match tokio::time::timeout(
            Duration::from_secs(self.config.model_timeout_secs),
            invocation,
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(VerandaError::Model(format!(
                "request timed out after {}s",
                self.config.model_timeout_secs
            ))),
        }
    }

    /// Used by the retrieval-aware tests: expose whether retrieval is wired.
    pub fn has_knowledge_base(&self) -> bool {
        self.retriever.is_some()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::backends::{ModelBackend, Retriever};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use veranda_client::{RetryPolicy, StaticCredentials};
    use veranda_core::ChatMessage;
    use veranda_memory::{MemoryBackend, MemoryScope, MemoryTier};

    struct MockModel {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl MockModel {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ModelBackend for Arc<MockModel> {
        async fn converse(&self, prompt: &str, _system_prompt: &str) -> VerandaResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    struct SlowModel;

    #[async_trait]
    impl ModelBackend for SlowModel {
        async fn converse(&self, _prompt: &str, _system_prompt: &str) -> VerandaResult<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".into())
        }
    }

    struct MockRetriever {
        results: Mutex<Vec<VerandaResult<Vec<RetrievedChunk>>>>,
        calls: AtomicU32,
    }

    impl MockRetriever {
        fn new(results: Vec<VerandaResult<Vec<RetrievedChunk>>>) -> Self {
            Self {
                results: Mutex::new(results),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Retriever for Arc<MockRetriever> {
        async fn retrieve(
            &self,
            _query: &str,
            _top_k: usize,
        ) -> VerandaResult<Vec<RetrievedChunk>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut results = self.results.lock().unwrap();
            if results.is_empty() {
                Ok(Vec::new())
            } else {
                results.remove(0)
            }
        }
    }

    struct FailingMemory;

    #[async_trait]
    impl MemoryBackend for FailingMemory {
        async fn last_turns(
            &self,
            _scope: &MemoryScope,
            _k: usize,
        ) -> VerandaResult<Vec<Vec<ChatMessage>>> {
            Ok(Vec::new())
        }

        async fn create_event(
            &self,
            _scope: &MemoryScope,
            _messages: &[ChatMessage],
        ) -> VerandaResult<()> {
            Err(VerandaError::Memory("write refused".into()))
        }
    }

    fn pool() -> Arc<ClientPool> {
        Arc::new(ClientPool::new(
            "us-east-1",
            Arc::new(StaticCredentials::new("tok")),
        ))
    }

    fn test_config() -> AgentConfig {
        AgentConfig {
            knowledge_base_id: Some("kb-test".into()),
            retry: RetryPolicy {
                max_retries: 2,
                retry_delay_ms: 0,
            },
            ..AgentConfig::default()
        }
    }

    fn agent_with(
        model: Arc<MockModel>,
        retriever: Option<Arc<MockRetriever>>,
        memory: MemoryAdapter,
    ) -> Agent {
        Agent::with_backends(
            test_config(),
            pool(),
            Box::new(model),
            retriever.map(|r| Box::new(r) as Box<dyn Retriever>),
            memory,
        )
    }

    fn chunk(text: &str) -> RetrievedChunk {
        RetrievedChunk::new(text, 0.9)
    }

    fn expired() -> VerandaError {
        VerandaError::Retrieval("ExpiredTokenException: token expired".into())
    }

    // --- Retry semantics through the pipeline ---

    #[tokio::test]
    async fn expiry_then_success_yields_same_answer() {
        let model = Arc::new(MockModel::new("grounded answer"));
        let retriever = Arc::new(MockRetriever::new(vec![
            Err(expired()),
            Ok(vec![chunk("ctx")]),
        ]));
        let agent = agent_with(model.clone(), Some(retriever.clone()), MemoryAdapter::disabled());

        let answer = agent.answer("question", None).await;
        assert_eq!(answer, "grounded answer");
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 2);
        // The recovered prompt is the grounded-template one.
        assert!(model.prompts.lock().unwrap()[0].contains("ctx"));
    }

    #[tokio::test]
    async fn non_credential_error_invoked_once_and_apologizes() {
        let model = Arc::new(MockModel::new("never used"));
        let retriever = Arc::new(MockRetriever::new(vec![Err(VerandaError::Retrieval(
            "ValidationException: no such knowledge base".into(),
        ))]));
        let agent = agent_with(model.clone(), Some(retriever.clone()), MemoryAdapter::disabled());

        let answer = agent.answer("question", None).await;
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 1);
        assert!(answer.starts_with("Sorry, an error occurred"));
        assert!(answer.contains("ValidationException"));
        // The model was never reached.
        assert!(model.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn retries_bounded_by_policy() {
        let model = Arc::new(MockModel::new("unused"));
        let retriever = Arc::new(MockRetriever::new(vec![
            Err(expired()),
            Err(expired()),
            Err(expired()),
            Err(expired()),
        ]));
        let agent = agent_with(model, Some(retriever.clone()), MemoryAdapter::disabled());

        let answer = agent.answer("question", None).await;
        // max_retries = 2 means at most 3 invocations.
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 3);
        assert!(answer.contains("ExpiredTokenException"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_model_times_out_and_apologizes() {
        let config = AgentConfig {
            model_timeout_secs: 1,
            ..test_config()
        };
        let retriever = Arc::new(MockRetriever::new(vec![Ok(vec![chunk("ctx")])]));
        let agent = Agent::with_backends(
            config,
            pool(),
            Box::new(SlowModel),
            Some(Box::new(retriever) as Box<dyn Retriever>),
            MemoryAdapter::disabled(),
        );

        let answer = agent.answer("question", None).await;
        assert!(answer.starts_with("Sorry, an error occurred"));
        assert!(answer.contains("timed out after 1s"));
    }

    // --- Storage failures never change the answer ---

    #[tokio::test]
    async fn store_failure_does_not_affect_answer() {
        let scope = MemoryScope::for_user("mem-1", "alice");
        let failing = MemoryAdapter::with_backend(
            Arc::new(FailingMemory),
            scope,
            MemoryTier::Turn,
        );

        let model = Arc::new(MockModel::new("the answer"));
        let retriever = Arc::new(MockRetriever::new(vec![Ok(vec![chunk("ctx")])]));
        let agent = agent_with(model.clone(), Some(retriever), failing);
        let with_failing_store = agent.answer("question", None).await;

        let model2 = Arc::new(MockModel::new("the answer"));
        let retriever2 = Arc::new(MockRetriever::new(vec![Ok(vec![chunk("ctx")])]));
        let agent2 = agent_with(model2, Some(retriever2), MemoryAdapter::disabled());
        let with_ok_store = agent2.answer("question", None).await;

        assert_eq!(with_failing_store, "the answer");
        assert_eq!(with_failing_store, with_ok_store);
    }

    // --- Pipeline shape ---

    #[tokio::test]
    async fn no_knowledge_base_skips_retrieval() {
        let model = Arc::new(MockModel::new("ungrounded"));
        let agent = agent_with(model.clone(), None, MemoryAdapter::disabled());
        assert!(!agent.has_knowledge_base());

        let answer = agent.answer("question", None).await;
        assert_eq!(answer, "ungrounded");
        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("No information was found"));
    }

    #[tokio::test]
    async fn end_to_end_prompt_contains_chunk_and_query() {
        let model = Arc::new(MockModel::new("Envision has five categories."));
        let retriever = Arc::new(MockRetriever::new(vec![Ok(vec![chunk(
            "Envision has five categories.",
        )])]));
        let agent = agent_with(model.clone(), Some(retriever), MemoryAdapter::disabled());

        let answer = agent.answer("What is the Envision framework?", None).await;
        assert_eq!(answer, "Envision has five categories.");

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Envision has five categories."));
        assert!(prompts[0].contains("What is the Envision framework?"));
    }

    #[tokio::test]
    async fn direct_answer_skips_templates() {
        let model = Arc::new(MockModel::new("hi"));
        let agent = agent_with(model.clone(), None, MemoryAdapter::disabled());

        let answer = agent.answer_direct("hello").await;
        assert_eq!(answer, "hi");
        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts[0], "hello");
    }
}
