use crate::backend::{BlobMemoryClient, MemoryBackend, MemoryScope, TurnMemoryClient};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use veranda_client::ClientPool;
use veranda_core::{ChatMessage, VerandaError, VerandaResult};

/// Which memory tier a deployment ended up with. Decided once at startup,
/// never re-probed per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryTier {
    /// Primary turn-oriented data plane.
    Turn,
    /// Fallback blob-oriented API.
    Blob,
    /// No memory id configured, or neither tier could be constructed.
    Disabled,
}

/// Reads and writes the bounded conversation window for one scope.
///
/// All reads soft-fail to empty context and all writes are best-effort:
/// the managed memory service going away must never fail a query. The
/// one exception is [`clear`](MemoryAdapter::clear), whose caller needs
/// to know whether memory exists at all.
pub struct MemoryAdapter {
    backend: Option<Arc<dyn MemoryBackend>>,
    scope: Option<MemoryScope>,
    tier: MemoryTier,
}

impl MemoryAdapter {
    /// Build the adapter by asking the deployment which memory API it
    /// serves: the turn-oriented events API wins when present, the blob
    /// API is the fallback, and if neither answers the adapter is
    /// disabled. With no memory id the adapter is disabled without any
    /// network traffic.
    pub async fn detect(pool: Arc<ClientPool>, scope: Option<MemoryScope>) -> Self {
        let Some(scope) = scope else {
            debug!("No memory id configured, conversation memory disabled");
            return Self::disabled();
        };

        match TurnMemoryClient::connect(pool.clone(), &scope).await {
            Ok(client) => {
                info!(memory_id = %scope.memory_id, "Using turn-oriented memory tier");
                Self::with_backend(Arc::new(client), scope, MemoryTier::Turn)
            }
            Err(e) => {
                warn!(error = %e, "Turn memory tier unavailable, trying blob fallback");
                match BlobMemoryClient::connect(pool, &scope).await {
                    Ok(client) => {
                        info!(memory_id = %scope.memory_id, "Using blob memory tier");
                        Self::with_backend(Arc::new(client), scope, MemoryTier::Blob)
                    }
                    Err(e) => {
                        warn!(error = %e, "No memory backend available, running without history");
                        Self::disabled()
                    }
                }
            }
        }
    }

    /// Adapter over an explicit backend. Used by detection and by tests.
    pub fn with_backend(
        backend: Arc<dyn MemoryBackend>,
        scope: MemoryScope,
        tier: MemoryTier,
    ) -> Self {
        Self {
            backend: Some(backend),
            scope: Some(scope),
            tier,
        }
    }

    /// An adapter that always returns empty history and drops writes.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            scope: None,
            tier: MemoryTier::Disabled,
        }
    }

    /// Which tier this adapter ended up on.
    pub fn tier(&self) -> MemoryTier {
        self.tier
    }

    /// Whether any backend is wired at all.
    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Fetch the last `k` turns rendered as alternating "Role: content"
    /// lines. Missing backend, empty memory, and backend errors all yield
    /// an empty string — history is optional context, never a failure.
    pub async fn load_history(&self, k: usize) -> String {
        let (Some(backend), Some(scope)) = (&self.backend, &self.scope) else {
            debug!("No memory backend configured");
            return String::new();
        };

        match backend.last_turns(scope, k).await {
            Ok(turns) if turns.is_empty() => {
                debug!("No previous conversation history found");
                String::new()
            }
            Ok(turns) => {
                let lines: Vec<String> = turns
                    .iter()
                    .flatten()
                    .map(|m| format!("{}: {}", m.role.label(), m.content))
                    .collect();
                debug!(turns = turns.len(), "Loaded conversation history");
                lines.join("\n")
            }
            Err(e) => {
                warn!(error = %e, "Failed to load conversation history");
                String::new()
            }
        }
    }

    /// Append one (user, assistant) turn. Best-effort: a storage failure
    /// is logged and swallowed so the already-computed answer still
    /// reaches the user.
    pub async fn store_turn(&self, user_message: &str, assistant_message: &str) {
        let (Some(backend), Some(scope)) = (&self.backend, &self.scope) else {
            debug!("No memory backend configured, turn not stored");
            return;
        };

        let messages = [
            ChatMessage::user(user_message),
            ChatMessage::assistant(assistant_message),
        ];
        match backend.create_event(scope, &messages).await {
            Ok(()) => debug!(memory_id = %scope.memory_id, "Stored conversation turn"),
            Err(e) => error!(error = %e, "Failed to store conversation turn"),
        }
    }

    /// Append the "Memory cleared" sentinel event. The service offers no
    /// physical deletion; prior turns remain but the marker tells readers
    /// the history restarted here.
    pub async fn clear(&self) -> VerandaResult<()> {
        let (Some(backend), Some(scope)) = (&self.backend, &self.scope) else {
            return Err(VerandaError::Memory(
                "no memory backend configured".into(),
            ));
        };

        backend
            .create_event(scope, &[ChatMessage::system("Memory cleared")])
            .await?;
        info!(memory_id = %scope.memory_id, "Memory cleared");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use veranda_core::Role;

    struct MockBackend {
        turns: Vec<Vec<ChatMessage>>,
        fail_reads: bool,
        fail_writes: bool,
        events: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl MockBackend {
        fn new(turns: Vec<Vec<ChatMessage>>) -> Self {
            Self {
                turns,
                fail_reads: false,
                fail_writes: false,
                events: Mutex::new(Vec::new()),
            }
        }

        fn failing_reads() -> Self {
            Self {
                fail_reads: true,
                ..Self::new(vec![])
            }
        }

        fn failing_writes() -> Self {
            Self {
                fail_writes: true,
                ..Self::new(vec![])
            }
        }
    }

    #[async_trait]
    impl MemoryBackend for MockBackend {
        async fn last_turns(
            &self,
            _scope: &MemoryScope,
            k: usize,
        ) -> VerandaResult<Vec<Vec<ChatMessage>>> {
            if self.fail_reads {
                return Err(VerandaError::Memory("service unavailable".into()));
            }
            let start = self.turns.len().saturating_sub(k);
            Ok(self.turns[start..].to_vec())
        }

        async fn create_event(
            &self,
            _scope: &MemoryScope,
            messages: &[ChatMessage],
        ) -> VerandaResult<()> {
            if self.fail_writes {
                return Err(VerandaError::Memory("service unavailable".into()));
            }
            self.events.lock().unwrap().push(messages.to_vec());
            Ok(())
        }
    }

    fn scope() -> MemoryScope {
        MemoryScope::for_user("mem-1", "alice")
    }

    fn adapter(backend: MockBackend) -> (Arc<MockBackend>, MemoryAdapter) {
        let backend = Arc::new(backend);
        let adapter =
            MemoryAdapter::with_backend(backend.clone(), scope(), MemoryTier::Turn);
        (backend, adapter)
    }

    #[tokio::test]
    async fn test_load_history_formats_role_lines() {
        let (_, adapter) = adapter(MockBackend::new(vec![vec![
            ChatMessage::user("What is Envision?"),
            ChatMessage::assistant("A rating framework."),
        ]]));

        let history = adapter.load_history(5).await;
        assert_eq!(
            history,
            "User: What is Envision?\nAssistant: A rating framework."
        );
    }

    #[tokio::test]
    async fn test_load_history_empty_when_no_turns() {
        let (_, adapter) = adapter(MockBackend::new(vec![]));
        assert_eq!(adapter.load_history(5).await, "");
    }

    #[tokio::test]
    async fn test_load_history_soft_fails_on_backend_error() {
        let (_, adapter) = adapter(MockBackend::failing_reads());
        assert_eq!(adapter.load_history(5).await, "");
    }

    #[tokio::test]
    async fn test_load_history_disabled_adapter() {
        let adapter = MemoryAdapter::disabled();
        assert_eq!(adapter.tier(), MemoryTier::Disabled);
        assert!(!adapter.is_enabled());
        assert_eq!(adapter.load_history(5).await, "");
    }

    #[tokio::test]
    async fn test_load_history_bounded_window() {
        let turns: Vec<Vec<ChatMessage>> = (0..10)
            .map(|i| {
                vec![
                    ChatMessage::user(format!("q{i}")),
                    ChatMessage::assistant(format!("a{i}")),
                ]
            })
            .collect();
        let (_, adapter) = adapter(MockBackend::new(turns));

        let history = adapter.load_history(2).await;
        assert!(history.contains("q8"));
        assert!(history.contains("q9"));
        assert!(!history.contains("q7"));
    }

    #[tokio::test]
    async fn test_store_turn_records_user_and_assistant() {
        let (backend, adapter) = adapter(MockBackend::new(vec![]));
        adapter.store_turn("hello", "hi there").await;

        let events = backend.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0][0].role, Role::User);
        assert_eq!(events[0][0].content, "hello");
        assert_eq!(events[0][1].role, Role::Assistant);
        assert_eq!(events[0][1].content, "hi there");
    }

    #[tokio::test]
    async fn test_store_turn_swallows_failure() {
        let (_, adapter) = adapter(MockBackend::failing_writes());
        // Must not panic or surface the error.
        adapter.store_turn("hello", "hi").await;
    }

    #[tokio::test]
    async fn test_clear_appends_sentinel() {
        let (backend, adapter) = adapter(MockBackend::new(vec![]));
        adapter.clear().await.unwrap();

        let events = backend.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0][0].role, Role::System);
        assert_eq!(events[0][0].content, "Memory cleared");
    }

    #[tokio::test]
    async fn test_clear_errors_when_disabled() {
        let adapter = MemoryAdapter::disabled();
        assert!(adapter.clear().await.is_err());
    }
}
