use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use veranda_client::ClientPool;
use veranda_core::{ChatMessage, Role, VerandaError, VerandaResult};

/// Service name of the managed memory data plane.
pub const MEMORY_SERVICE: &str = "bedrock-agentcore";

/// The (memory, actor, session, branch) coordinate that scopes stored
/// turns to one user and conversation line.
#[derive(Debug, Clone)]
pub struct MemoryScope {
    /// The managed memory instance.
    pub memory_id: String,
    /// Actor writing and reading the turns.
    pub actor_id: String,
    /// Conversation line within the actor.
    pub session_id: String,
    /// Branch within the session.
    pub branch: String,
}

impl MemoryScope {
    /// Derive the conventional scope for a user: one actor and session per
    /// user id, on the `main` branch.
    pub fn for_user(memory_id: impl Into<String>, user_id: &str) -> Self {
        Self {
            memory_id: memory_id.into(),
            actor_id: format!("envision_agent_{user_id}"),
            session_id: user_id.to_string(),
            branch: "main".to_string(),
        }
    }
}

/// One tier of the managed memory service.
///
/// `last_turns` returns the most recent turns oldest-first, each turn a
/// list of messages. `create_event` appends one event; stored events are
/// immutable — the only "deletion" the service offers is the sentinel
/// marker the adapter writes on clear.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// The most recent `k` turns, oldest first.
    async fn last_turns(
        &self,
        scope: &MemoryScope,
        k: usize,
    ) -> VerandaResult<Vec<Vec<ChatMessage>>>;

    /// Append one event holding the given messages.
    async fn create_event(
        &self,
        scope: &MemoryScope,
        messages: &[ChatMessage],
    ) -> VerandaResult<()>;
}

fn memory_error(context: &str, status: reqwest::StatusCode, body: &str) -> VerandaError {
    VerandaError::Memory(format!("{context} failed with {status}: {body}"))
}

/// A status that means the route itself does not exist on this deployment,
/// as opposed to a rejected or failed request against an existing API.
fn route_missing(status: reqwest::StatusCode) -> bool {
    matches!(
        status,
        reqwest::StatusCode::NOT_FOUND
            | reqwest::StatusCode::METHOD_NOT_ALLOWED
            | reqwest::StatusCode::NOT_IMPLEMENTED
    )
}

// --- Primary tier: turn-oriented events API ---

/// Turn-oriented client against the memory data plane. Events carry
/// discrete `{role, content}` messages per turn.
pub struct TurnMemoryClient {
    pool: Arc<ClientPool>,
}

impl TurnMemoryClient {
    /// Construct the client, eagerly resolving the service handle so a
    /// broken setup fails here (at startup) rather than mid-request.
    pub fn new(pool: Arc<ClientPool>) -> VerandaResult<Self> {
        pool.get(MEMORY_SERVICE)?;
        Ok(Self { pool })
    }

    /// Construct the client and verify the deployment actually serves the
    /// events API. Errs when the events routes are absent, so tier
    /// selection can fall back to the blob API.
    pub async fn connect(pool: Arc<ClientPool>, scope: &MemoryScope) -> VerandaResult<Self> {
        let client = pool.get(MEMORY_SERVICE)?;
        let body = serde_json::json!({
            "maxResults": 1,
            "branch": {"name": scope.branch},
        });
        let resp = client
            .post(&format!("{}/list", Self::events_path(scope)))
            .json(&body)
            .send()
            .await
            .map_err(|e| VerandaError::Http(e.to_string()))?;
        let status = resp.status();
        if route_missing(status) {
            return Err(VerandaError::Memory(format!(
                "events API not served ({status})"
            )));
        }
        Ok(Self { pool })
    }

    fn events_path(scope: &MemoryScope) -> String {
        format!(
            "/memories/{}/actors/{}/sessions/{}/events",
            scope.memory_id, scope.actor_id, scope.session_id
        )
    }
}

#[async_trait]
impl MemoryBackend for TurnMemoryClient {
    async fn last_turns(
        &self,
        scope: &MemoryScope,
        k: usize,
    ) -> VerandaResult<Vec<Vec<ChatMessage>>> {
        let client = self.pool.get(MEMORY_SERVICE)?;
        let body = serde_json::json!({
            "maxResults": k,
            "branch": {"name": scope.branch},
        });

        let resp = client
            .post(&format!("{}/list", Self::events_path(scope)))
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
            return Err(memory_error("list events", status, &payload.to_string()));
        }

        let mut turns = Vec::new();
        for event in payload["events"].as_array().into_iter().flatten() {
            let mut turn = Vec::new();
            for item in event["payload"].as_array().into_iter().flatten() {
                let msg = &item["conversational"];
                let role = match msg["role"].as_str() {
                    Some("USER") | Some("user") => Role::User,
                    Some("ASSISTANT") | Some("assistant") => Role::Assistant,
                    _ => Role::System,
                };
                if let Some(text) = msg["content"]["text"].as_str() {
                    turn.push(ChatMessage::new(role, text));
                }
            }
            if !turn.is_empty() {
                turns.push(turn);
            }
        }
        debug!(turns = turns.len(), "Loaded recent turns from memory");
        Ok(turns)
    }

    async fn create_event(
        &self,
        scope: &MemoryScope,
        messages: &[ChatMessage],
    ) -> VerandaResult<()> {
        let client = self.pool.get(MEMORY_SERVICE)?;
        let payload: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "conversational": {
                        "role": m.role.as_str().to_uppercase(),
                        "content": {"text": m.content},
                    }
                })
            })
            .collect();
        let body = serde_json::json!({
            "branch": {"name": scope.branch},
            "payload": payload,
        });

        let resp = client
            .post(&Self::events_path(scope))
            .json(&body)
            .send()
            .await
            .map_err(|e| VerandaError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(memory_error("create event", status, &body));
        }
        Ok(())
    }
}

// --- Fallback tier: blob-oriented memory API ---

/// Blob-oriented client against the older memory API. Content is a flat
/// list of text blobs, not discrete turns; stored blobs carry a
/// `User:`/`Assistant:` prefix which reads back as the message role.
pub struct BlobMemoryClient {
    pool: Arc<ClientPool>,
}

impl BlobMemoryClient {
    /// Construct the client, eagerly resolving the service handle so a
    /// broken setup fails here (at startup) rather than mid-request.
    pub fn new(pool: Arc<ClientPool>) -> VerandaResult<Self> {
        pool.get(MEMORY_SERVICE)?;
        Ok(Self { pool })
    }

    /// Construct the client and verify the blob resource exists on this
    /// deployment. Errs when `/memories/{id}` is absent.
    pub async fn connect(pool: Arc<ClientPool>, scope: &MemoryScope) -> VerandaResult<Self> {
        let client = pool.get(MEMORY_SERVICE)?;
        let resp = client
            .get(&format!("/memories/{}", scope.memory_id))
            .send()
            .await
            .map_err(|e| VerandaError::Http(e.to_string()))?;
        let status = resp.status();
        if route_missing(status) {
            return Err(VerandaError::Memory(format!(
                "blob memory not served ({status})"
            )));
        }
        Ok(Self { pool })
    }

    fn parse_blob(blob: &str) -> ChatMessage {
        if let Some(rest) = blob.strip_prefix("User: ") {
            ChatMessage::user(rest)
        } else if let Some(rest) = blob.strip_prefix("Assistant: ") {
            ChatMessage::assistant(rest)
        } else {
            ChatMessage::system(blob)
        }
    }
}

#[async_trait]
impl MemoryBackend for BlobMemoryClient {
    async fn last_turns(
        &self,
        scope: &MemoryScope,
        k: usize,
    ) -> VerandaResult<Vec<Vec<ChatMessage>>> {
        let client = self.pool.get(MEMORY_SERVICE)?;
        let resp = client
            .get(&format!("/memories/{}", scope.memory_id))
            .send()
            .await
            .map_err(|e| VerandaError::Http(e.to_string()))?;

        let status = resp.status();
        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| VerandaError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(memory_error("get memory", status, &payload.to_string()));
        }

        let blobs: Vec<&str> = payload["memoryContents"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|c| c["content"].as_str())
            .collect();

        // Blobs are flat; the last k blobs stand in for "turns" of one
        // message each. Different semantics from the primary tier, kept
        // as the original fallback behaved.
        let start = blobs.len().saturating_sub(k);
        Ok(blobs[start..]
            .iter()
            .map(|b| vec![Self::parse_blob(b)])
            .collect())
    }

    async fn create_event(
        &self,
        scope: &MemoryScope,
        messages: &[ChatMessage],
    ) -> VerandaResult<()> {
        let client = self.pool.get(MEMORY_SERVICE)?;
        let contents: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "content": format!("{}: {}", m.role.label(), m.content),
                    "contentType": "TEXT",
                })
            })
            .collect();
        let body = serde_json::json!({"memoryContents": contents});

        let resp = client
            .post(&format!("/memories/{}", scope.memory_id))
            .json(&body)
            .send()
            .await
            .map_err(|e| VerandaError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(memory_error("update memory", status, &body));
        }
        Ok(())
    }
}
