use crate::error::ApiError;
use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{info, warn};
use veranda_agent::{Agent, INITIAL_GREETING};
use veranda_session::{Session, SessionStore};

/// Shared application state.
pub struct AppState {
    /// The query orchestrator.
    pub agent: Arc<Agent>,
    /// Transcript store.
    pub sessions: Arc<dyn SessionStore>,
}

/// The HTTP gateway.
pub struct GatewayServer;

impl GatewayServer {
    /// Assemble the router over the given agent and session store.
    pub fn build(agent: Arc<Agent>, sessions: Arc<dyn SessionStore>) -> Router {
        let state = Arc::new(AppState { agent, sessions });

        Router::new()
            .route("/health", get(health_handler))
            .route("/ping", get(ping_handler))
            .route("/query", post(query_handler))
            .route("/invocations", post(invocations_handler))
            .route("/clear-memory", post(clear_memory_handler))
            .route("/sessions", post(create_session_handler))
            .route("/sessions/{id}", get(get_session_handler))
            .route("/sessions/{id}", axum::routing::delete(delete_session_handler))
            .with_state(state)
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = state.agent.config();
    let has_knowledge_base = config.knowledge_base_id.is_some();
    let has_memory = state.agent.memory().is_enabled();

    // Missing backends degrade the status without failing the check.
    let status = if has_knowledge_base && has_memory {
        "healthy"
    } else {
        "degraded"
    };

    Json(json!({
        "status": status,
        "service": "veranda",
        "configuration": {
            "model_id": config.model_id,
            "region": config.region,
            "has_knowledge_base": has_knowledge_base,
            "has_memory": has_memory,
        }
    }))
}

async fn ping_handler() -> Json<Value> {
    Json(json!({"message": "pong", "status": "ok"}))
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    #[serde(default)]
    query: String,
    session_id: Option<String>,
    max_results: Option<usize>,
    #[serde(default = "default_use_rag")]
    use_rag: bool,
}

fn default_use_rag() -> bool {
    true
}

/// The chat endpoint. Validation failures are 400s; once the pipeline
/// runs, the response is a 200 whatever happened inside it.
async fn query_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<Value>, ApiError> {
    let query = req.query.trim().to_string();
    if query.is_empty() {
        return Err(ApiError::validation("Query cannot be empty"));
    }

    info!(query_length = query.len(), use_rag = req.use_rag, "Processing query");

    let response = if req.use_rag && state.agent.has_knowledge_base() {
        state.agent.answer(&query, req.max_results).await
    } else {
        state.agent.answer_direct(&query).await
    };

    // Transcript updates are best-effort; an unknown or failing session
    // never turns a produced answer into an error.
    if let Some(session_id) = &req.session_id {
        match state.sessions.get(session_id).await {
            Ok(Some(mut session)) => {
                session.record_turn(&query, &response);
                if let Err(e) = state.sessions.update(&session).await {
                    warn!(session_id, error = %e, "Failed to persist session turn");
                }
            }
            Ok(None) => warn!(session_id, "Query referenced unknown session"),
            Err(e) => warn!(session_id, error = %e, "Session lookup failed"),
        }
    }

    Ok(Json(json!({
        "response": response,
        "query": query,
        "use_rag": req.use_rag,
        "model_id": state.agent.config().model_id,
    })))
}

/// SSE invocation stream: one `chunk` event with the full answer, then
/// `end`. Failures surface as an `error` event on the same 200 stream.
async fn invocations_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Sse<impl futures_util::Stream<Item = Result<Event, Infallible>>> {
    let prompt = extract_prompt(&body);

    let events = match prompt {
        Some(prompt) => {
            info!(prompt_length = prompt.len(), "Processing invocation");
            let answer = if state.agent.has_knowledge_base() {
                state.agent.answer(&prompt, None).await
            } else {
                state.agent.answer_direct(&prompt).await
            };
            let escaped = answer.replace('\n', "\\n");
            vec![
                sse_event(&json!({"type": "chunk", "content": escaped})),
                sse_event(&json!({"type": "end"})),
            ]
        }
        None => {
            warn!("Invocation carried no prompt field");
            vec![
                sse_event(&json!({
                    "type": "error",
                    "content": "An error occurred: no prompt found in request",
                })),
                sse_event(&json!({"type": "end"})),
            ]
        }
    };

    Sse::new(stream::iter(events.into_iter().map(Ok)))
}

/// Invokers vary in how they name the prompt field; accept the usual
/// candidates in order.
fn extract_prompt(body: &Value) -> Option<String> {
    ["prompt", "query", "message", "input", "text"]
        .iter()
        .find_map(|field| body.get(*field).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn sse_event(payload: &Value) -> Event {
    Event::default().data(payload.to_string())
}

async fn clear_memory_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    if !state.agent.memory().is_enabled() {
        return Err(ApiError::unavailable("No memory backend is configured"));
    }

    state
        .agent
        .memory()
        .clear()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(json!({"message": "Memory cleared successfully"})))
}

#[derive(Debug, Deserialize, Default)]
struct CreateSessionRequest {
    user_id: Option<String>,
}

async fn create_session_handler(
    State(state): State<Arc<AppState>>,
    body: Option<Json<CreateSessionRequest>>,
) -> Result<Json<Value>, ApiError> {
    let user_id = body
        .and_then(|Json(req)| req.user_id)
        .unwrap_or_else(|| format!("user_{}", uuid::Uuid::new_v4().simple()));

    let session = Session::new(user_id);
    state.sessions.create(&session).await?;
    info!(session_id = %session.id, user_id = %session.user_id, "Session created");

    Ok(Json(json!({
        "session_id": session.id,
        "user_id": session.user_id,
        "message": INITIAL_GREETING,
    })))
}

async fn get_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    match state.sessions.get(&id).await? {
        Some(session) => Ok(Json(session)),
        None => Err(ApiError::not_found(format!("Unknown session: {id}"))),
    }
}

async fn delete_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if state.sessions.get(&id).await?.is_none() {
        return Err(ApiError::not_found(format!("Unknown session: {id}")));
    }
    state.sessions.delete(&id).await?;
    info!(session_id = %id, "Session deleted");
    Ok(Json(json!({"message": "Session deleted"})))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_prompt_field_order() {
        let body = json!({"message": "second", "prompt": "first"});
        assert_eq!(extract_prompt(&body).unwrap(), "first");

        let body = json!({"text": "only text"});
        assert_eq!(extract_prompt(&body).unwrap(), "only text");
    }

    #[test]
    fn test_extract_prompt_rejects_blank() {
        assert!(extract_prompt(&json!({"prompt": "   "})).is_none());
        assert!(extract_prompt(&json!({"other": "x"})).is_none());
        assert!(extract_prompt(&json!({"prompt": 42})).is_none());
    }
}
