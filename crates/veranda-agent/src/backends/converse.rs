use super::ModelBackend;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use veranda_client::ClientPool;
use veranda_core::{VerandaError, VerandaResult};

/// Service name of the model-inference runtime.
pub const RUNTIME_SERVICE: &str = "bedrock-runtime";

/// Fallback answer when the model response carries no extractable text.
const EMPTY_RESPONSE: &str = "I apologize, but I couldn't generate a response.";

/// Model-inference client over the runtime's converse API.
pub struct ConverseClient {
    pool: Arc<ClientPool>,
    model_id: String,
    max_tokens: u32,
    temperature: f64,
}

impl ConverseClient {
    /// Creates a client for one model with fixed inference settings.
    pub fn new(
        pool: Arc<ClientPool>,
        model_id: impl Into<String>,
        max_tokens: u32,
        temperature: f64,
    ) -> Self {
        Self {
            pool,
            model_id: model_id.into(),
            max_tokens,
            temperature,
        }
    }
}

#[async_trait]
impl ModelBackend for ConverseClient {
    async fn converse(&self, prompt: &str, system_prompt: &str) -> VerandaResult<String> {
        // Re-acquired per call so a pool refresh takes effect on retry.
        let client = self.pool.get(RUNTIME_SERVICE)?;

        let body = serde_json::json!({
            "messages": [
                {"role": "user", "content": [{"text": prompt}]}
            ],
            "system": [{"text": system_prompt}],
            "inferenceConfig": {
                "maxTokens": self.max_tokens,
                "temperature": self.temperature,
            }
        });

        let resp = client
            .post(&format!("/model/{}/converse", self.model_id))
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
            return Err(VerandaError::Model(format!(
                "converse failed with {status}: {payload}"
            )));
        }

        debug!(model_id = %self.model_id, "Model invocation succeeded");
        Ok(extract_text(&payload))
    }
}

/// Best-effort text extraction from a converse response. Unexpected
/// shapes degrade to successive fallback fields and finally to a canned
/// apology — never an error.
pub fn extract_text(payload: &serde_json::Value) -> String {
    if let Some(text) = payload["output"]["message"]["content"][0]["text"].as_str() {
        return text.trim().to_string();
    }
    if let Some(text) = payload["text"].as_str() {
        return text.to_string();
    }
    if let Some(text) = payload["content"].as_str() {
        return text.to_string();
    }
    EMPTY_RESPONSE.to_string()
}
