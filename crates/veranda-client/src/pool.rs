use crate::credentials::CredentialProvider;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use veranda_core::VerandaResult;

/// A memoized handle to one remote service: an HTTP client, the resolved
/// endpoint, and the bearer token captured at construction time.
pub struct RemoteClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl RemoteClient {
    fn new(endpoint: String, token: String, timeout: Duration) -> VerandaResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| veranda_core::VerandaError::Http(e.to_string()))?;
        Ok(Self {
            http,
            endpoint,
            token,
        })
    }

    /// The base endpoint this client talks to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Start a POST to `{endpoint}{path}` with auth headers applied.
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}{}", self.endpoint, path))
            .bearer_auth(&self.token)
            .header("content-type", "application/json")
    }

    /// Start a GET to `{endpoint}{path}` with auth headers applied.
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}{}", self.endpoint, path))
            .bearer_auth(&self.token)
    }
}

/// Lazily constructed, per-service remote clients.
///
/// Handles are built on first [`get`](ClientPool::get) and cached for the
/// lifetime of the pool; [`refresh`](ClientPool::refresh) discards every
/// cached handle so the next access re-resolves credentials. Errors never
/// originate here beyond credential resolution — remote failures surface
/// from the actual calls.
pub struct ClientPool {
    region: String,
    credentials: Arc<dyn CredentialProvider>,
    endpoint_overrides: HashMap<String, String>,
    request_timeout: Duration,
    clients: Mutex<HashMap<String, Arc<RemoteClient>>>,
}

impl ClientPool {
    /// Creates an empty pool for the given region and credential source.
    pub fn new(region: impl Into<String>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            region: region.into(),
            credentials,
            endpoint_overrides: HashMap::new(),
            request_timeout: Duration::from_secs(30),
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Pin a service to an explicit endpoint instead of the regional URL.
    /// Used for local stacks and tests.
    pub fn with_endpoint(mut self, service: impl Into<String>, url: impl Into<String>) -> Self {
        self.endpoint_overrides.insert(service.into(), url.into());
        self
    }

    /// Override the per-request timeout applied to built clients.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn endpoint_for(&self, service: &str) -> String {
        self.endpoint_overrides
            .get(service)
            .cloned()
            .unwrap_or_else(|| format!("https://{}.{}.amazonaws.com", service, self.region))
    }

    /// Get (building if needed) the handle for `service`, e.g.
    /// `"bedrock-runtime"` or `"bedrock-agent-runtime"`.
    pub fn get(&self, service: &str) -> VerandaResult<Arc<RemoteClient>> {
        {
            let clients = self.clients.lock();
            if let Some(client) = clients.get(service) {
                return Ok(client.clone());
            }
        }

        // Resolve outside the lock; token lookup may hit the filesystem.
        let token = self.credentials.bearer_token()?;
        let endpoint = self.endpoint_for(service);
        debug!(service, endpoint = %endpoint, "Building remote client");
        let client = Arc::new(RemoteClient::new(endpoint, token, self.request_timeout)?);

        let mut clients = self.clients.lock();
        let entry = clients
            .entry(service.to_string())
            .or_insert_with(|| client.clone());
        Ok(entry.clone())
    }

    /// Drop every memoized handle. The next `get` re-resolves credentials.
    pub fn refresh(&self) {
        info!("Refreshing remote clients after credential expiry");
        self.clients.lock().clear();
    }

    /// Number of currently memoized handles. Diagnostic only.
    pub fn cached_clients(&self) -> usize {
        self.clients.lock().len()
    }
}
