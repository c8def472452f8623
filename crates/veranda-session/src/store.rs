use crate::session::Session;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use veranda_core::{VerandaError, VerandaResult};

/// Shared session lookup across requests. Always injected; concurrent
/// access is the store's problem, not the handlers'.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session under its token.
    async fn create(&self, session: &Session) -> VerandaResult<()>;
    /// Look up a session by token; `None` when unknown.
    async fn get(&self, id: &str) -> VerandaResult<Option<Session>>;
    /// Replace a stored session with this one.
    async fn update(&self, session: &Session) -> VerandaResult<()>;
    /// Remove a session. Deleting an unknown token is not an error.
    async fn delete(&self, id: &str) -> VerandaResult<()>;
    /// Tokens of every stored session.
    async fn list(&self) -> VerandaResult<Vec<String>>;
}

/// Lock-guarded in-memory store. Sessions vanish on restart.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: &Session) -> VerandaResult<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> VerandaResult<Option<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(id).cloned())
    }

    async fn update(&self, session: &Session) -> VerandaResult<()> {
        self.create(session).await
    }

    async fn delete(&self, id: &str) -> VerandaResult<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id);
        Ok(())
    }

    async fn list(&self) -> VerandaResult<Vec<String>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.keys().cloned().collect())
    }
}

/// File-based session store, one JSON file per session.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Opens (creating if needed) the store directory.
    pub async fn new(dir: PathBuf) -> VerandaResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn session_path(&self, id: &str) -> VerandaResult<PathBuf> {
        // Tokens are hex; anything else is rejected before touching disk.
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(VerandaError::Session(format!("invalid session id: {id}")));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn create(&self, session: &Session) -> VerandaResult<()> {
        let path = self.session_path(&session.id)?;
        let json = serde_json::to_string_pretty(session)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> VerandaResult<Option<Session>> {
        let path = self.session_path(id)?;
        if !path.exists() {
            return Ok(None);
        }
        let data = tokio::fs::read_to_string(path).await?;
        let session: Session = serde_json::from_str(&data)
            .map_err(|e| VerandaError::Session(format!("Failed to parse session: {e}")))?;
        Ok(Some(session))
    }

    async fn update(&self, session: &Session) -> VerandaResult<()> {
        self.create(session).await
    }

    async fn delete(&self, id: &str) -> VerandaResult<()> {
        let path = self.session_path(id)?;
        if path.exists() {
            tokio::fs::remove_file(path).await?;
        }
        Ok(())
    }

    async fn list(&self) -> VerandaResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(stem) = name.strip_suffix(".json") {
                    ids.push(stem.to_string());
                }
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_crud() {
        let store = InMemorySessionStore::new();
        let mut session = Session::new("alice");
        session.record_turn("q", "a");

        store.create(&session).await.unwrap();
        let loaded = store.get(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.turn_count(), 1);

        store.delete(&session.id).await.unwrap();
        assert!(store.get(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_in_memory_update_replaces() {
        let store = InMemorySessionStore::new();
        let mut session = Session::new("alice");
        store.create(&session).await.unwrap();

        session.record_turn("q", "a");
        store.update(&session).await.unwrap();

        let loaded = store.get(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.turn_count(), 1);
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(tmp.path().to_path_buf()).await.unwrap();

        let mut session = Session::new("alice");
        session.record_turn("q", "a");
        store.create(&session).await.unwrap();

        let loaded = store.get(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.user_id, "alice");
        assert_eq!(loaded.turns[0].response, "a");

        let ids = store.list().await.unwrap();
        assert_eq!(ids, vec![session.id.clone()]);

        store.delete(&session.id).await.unwrap();
        assert!(store.get(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_missing_session_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(tmp.path().to_path_buf()).await.unwrap();
        let id = Session::new("x").id;
        assert!(store.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_rejects_path_like_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(tmp.path().to_path_buf()).await.unwrap();
        assert!(store.get("../etc/passwd").await.is_err());
        assert!(store.delete("").await.is_err());
    }
}
