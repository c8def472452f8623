use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One completed exchange as shown in a session transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTurn {
    /// The user's query text.
    pub query: String,
    /// The assistant's response text.
    pub response: String,
    /// HTML rendering of the response for transcript display.
    pub response_html: String,
    /// Sender tag of the response ("bot" for agent answers).
    pub sender: String,
}

/// A chat session: a random URL-safe token, the owning user, and an
/// append-only transcript. Destroyed only by explicit delete (or process
/// restart for the in-memory store).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// URL-safe random token identifying the session.
    pub id: String,
    /// The user this session belongs to.
    pub user_id: String,
    /// Completed exchanges, oldest first.
    pub turns: Vec<SessionTurn>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the transcript last changed.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a session with a fresh random token for the given user.
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().simple().to_string(),
            user_id: user_id.into(),
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append one exchange. Turns are never edited or removed except by
    /// deleting the whole session.
    pub fn record_turn(&mut self, query: impl Into<String>, response: impl Into<String>) {
        let response = response.into();
        self.turns.push(SessionTurn {
            query: query.into(),
            response_html: render_html(&response),
            response,
            sender: "bot".to_string(),
        });
        self.updated_at = Utc::now();
    }

    /// Number of completed exchanges in the transcript.
    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }
}

/// Minimal HTML rendering for transcript display: escape markup, turn
/// newlines into `<br>`.
pub fn render_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\n', "<br>")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_has_url_safe_token() {
        let session = Session::new("alice");
        assert_eq!(session.id.len(), 32);
        assert!(session.id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(session.user_id, "alice");
        assert_eq!(session.turn_count(), 0);
    }

    #[test]
    fn test_record_turn_appends() {
        let mut session = Session::new("alice");
        session.record_turn("q1", "a1");
        session.record_turn("q2", "a2");

        assert_eq!(session.turn_count(), 2);
        assert_eq!(session.turns[0].query, "q1");
        assert_eq!(session.turns[1].response, "a2");
        assert_eq!(session.turns[0].sender, "bot");
    }

    #[test]
    fn test_render_html_escapes_and_breaks() {
        assert_eq!(
            render_html("a < b & c\nnext"),
            "a &lt; b &amp; c<br>next"
        );
    }

    #[test]
    fn test_turn_html_matches_response() {
        let mut session = Session::new("alice");
        session.record_turn("q", "line1\nline2");
        assert_eq!(session.turns[0].response_html, "line1<br>line2");
    }

    #[test]
    fn test_session_serialization_roundtrip() {
        let mut session = Session::new("alice");
        session.record_turn("q", "a");
        let json = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, session.id);
        assert_eq!(back.turns.len(), 1);
    }
}
