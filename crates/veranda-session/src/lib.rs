//! Session bookkeeping for the HTTP layer.
//!
//! Sessions are transcript copies kept for the frontend; the memory
//! service owns the canonical conversation history. Stores are injected
//! behind [`SessionStore`] — there is deliberately no process-global map.

/// The session and turn types.
pub mod session;
/// Session persistence backends.
pub mod store;

pub use session::{render_html, Session, SessionTurn};
pub use store::{FileSessionStore, InMemorySessionStore, SessionStore};
