//! Conversation memory over the managed memory service.
//!
//! Two backend tiers exist: the turn-oriented data-plane API (primary)
//! and the older blob-oriented API (fallback). Which tier a deployment
//! gets is decided once at startup; the adapter on top soft-fails every
//! read and treats writes as best-effort so a memory outage never costs
//! the user their answer.

/// The soft-failing history adapter and tier selection.
pub mod adapter;
/// The HTTP clients for both memory tiers.
pub mod backend;

pub use adapter::{MemoryAdapter, MemoryTier};
pub use backend::{BlobMemoryClient, MemoryBackend, MemoryScope, TurnMemoryClient};
