//! HTTP surface of the agent: JSON control endpoints, the chat query
//! endpoint, and the SSE invocation stream.

/// Structured API errors.
pub mod error;
/// Router construction and the endpoint handlers.
pub mod server;

pub use error::ApiError;
pub use server::{AppState, GatewayServer};
