//! Credential-aware remote clients and the retry wrapper.
//!
//! All heavy lifting in Veranda is delegated to managed HTTPS services.
//! This crate owns how those services are reached: bearer-token
//! resolution, per-service client memoization with a `refresh()` escape
//! hatch for expired credentials, and the fixed-delay retry loop applied
//! to the retrieval and inference calls.

/// Bearer-token resolution.
pub mod credentials;
/// Per-service client memoization.
pub mod pool;
/// The credential-expiry retry loop.
pub mod retry;

pub use credentials::{CredentialProvider, EnvCredentials, StaticCredentials};
pub use pool::{ClientPool, RemoteClient};
pub use retry::{call_with_retry, is_credential_expiry, RetryPolicy};
