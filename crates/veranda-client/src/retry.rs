use crate::pool::ClientPool;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{error, warn};
use veranda_core::{VerandaError, VerandaResult};

/// Configures the credential-expiry retry loop.
///
/// The delay is fixed, not exponential: expired credentials either rotate
/// within a second or not at all, and every other error class is
/// propagated on the first attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum retries after the initial attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Fixed delay in milliseconds between attempts.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay_ms: 1_000,
        }
    }
}

/// Whether an error is a credential-expiry failure worth a refresh+retry.
///
/// Matches the token-expiry markers the managed services put in their
/// error bodies. Everything else — throttling included — is not retried
/// here.
pub fn is_credential_expiry(err: &VerandaError) -> bool {
    let msg = err.to_string();
    msg.contains("ExpiredTokenException")
        || msg.contains("InvalidTokenException")
        || msg.contains("TokenRefreshRequired")
}

/// Run `op`, refreshing the client pool and retrying on credential expiry.
///
/// `op` is invoked at most `max_retries + 1` times. It must re-acquire its
/// client from the pool on each invocation so a refresh actually takes
/// effect. Non-credential errors propagate immediately.
pub async fn call_with_retry<T, F, Fut>(
    pool: &ClientPool,
    policy: &RetryPolicy,
    mut op: F,
) -> VerandaResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = VerandaResult<T>>,
{
    let mut last_err: Option<VerandaError> = None;

    for attempt in 0..=policy.max_retries {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if !is_credential_expiry(&e) {
                    return Err(e);
                }
                warn!(
                    attempt,
                    max_attempts = policy.max_retries + 1,
                    error = %e,
                    "Credentials expired, refreshing clients"
                );
                if attempt < policy.max_retries {
                    pool.refresh();
                    tokio::time::sleep(std::time::Duration::from_millis(
                        policy.retry_delay_ms,
                    ))
                    .await;
                }
                last_err = Some(e);
            }
        }
    }

    error!("Max retries exceeded for credential refresh");
    Err(last_err
        .unwrap_or_else(|| VerandaError::Credential("retry attempts exhausted".into())))
}
