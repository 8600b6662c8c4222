use std::future::Future;
use std::sync::Arc;

use log::{debug, warn};

use crate::credentials::{CredentialPool, mask};
use crate::error::ApiError;

/// Upper bound on attempts regardless of pool size
pub const MAX_ATTEMPTS: usize = 10;

/// Runs Data API calls against the pool, rotating keys on quota exhaustion.
#[derive(Debug, Clone)]
pub struct QuotaAwareInvoker {
    pool: Arc<CredentialPool>,
}

impl QuotaAwareInvoker {
    pub fn new(pool: Arc<CredentialPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    /// Run `operation` with the current key, retrying with the next key while
    /// the API reports quota exhaustion.
    ///
    /// At most `min(MAX_ATTEMPTS, pool size)` attempts are made. Any other
    /// error is returned immediately.
    pub async fn invoke<T, F, Fut>(&self, mut operation: F) -> Result<T, ApiError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let Some(mut key) = self.pool.current() else {
            debug!("Credential pool is empty, skipping API call");
            return Err(ApiError::NoCredentials);
        };
        let max_attempts = self.pool.len().min(MAX_ATTEMPTS);

        let mut attempt = 1;
        loop {
            let err = match operation(key.clone()).await {
                Ok(val) => return Ok(val),
                Err(e) if e.is_quota_exceeded() => e,
                Err(e) => return Err(e),
            };

            warn!(
                "Quota exceeded for key {} (attempt {attempt}/{max_attempts})",
                mask(&key)
            );
            if attempt >= max_attempts {
                return Err(err);
            }
            match self.pool.rotate() {
                Some(next) if next != key => key = next,
                _ => {
                    debug!("Rotation produced no new key, giving up");
                    return Err(err);
                }
            }
            attempt += 1;
        }
    }

    /// Like [`invoke`](Self::invoke), but returns `fallback()` when quota is
    /// exhausted or no credentials are configured.
    pub async fn invoke_or_else<T, F, Fut, D>(&self, operation: F, fallback: D) -> Result<T, ApiError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
        D: FnOnce() -> T,
    {
        match self.invoke(operation).await {
            Err(ApiError::QuotaExceeded { .. }) | Err(ApiError::NoCredentials) => {
                debug!("Using fallback value after quota exhaustion");
                Ok(fallback())
            }
            other => other,
        }
    }
}
