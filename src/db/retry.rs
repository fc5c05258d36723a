//! Bounded retry for writes that collide with another SQLite writer.
//!
//! Only busy/locked errors are retried; everything else returns on the
//! first failure.

use super::DbError;
use crate::config::RetryConfig;
use std::future::Future;
use std::time::Duration;
use tracing::Instrument;

/// Fixed-delay retry policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// Run `op`, retrying while it fails with a busy/locked error.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, DbError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DbError>>,
    {
        let span = crate::telemetry::spans::db_write(operation);
        let mut attempt = 1;
        loop {
            match op().instrument(span.clone()).await {
                Err(e) if e.is_busy() && attempt < self.attempts => {
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts = self.attempts,
                        error = %e,
                        "Database busy, retrying"
                    );
                    crate::metrics::record_db_retry(operation);
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.attempts, Duration::from_millis(config.backoff_ms))
    }
}
