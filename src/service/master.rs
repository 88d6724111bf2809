//! Master server collaborator and login retry.
//!
//! The HTTP exchange with the master server lives behind [`MasterServer`];
//! this module only decides how often to ask and how long to wait between
//! attempts.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::MasterConfig;
use crate::error::MasterServerError;
use crate::protocol::handshake::Session;

/// Login and logout requests against the master server
#[async_trait]
pub trait MasterServer: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<Session, MasterServerError>;

    async fn logout(&self, cookie: &str) -> Result<(), MasterServerError>;
}

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay after the first failure, doubled after each further one
    pub backoff_base: Duration,
    /// Bound on a single attempt; expiry counts as [`MasterServerError::Timeout`]
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&MasterConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &MasterConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff_base: config.backoff_base,
            request_timeout: config.request_timeout,
        }
    }

    /// Delay before retrying after failed attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor)
    }

    /// Run `operation` until it succeeds, fails permanently or the attempts
    /// are used up. The last error surfaces.
    pub async fn run<T, F, Fut>(&self, what: &'static str, mut operation: F) -> Result<T, MasterServerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, MasterServerError>>,
    {
        let mut attempt = 1;
        loop {
            let outcome = tokio::time::timeout(self.request_timeout, operation())
                .await
                .unwrap_or(Err(MasterServerError::Timeout));
            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() || attempt >= self.max_attempts => {
                    warn!(request = what, attempt, error = %e, "Master server request failed");
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    debug!(
                        request = what,
                        attempt,
                        error = %e,
                        delay_ms = ?delay.as_millis(),
                        "Master server request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::default()
            .run("login", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(MasterServerError::BadCredentials) }
            })
            .await;
        assert_eq!(result, Err(MasterServerError::BadCredentials));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_error_surfaces_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::default()
            .run("logout", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(MasterServerError::Unreachable)
                    } else {
                        Err(MasterServerError::Timeout)
                    }
                }
            })
            .await;
        assert_eq!(result, Err(MasterServerError::Timeout));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_request_times_out_and_is_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 2,
            backoff_base: Duration::from_secs(2),
            request_timeout: Duration::from_secs(1),
        };
        let started = tokio::time::Instant::now();
        let result: Result<(), _> = policy
            .run("login", || {
                calls.fetch_add(1, Ordering::SeqCst);
                std::future::pending()
            })
            .await;
        assert_eq!(result, Err(MasterServerError::Timeout));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(4) && elapsed < Duration::from_millis(4100));
    }
}
