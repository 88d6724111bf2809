//! Timeout defaults and helpers.

use std::future::Future;
use std::time::Duration;

use crate::error::{ConnectionError, Result};

/// Default TCP connect timeout
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on a single socket read. The server pings roughly once a
/// minute, so an idle read expiring is routine.
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between authentication checks after AUTH_INFO is sent
pub const AUTH_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long disconnect waits for the listener before abandoning it
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Run a future with a deadline, mapping expiry to [`ConnectionError::Timeout`].
pub async fn with_timeout_error<F, T>(future: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(ConnectionError::Timeout.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_maps_to_connection_timeout() {
        let result: Result<()> = with_timeout_error(
            async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            },
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(
            result,
            Err(ChatError::Connection(ConnectionError::Timeout))
        ));
    }

    #[tokio::test]
    async fn test_inner_result_passes_through() {
        let value = with_timeout_error(async { Ok(7) }, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
