use std::time::Duration;

/// Timeout and retry settings for [`HttpTransport`](crate::HttpTransport).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
    /// Retries after the initial attempt. Zero disables retrying.
    pub max_retries: usize,
    /// Base backoff in milliseconds, doubled on every retry.
    pub retry_backoff_ms: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_retries: 0,
            retry_backoff_ms: 250,
        }
    }
}

impl ClientOptions {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Delay before retry number `attempt` (zero-based).
    pub(crate) fn backoff_delay(&self, attempt: usize) -> Duration {
        let exp = attempt.min(16) as u32;
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(1u64 << exp))
    }
}
