//! Exponential backoff shared by the HTTP clients.
//!
//! HTTP 429 and 5xx responses, plus network errors, are retried; any
//! other 4xx fails immediately. Delays double from `base_delay` and are
//! capped at 2^5 times it (1s, 2s, 4s, 8s, 16s, 32s by default).

use std::time::Duration;

use reqwest::StatusCode;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_secs(1),
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay before `attempt` (0-based); zero for the first attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        self.base_delay * (1u32 << (attempt - 1).min(5))
    }

    pub fn attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Rate limited or server error.
pub fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
