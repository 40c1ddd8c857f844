//! Tiered backoff schedules.
//!
//! The upstream distinguishes two kinds of pushback: an anti-bot challenge,
//! which needs a real cool-down, and ordinary throttling / gateway errors.
//! Each gets its own fixed schedule of delays.

use std::time::Duration;

use async_trait::async_trait;

/// Which backoff schedule a retryable failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffTier {
    /// 403 with the challenge marker
    Challenge,
    /// 429 / 502 / 503 and socket-level failures
    Throttle,
}

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delays before each challenge retry; its length is the retry budget
    pub challenge: Vec<Duration>,
    /// Delays before each throttle retry; its length is the retry budget
    pub throttle: Vec<Duration>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            challenge: secs(&[5.0, 15.0, 45.0]),
            throttle: secs(&[3.0, 8.0, 20.0]),
        }
    }
}

impl BackoffConfig {
    /// Build from plain second values, as they appear in configuration
    pub fn from_secs(challenge: &[f64], throttle: &[f64]) -> Self {
        Self {
            challenge: secs(challenge),
            throttle: secs(throttle),
        }
    }

    /// Delay before retry number `retry` (0-based) of the given tier, or
    /// `None` once the tier's budget is spent
    pub fn delay_for(&self, tier: BackoffTier, retry: usize) -> Option<Duration> {
        let schedule = match tier {
            BackoffTier::Challenge => &self.challenge,
            BackoffTier::Throttle => &self.throttle,
        };
        schedule.get(retry).copied()
    }

    /// Upper bound on attempts for a single request
    pub fn max_attempts(&self) -> usize {
        1 + self.challenge.len() + self.throttle.len()
    }
}

fn secs(values: &[f64]) -> Vec<Duration> {
    values
        .iter()
        .map(|s| Duration::from_secs_f64(s.max(0.0)))
        .collect()
}

/// Suspension point used between retries.
///
/// Kept behind a trait so backoff schedules can be asserted without waiting.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records requested sleeps instead of waiting
    #[derive(Debug, Default, Clone)]
    pub struct RecordingSleeper {
        slept: Arc<Mutex<Vec<Duration>>>,
    }

    impl RecordingSleeper {
        pub fn sleeps(&self) -> Vec<Duration> {
            self.slept.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }
}
