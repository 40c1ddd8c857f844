//! Request pacing.
//!
//! Every outbound request passes through one limiter owned by the API client,
//! so the spacing holds no matter which discovery strategy issues the call.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Enforces a minimum interval between consecutive requests
#[derive(Clone)]
pub struct RateLimiter {
    state: Arc<Mutex<RateLimiterState>>,
}

struct RateLimiterState {
    last_request: Option<Instant>,
    min_interval: Duration,
}

impl RateLimiter {
    /// Create a limiter that spaces requests `delay_secs` apart
    pub fn new(delay_secs: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(RateLimiterState {
                last_request: None,
                min_interval: Duration::from_secs_f64(delay_secs.max(0.0)),
            })),
        }
    }

    /// A limiter that never waits
    #[cfg(test)]
    pub fn unlimited() -> Self {
        Self::new(0.0)
    }

    /// Wait until the next request is allowed, then claim the slot
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;

        if let Some(last) = state.last_request {
            let elapsed = last.elapsed();
            if elapsed < state.min_interval {
                tokio::time::sleep(state.min_interval - elapsed).await;
            }
        }

        state.last_request = Some(Instant::now());
    }
}
