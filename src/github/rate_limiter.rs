use std::sync::Mutex;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::time::{sleep, Duration};
use reqwest::Response;

use crate::error::{Error, Result};

/// Paces requests to stay polite. Once GitHub reports an exhausted budget,
/// requests fail with [`Error::RateLimited`] until the reset time passes.
pub struct RateLimiter {
    state: Mutex<RateLimitState>,
    requests_per_minute: u32,
}

struct RateLimitState {
    remaining: Option<u32>,
    reset_at: Option<Instant>,
    requests_this_minute: u32,
    minute_start: Instant,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            state: Mutex::new(RateLimitState {
                remaining: None,
                reset_at: None,
                requests_this_minute: 0,
                minute_start: Instant::now(),
            }),
            requests_per_minute: requests_per_minute.max(1),
        }
    }

    pub async fn wait(&self) -> Result<()> {
        let delay = self.reserve(Instant::now())?;
        if !delay.is_zero() {
            tracing::debug!("Rate limiting, waiting {:?}", delay);
            sleep(delay).await;
        }
        Ok(())
    }

    /// Claims a request slot and returns how long the caller must wait before
    /// using it. Fails without claiming a slot while the budget is exhausted.
    fn reserve(&self, now: Instant) -> Result<Duration> {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        if state.remaining == Some(0) {
            match state.reset_at {
                Some(reset_at) if reset_at > now => {
                    let wait = reset_at - now;
                    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
                    return Err(Error::RateLimited(secs));
                }
                _ => {
                    state.remaining = None;
                    state.reset_at = None;
                }
            }
        }

        let mut delay = Duration::ZERO;
        let minute_elapsed = now.saturating_duration_since(state.minute_start);
        if minute_elapsed >= Duration::from_secs(60) {
            state.requests_this_minute = 0;
            state.minute_start = now;
        } else if state.requests_this_minute >= self.requests_per_minute {
            delay = Duration::from_secs(60) - minute_elapsed;
            state.requests_this_minute = 0;
            state.minute_start = now + delay;
        }

        state.requests_this_minute += 1;
        Ok(delay)
    }

    pub fn update_from_response(&self, response: &Response) {
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
        };

        if let Some(remaining) = header("x-ratelimit-remaining") {
            self.record(remaining as u32, header("x-ratelimit-reset"));
        }
    }

    fn record(&self, remaining: u32, reset_timestamp: Option<u64>) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.remaining = Some(remaining);
        state.reset_at = reset_timestamp
            .map(|reset| Duration::from_secs(reset.saturating_sub(unix_now())))
            .map(|wait| Instant::now() + wait);
    }

    pub fn remaining(&self) -> Option<u32> {
        self.state.lock().ok().and_then(|s| s.remaining)
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_limit_per_minute() {
        let limiter = RateLimiter::new(2);
        let now = Instant::now();

        assert!(limiter.reserve(now).unwrap().is_zero());
        assert!(limiter.reserve(now).unwrap().is_zero());
        let delay = limiter.reserve(now + Duration::from_secs(10)).unwrap();
        assert!(delay > Duration::from_secs(49) && delay <= Duration::from_secs(50));
    }

    #[test]
    fn test_exhausted_budget_fails_fast_until_reset() {
        let limiter = RateLimiter::new(100);
        limiter.record(0, Some(unix_now() + 3600));
        let now = Instant::now();

        for _ in 0..3 {
            match limiter.reserve(now) {
                Err(Error::RateLimited(secs)) => assert!(secs > 3500 && secs <= 3600),
                other => panic!("expected RateLimited, got {:?}", other),
            }
        }
        assert_eq!(limiter.remaining(), Some(0));

        let delay = limiter.reserve(now + Duration::from_secs(3601)).unwrap();
        assert!(delay.is_zero());
        assert_eq!(limiter.remaining(), None);
    }

    #[tokio::test]
    async fn test_wait_does_not_sleep_on_exhausted_budget() {
        let limiter = RateLimiter::new(100);
        limiter.record(0, Some(unix_now() + 3600));

        let result = tokio::time::timeout(Duration::from_secs(1), limiter.wait()).await;
        assert!(matches!(result, Ok(Err(Error::RateLimited(_)))));
    }

    #[test]
    fn test_exhausted_without_reset_proceeds() {
        let limiter = RateLimiter::new(100);
        limiter.record(0, None);
        assert!(limiter.reserve(Instant::now()).unwrap().is_zero());
    }
}
