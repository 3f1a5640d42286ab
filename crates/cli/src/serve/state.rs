//! Shared server state: the guardrail, the run lock and the rate limiter.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Instant;

use costguard_engine::Guardrail;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use super::RATE_LIMIT_WINDOW_SECS;

/// Per-IP request tracker: (request count, window start time).
type IpTracker = HashMap<IpAddr, (u64, Instant)>;

/// Fixed-window per-IP rate limiter.
pub(crate) struct RateLimiter {
    tracker: Mutex<IpTracker>,
    pub(crate) max_requests: u64,
}

impl RateLimiter {
    pub(crate) fn new(max_requests: u64) -> Self {
        Self {
            tracker: Mutex::new(HashMap::new()),
            max_requests,
        }
    }

    /// `Err(retry_after_secs)` once `ip` has used up its window.
    ///
    /// Entries whose window has expired are dropped on every call.
    pub(crate) async fn check(&self, ip: IpAddr) -> Result<(), u64> {
        let mut tracker = self.tracker.lock().await;
        let now = Instant::now();
        tracker.retain(|_, (_, start)| now.duration_since(*start).as_secs() < RATE_LIMIT_WINDOW_SECS);
        let entry = tracker.entry(ip).or_insert((0, now));

        let elapsed = now.duration_since(entry.1).as_secs();
        if elapsed >= RATE_LIMIT_WINDOW_SECS {
            *entry = (0, now);
        }
        if entry.0 >= self.max_requests {
            return Err(RATE_LIMIT_WINDOW_SECS.saturating_sub(elapsed).max(1));
        }
        entry.0 += 1;
        Ok(())
    }
}

pub(crate) struct AppState {
    pub(crate) guardrail: Guardrail,
    /// Held for the whole of every run so two runs never overlap in-process.
    pub(crate) run_lock: Mutex<()>,
    pub(crate) rate_limiter: RateLimiter,
    pub(crate) api_key: Option<String>,
    /// Evaluation time override; wall clock when unset.
    pub(crate) fixed_now: Option<OffsetDateTime>,
}

impl AppState {
    pub(crate) fn new(guardrail: Guardrail, rate_limit: u64) -> Self {
        AppState {
            guardrail,
            run_lock: Mutex::new(()),
            rate_limiter: RateLimiter::new(rate_limit),
            api_key: None,
            fixed_now: None,
        }
    }

    pub(crate) fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub(crate) fn with_fixed_now(mut self, now: Option<OffsetDateTime>) -> Self {
        self.fixed_now = now;
        self
    }

    pub(crate) fn now(&self) -> OffsetDateTime {
        self.fixed_now.unwrap_or_else(OffsetDateTime::now_utc)
    }
}
