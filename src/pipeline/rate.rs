//! Throttles: a global debounce for bot replies and a per-client window
//! for the public reading endpoint.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::RateLimitError;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── RateGate ────────────────────────────────────────────────────────

/// Minimum spacing between successive processing actions.
///
/// Rejected callers are expected to skip their work, not wait.
pub struct RateGate {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    /// Take the gate if at least `interval` has passed since the last success.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut last = lock(&self.last);
        match *last {
            Some(prev) if now.duration_since(prev) < self.interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

// ── IpRateLimiter ───────────────────────────────────────────────────

/// Result of a per-client check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    /// Admin token matched; the window was not touched.
    Bypassed,
    Denied { retry_after: Duration, message: String },
}

impl RateDecision {
    /// Collapse into the error the HTTP layer maps to 429.
    pub fn into_result(self) -> Result<(), RateLimitError> {
        match self {
            RateDecision::Denied { message, .. } => Err(RateLimitError::Exceeded { message }),
            _ => Ok(()),
        }
    }
}

struct Window {
    started: Instant,
    count: u32,
}

/// Number of tracked clients above which expired windows are swept.
const PRUNE_THRESHOLD: usize = 1024;

/// Fixed-window request counter keyed by client address.
pub struct IpRateLimiter {
    max_requests: u32,
    window: Duration,
    admin_token: SecretString,
    windows: Mutex<HashMap<String, Window>>,
}

impl IpRateLimiter {
    pub fn new(max_requests: u32, window: Duration, admin_token: SecretString) -> Self {
        Self {
            max_requests,
            window,
            admin_token,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, key: &str, admin_token: Option<&str>) -> RateDecision {
        if let Some(token) = admin_token {
            if !token.is_empty() && token == self.admin_token.expose_secret() {
                debug!(client = %key, "Admin token bypassed rate limit");
                return RateDecision::Bypassed;
            }
        }

        let now = Instant::now();
        let mut windows = lock(&self.windows);
        if windows.len() > PRUNE_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.max_requests {
            let retry_after = self.window.saturating_sub(now.duration_since(entry.started));
            let hours = retry_after.as_secs().div_ceil(3600).max(1);
            debug!(client = %key, hours, "Rate limit exceeded");
            return RateDecision::Denied {
                retry_after,
                message: format!(
                    "You've reached your daily reading limit. Please try again in {hours} hours."
                ),
            };
        }

        entry.count += 1;
        RateDecision::Allowed {
            remaining: self.max_requests - entry.count,
        }
    }

    /// Clients currently tracked.
    pub fn tracked(&self) -> usize {
        lock(&self.windows).len()
    }
}
