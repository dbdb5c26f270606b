//! Core rate limiter implementation.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::window::ClientWindow;
use crate::config::RateLimitingConfig;

/// Default number of requests admitted per window.
const DEFAULT_MAX_REQUESTS: u64 = 50;
/// Default window length in seconds.
const DEFAULT_WINDOW_SECS: u64 = 10;
/// Default idle period, in whole windows, before a window is evicted.
const DEFAULT_IDLE_EVICTION_WINDOWS: u64 = 6;

/// Configuration for a rate limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitConfig {
    /// Maximum requests admitted per client in one window
    pub max_requests: u64,
    /// Window length in seconds
    pub window_secs: u64,
    /// Whole windows of inactivity before eviction; zero disables eviction
    pub idle_eviction_windows: u64,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window_secs: DEFAULT_WINDOW_SECS,
            idle_eviction_windows: DEFAULT_IDLE_EVICTION_WINDOWS,
        }
    }
}

impl From<&RateLimitingConfig> for LimitConfig {
    fn from(config: &RateLimitingConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window_secs: config.window_secs,
            idle_eviction_windows: config.idle_eviction_windows,
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Forward the request downstream
    Admit,
    /// Short-circuit with a rejection
    Reject,
}

/// The result of counting one request against a client's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowStatus {
    pub decision: Decision,
    /// Post-increment count in the current window
    pub count: u64,
    pub limit: u64,
    pub remaining: u64,
    /// Seconds until the current window expires
    pub reset_after_secs: u64,
}

impl WindowStatus {
    pub fn is_admitted(&self) -> bool {
        self.decision == Decision::Admit
    }
}

type SharedWindow = Arc<Mutex<ClientWindow>>;

/// Per-client fixed-window rate limiter.
///
/// Each client identity owns a window behind its own lock. The map is only
/// locked long enough to find or insert that window, so a burst from one
/// client never stalls admission checks for another.
pub struct RateLimiter {
    /// Windows indexed by client identity
    windows: DashMap<String, SharedWindow>,
    config: LimitConfig,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a new rate limiter with default settings.
    pub fn new() -> Self {
        Self::with_config(LimitConfig::default())
    }

    /// Create a rate limiter reading the system clock.
    pub fn with_config(config: LimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a rate limiter with an explicit time source.
    pub fn with_clock(config: LimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            config,
            clock,
        }
    }

    /// Count a request from `identity` at the current time.
    pub fn check(&self, identity: &str) -> WindowStatus {
        self.check_at(identity, self.clock.now_secs())
    }

    /// Count a request from `identity` at `now` (epoch seconds).
    ///
    /// The window reset, increment and limit comparison happen under the
    /// client's window lock, so concurrent requests from one client are
    /// counted exactly once each.
    pub fn check_at(&self, identity: &str, now: u64) -> WindowStatus {
        trace!(identity = %identity, now = now, "Checking rate limit");

        loop {
            let shared = self.window_for(identity, now);
            let mut window = shared.lock();

            // Evicted between lookup and lock; resolve again.
            if window.is_retired() {
                continue;
            }

            let count = window.record(now, self.config.window_secs);
            let reset_after_secs = window.reset_after(now, self.config.window_secs);
            drop(window);

            let decision = if count > self.config.max_requests {
                debug!(
                    identity = %identity,
                    count = count,
                    limit = self.config.max_requests,
                    "Rate limit exceeded"
                );
                Decision::Reject
            } else {
                Decision::Admit
            };

            return WindowStatus {
                decision,
                count,
                limit: self.config.max_requests,
                remaining: self.config.max_requests.saturating_sub(count),
                reset_after_secs,
            };
        }
    }

    /// Find the window for `identity`, creating it if this is a new client.
    fn window_for(&self, identity: &str, now: u64) -> SharedWindow {
        if let Some(existing) = self.windows.get(identity) {
            return Arc::clone(existing.value());
        }

        let entry = self
            .windows
            .entry(identity.to_string())
            .or_insert_with(|| {
                debug!(
                    identity = %identity,
                    limit = self.config.max_requests,
                    window_secs = self.config.window_secs,
                    "Creating new rate limit window"
                );
                Arc::new(Mutex::new(ClientWindow::new(now)))
            });
        Arc::clone(entry.value())
    }

    /// Evict windows idle for the configured number of windows.
    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(self.clock.now_secs())
    }

    /// Evict every window that opened at least `idle_eviction_windows`
    /// windows before `now`, returning how many were removed.
    ///
    /// An evicted window has already expired, so the next request from that
    /// client starts a fresh window exactly as it would have anyway.
    pub fn evict_idle_at(&self, now: u64) -> usize {
        if self.config.idle_eviction_windows == 0 {
            return 0;
        }

        let idle_secs = self
            .config
            .window_secs
            .saturating_mul(self.config.idle_eviction_windows);
        let mut evicted = 0;

        self.windows.retain(|_, shared| {
            let mut window = shared.lock();
            if window.age(now) >= idle_secs {
                window.retire();
                evicted += 1;
                false
            } else {
                true
            }
        });

        evicted
    }

    /// Get the stored count for `identity`, without applying a reset.
    ///
    /// Returns `None` if the client has no window.
    pub fn current_count(&self, identity: &str) -> Option<u64> {
        let shared = self.windows.get(identity).map(|w| Arc::clone(w.value()))?;
        let count = shared.lock().count();
        Some(count)
    }

    /// Clear all windows.
    pub fn clear(&self) {
        self.windows.retain(|_, shared| {
            shared.lock().retire();
            false
        });
    }

    /// Get the number of tracked clients.
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// Get the limiter configuration.
    pub fn config(&self) -> &LimitConfig {
        &self.config
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
