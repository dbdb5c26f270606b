//! Per-client counting window.

/// A fixed counting window for a single client identity.
///
/// The window is plain data; callers serialize access to it. Once
/// `window_secs` have passed since `window_start` the whole count is
/// discarded and a new window opens at the current time, so a client can
/// be admitted up to twice the limit across a boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientWindow {
    /// Requests counted in the current window
    count: u64,
    /// Epoch second at which the current window opened
    window_start: u64,
    /// Set when the window has been evicted from the limiter's map
    retired: bool,
}

impl ClientWindow {
    /// Create an empty window opening at `now`.
    pub fn new(now: u64) -> Self {
        Self {
            count: 0,
            window_start: now,
            retired: false,
        }
    }

    /// Count one request at time `now` and return the post-increment count.
    ///
    /// An expired window is reset first, so a request arriving exactly on the
    /// boundary starts a fresh window with a count of one.
    pub fn record(&mut self, now: u64, window_secs: u64) -> u64 {
        if self.is_expired(now, window_secs) {
            self.window_start = now;
            self.count = 0;
        }

        self.count += 1;
        self.count
    }

    /// Whether the window has run its full length at `now`.
    pub fn is_expired(&self, now: u64, window_secs: u64) -> bool {
        now.saturating_sub(self.window_start) >= window_secs
    }

    /// Seconds from `now` until the window expires.
    pub fn reset_after(&self, now: u64, window_secs: u64) -> u64 {
        self.window_start.saturating_add(window_secs).saturating_sub(now)
    }

    /// Seconds since the window opened.
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.window_start)
    }

    /// Get the current count.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Get the epoch second the window opened.
    pub fn window_start(&self) -> u64 {
        self.window_start
    }

    pub(crate) fn is_retired(&self) -> bool {
        self.retired
    }

    pub(crate) fn retire(&mut self) {
        self.retired = true;
    }
}
