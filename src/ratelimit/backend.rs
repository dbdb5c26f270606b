//! Admission control trait for abstracting limiter implementations.

use super::limiter::{RateLimiter, WindowStatus};

/// Trait for anything that can decide whether a client's request is admitted.
///
/// Hosting adapters such as the HTTP middleware hold a
/// `dyn AdmissionControl` so they work with any implementation.
/// Implementations must not block: the check runs inline on the request path.
pub trait AdmissionControl: Send + Sync {
    /// Count one request from `identity` and decide whether to admit it.
    fn admit(&self, identity: &str) -> WindowStatus;
}

impl AdmissionControl for RateLimiter {
    fn admit(&self, identity: &str) -> WindowStatus {
        self.check(identity)
    }
}
