//! Rate limiting logic and state management.

mod backend;
mod clock;
mod identity;
mod limiter;
mod window;

pub use backend::AdmissionControl;
pub use clock::{Clock, ManualClock, SystemClock};
pub use identity::{RequestMeta, FORWARDED_FOR_HEADER, REAL_IP_HEADER, UNKNOWN_IDENTITY};
pub use limiter::{Decision, LimitConfig, RateLimiter, WindowStatus};
pub use window::ClientWindow;
