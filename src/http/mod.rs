//! HTTP hosting for the rate limit gate.

mod middleware;
mod response;
mod server;

pub use middleware::{admission_middleware, peer_addr, RateLimitGate};
pub use response::too_many_requests;
pub use server::HttpServer;
