//! Rate limiting middleware.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → resolve client identity (X-Forwarded-For, X-Real-IP, peer address)
//!     → count the request against the client's window
//!     → admit: run the downstream service unchanged
//!     → reject: respond 429 without touching downstream
//! ```

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::{self, Next},
    response::Response,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;

use super::response::too_many_requests;
use crate::ratelimit::{AdmissionControl, Decision, RequestMeta};

/// Request-admission gate shared by every request passing through the
/// middleware.
#[derive(Clone)]
pub struct RateLimitGate {
    limiter: Arc<dyn AdmissionControl>,
    rejection_message: Arc<str>,
}

impl RateLimitGate {
    /// Create a gate around `limiter` answering rejections with `rejection_message`.
    pub fn new(limiter: Arc<dyn AdmissionControl>, rejection_message: impl Into<Arc<str>>) -> Self {
        Self {
            limiter,
            rejection_message: rejection_message.into(),
        }
    }

    /// Put the gate in front of every route of `router`.
    pub fn wrap<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(middleware::from_fn_with_state(self, admission_middleware))
    }
}

/// Peer address recorded by `into_make_service_with_connect_info`, if any.
pub fn peer_addr(request: &Request) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Middleware function admitting or rejecting each request.
pub async fn admission_middleware(
    State(gate): State<RateLimitGate>,
    request: Request,
    next: Next,
) -> Response {
    let identity = RequestMeta::from_headers(request.headers(), peer_addr(&request)).identity();
    let status = gate.limiter.admit(&identity);

    match status.decision {
        Decision::Admit => next.run(request).await,
        Decision::Reject => {
            tracing::warn!(
                client = %identity,
                count = status.count,
                limit = status.limit,
                "Rate limit exceeded"
            );
            too_many_requests(&gate.rejection_message, &status)
        }
    }
}
