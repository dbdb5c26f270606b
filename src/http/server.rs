//! HTTP server implementation.

use axum::{extract::Request, routing::get, Json, Router};
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use super::middleware::{peer_addr, RateLimitGate};
use crate::error::{Result, TurnstileError};
use crate::ratelimit::{RateLimiter, RequestMeta};

/// Default interval between idle-window sweeps.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// Default body of the rejection response.
const DEFAULT_REJECTION_MESSAGE: &str = "Too many requests. Slow down.";

/// HTTP server placing the rate limit gate in front of its routes.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// The rate limiter instance
    rate_limiter: Arc<RateLimiter>,
    rejection_message: String,
    sweep_interval: Duration,
}

impl HttpServer {
    /// Create a new HTTP server with the given rate limiter.
    pub fn new(addr: SocketAddr, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            addr,
            rate_limiter,
            rejection_message: DEFAULT_REJECTION_MESSAGE.to_string(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Set the body sent with rejected requests.
    pub fn with_rejection_message(mut self, message: impl Into<String>) -> Self {
        self.rejection_message = message.into();
        self
    }

    /// Set how often idle windows are swept.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Build the router with every route behind the gate.
    pub fn router(&self) -> Router {
        let routes = Router::new()
            .route("/", get(whoami_handler))
            .route("/health", get(health_handler));

        let gate = RateLimitGate::new(
            self.rate_limiter.clone(),
            self.rejection_message.as_str(),
        );
        gate.wrap(routes).layer(TraceLayer::new_for_http())
    }

    /// Start the HTTP server.
    ///
    /// This method will block until the server is shut down.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            error!(addr = %self.addr, error = %e, "Failed to bind HTTP listener");
            TurnstileError::Io(e)
        })?;
        self.serve_on(listener, signal).await
    }

    /// Serve on an already bound listener until `signal` resolves.
    pub async fn serve_on<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        let app = self.router();

        info!(
            addr = %addr,
            limit = self.rate_limiter.config().max_requests,
            window_secs = self.rate_limiter.config().window_secs,
            "Starting HTTP server"
        );

        let sweeper = if self.rate_limiter.config().idle_eviction_windows > 0 {
            Some(spawn_sweeper(self.rate_limiter.clone(), self.sweep_interval))
        } else {
            None
        };

        let result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await;

        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }

        result.map_err(|e| {
            error!(error = %e, "HTTP server failed");
            TurnstileError::Io(e)
        })?;

        info!("HTTP server stopped");
        Ok(())
    }
}

/// Periodically evict idle windows so the identity map stays bounded.
fn spawn_sweeper(limiter: Arc<RateLimiter>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let evicted = limiter.evict_idle();
            if evicted > 0 {
                debug!(
                    evicted = evicted,
                    remaining = limiter.window_count(),
                    "Evicted idle rate limit windows"
                );
            }
        }
    })
}

async fn whoami_handler(request: Request) -> Json<Value> {
    let identity = RequestMeta::from_headers(request.headers(), peer_addr(&request)).identity();
    Json(json!({
        "status": "ok",
        "client": identity,
    }))
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}
