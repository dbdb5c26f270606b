//! Turnstile - Per-client Rate Limiting Gate
//!
//! This crate implements a fixed-window rate limiter keyed by client identity
//! and an HTTP middleware that admits or rejects requests in front of any
//! downstream handler.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
