//! Core runtime for the elchi client.
//!
//! Everything here is transport-free: the error taxonomy, configuration,
//! identity persistence, client self-description, the admission machinery
//! used by the command dispatcher (backoff, circuit breaker, rate limiter)
//! and the seams the session runtime is built on (`ControllerChannel`,
//! `CommandHandler`). The tonic transport lives in `elchi-grpc`; the session
//! itself in the `elchi-client` binary.

pub mod backoff;
pub mod breaker;
pub mod command;
pub mod config;
pub mod error;
pub mod identity;
pub mod info;
pub mod ratelimit;
pub mod transport;

pub use error::{Error, Result};
