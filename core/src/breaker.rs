//! Circuit breaker around handler execution.
//!
//! # States
//!
//! - **Closed**: normal operation, requests allowed
//! - **Open**: failure ratio tripped, requests rejected immediately
//! - **HalfOpen**: one probe allowed after the cool-down
//!
//! The breaker trips when at least `min_requests` calls have been observed
//! since the last close and the failure ratio reaches `failure_ratio`.

use crate::{Error, Result};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Circuit breaker configuration
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Minimum calls observed before the ratio is evaluated
    pub min_requests: u32,
    /// Failure ratio that opens the circuit
    pub failure_ratio: f64,
    /// Cool-down before a half-open probe is admitted
    pub open_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            min_requests: 3,
            failure_ratio: 0.6,
            open_timeout: Duration::from_secs(60),
        }
    }
}

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    requests: u32,
    failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Typed breaker wrapped around the handler call; one per dispatcher.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: RwLock<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(BreakerState {
                state: CircuitState::Closed,
                requests: 0,
                failures: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    /// Execute `operation` under breaker protection.
    ///
    /// Returns `Error::BreakerOpen` without invoking the operation while the
    /// circuit is open (or a half-open probe is already in flight).
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        self.admit().await?;

        match operation().await {
            Ok(result) => {
                self.on_success().await;
                Ok(result)
            }
            Err(e) => {
                self.on_failure().await;
                Err(e)
            }
        }
    }

    async fn admit(&self) -> Result<()> {
        let mut state = self.state.write().await;

        match state.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed = state.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.config.open_timeout {
                    debug!(
                        "circuit breaker transitioning to HalfOpen after {}ms",
                        elapsed.as_millis()
                    );
                    state.state = CircuitState::HalfOpen;
                    state.probe_in_flight = true;
                    Ok(())
                } else {
                    Err(Error::BreakerOpen)
                }
            }
            CircuitState::HalfOpen => {
                if state.probe_in_flight {
                    Err(Error::BreakerOpen)
                } else {
                    state.probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    async fn on_success(&self) {
        let mut state = self.state.write().await;

        match state.state {
            CircuitState::HalfOpen => {
                debug!("circuit breaker closing after successful probe");
                state.state = CircuitState::Closed;
                state.requests = 0;
                state.failures = 0;
                state.opened_at = None;
                state.probe_in_flight = false;
            }
            _ => {
                state.requests = state.requests.saturating_add(1);
            }
        }
    }

    async fn on_failure(&self) {
        let mut state = self.state.write().await;

        match state.state {
            CircuitState::HalfOpen => {
                warn!("circuit breaker probe failed, reopening");
                state.state = CircuitState::Open;
                state.opened_at = Some(Instant::now());
                state.probe_in_flight = false;
            }
            CircuitState::Closed => {
                state.requests = state.requests.saturating_add(1);
                state.failures = state.failures.saturating_add(1);

                let ratio = f64::from(state.failures) / f64::from(state.requests);
                if state.requests >= self.config.min_requests
                    && ratio >= self.config.failure_ratio
                {
                    warn!(
                        requests = state.requests,
                        failures = state.failures,
                        "circuit breaker opening"
                    );
                    state.state = CircuitState::Open;
                    state.opened_at = Some(Instant::now());
                    state.requests = 0;
                    state.failures = 0;
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Current circuit state
    pub async fn state(&self) -> CircuitState {
        self.state.read().await.state
    }
}
