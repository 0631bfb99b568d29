//! Command dispatcher.
//!
//! Runs on the single stream-receive task; per-command work is fanned out
//! into the worker pool. Admission order per command: session-token check,
//! rate limit, worker slot, circuit breaker, handler, response stamping.
//! Rejections answer on the stream and never terminate it.

use crate::session::SessionState;
use elchi_core::breaker::{BreakerConfig, CircuitBreaker};
use elchi_core::command::{HandlerContext, HandlerRegistry};
use elchi_core::info::ClientInfo;
use elchi_core::ratelimit::CommandRateLimiter;
use elchi_core::{Error, Result};
use elchi_proto::{Command, CommandResponse};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Error string for command types outside the registry.
pub const UNSUPPORTED_TYPE_ERROR: &str = "unsupported command type";

/// Dispatcher tuning knobs.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Token bucket refill rate (requests per second).
    pub rate_per_sec: u32,
    /// Token bucket burst capacity.
    pub burst: u32,
    /// Bounded worker pool size; the receive loop blocks when all workers
    /// are busy, which is the back-pressure the controller sees.
    pub workers: usize,
    /// Circuit breaker around handler execution.
    pub breaker: BreakerConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            rate_per_sec: 20,
            burst: 50,
            workers: 10,
            breaker: BreakerConfig::default(),
        }
    }
}

/// Validates, schedules and executes commands, writing responses back on
/// the stream's outbound queue.
pub struct CommandDispatcher {
    registry: HandlerRegistry,
    limiter: CommandRateLimiter,
    workers: Arc<Semaphore>,
    breaker: Arc<CircuitBreaker>,
    state: Arc<SessionState>,
    info: Arc<ClientInfo>,
}

impl CommandDispatcher {
    pub fn new(
        registry: HandlerRegistry,
        config: DispatcherConfig,
        state: Arc<SessionState>,
        info: Arc<ClientInfo>,
    ) -> Self {
        Self {
            registry,
            limiter: CommandRateLimiter::new(config.rate_per_sec, config.burst),
            workers: Arc::new(Semaphore::new(config.workers.max(1))),
            breaker: Arc::new(CircuitBreaker::new(config.breaker)),
            state,
            info,
        }
    }

    /// Admit one command. Steps 1-3 run on the caller (receive) task; the
    /// handler runs on a worker task holding a pool permit.
    pub async fn dispatch(
        &self,
        command: Command,
        responses: &mpsc::Sender<CommandResponse>,
        cancel: &CancellationToken,
    ) {
        let command_id = command.command_id.clone();
        let kind = command.command_type();

        // 1. Identity check: reject empty or stale session tokens.
        if let Err(e) = self.check_identity(&command) {
            warn!(
                command_id = %command_id,
                kind = kind.short_name(),
                error = %e,
                "rejecting command"
            );
            self.send_response(responses, CommandResponse::failure(command_id, e.wire_message()))
                .await;
            return;
        }

        // 2. Rate limit: wait for a bucket token, abort on cancellation.
        tokio::select! {
            _ = cancel.cancelled() => {
                self.send_response(
                    responses,
                    CommandResponse::failure(command_id, "cancelled while rate limited"),
                )
                .await;
                return;
            }
            _ = self.limiter.acquire() => {}
        }

        // 3. Worker slot: blocking here slows the stream-receive loop.
        let permit = tokio::select! {
            _ = cancel.cancelled() => {
                self.send_response(
                    responses,
                    CommandResponse::failure(command_id, "cancelled while waiting for worker"),
                )
                .await;
                return;
            }
            permit = self.workers.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                // The pool semaphore is never closed.
                Err(_) => return,
            }
        };

        // 4/5. Route through the registry; unknown types answer here without
        // touching the breaker.
        let Some(handler) = self.registry.get(kind) else {
            drop(permit);
            debug!(command_id = %command_id, command_type = command.r#type, "unsupported command type");
            self.send_response(
                responses,
                CommandResponse::failure(command_id, UNSUPPORTED_TYPE_ERROR),
            )
            .await;
            return;
        };

        let breaker = Arc::clone(&self.breaker);
        let state = Arc::clone(&self.state);
        let info = Arc::clone(&self.info);
        let responses = responses.clone();
        let cancel = cancel.clone();

        tokio::spawn(async move {
            let _permit = permit;
            let ctx = HandlerContext::new(cancel);
            let handler_name = handler.name();

            let result = breaker.call(|| handler.handle(&ctx, command)).await;

            let mut response = match result {
                Ok(response) => response,
                Err(e) => {
                    debug!(
                        command_id = %command_id,
                        handler = handler_name,
                        error = %e,
                        "handler failed"
                    );
                    CommandResponse::failure(command_id.clone(), e.wire_message())
                }
            };

            // 6. Response stamping: the command id is echoed verbatim and
            // the identity carries the token current at send time.
            response.command_id = command_id;
            stamp_identity(&mut response, &state, &info);
            let _ = responses.send(response).await;
        });
    }

    fn check_identity(&self, command: &Command) -> Result<()> {
        let presented = command
            .identity
            .as_ref()
            .map(|identity| identity.session_token.as_str())
            .unwrap_or_default();

        if presented.is_empty() {
            return Err(Error::Validation("missing session token".into()));
        }
        let current = self.state.token();
        if presented != current {
            return Err(Error::Validation("stale session token".into()));
        }
        Ok(())
    }

    async fn send_response(
        &self,
        responses: &mpsc::Sender<CommandResponse>,
        mut response: CommandResponse,
    ) {
        stamp_identity(&mut response, &self.state, &self.info);
        let _ = responses.send(response).await;
    }

    /// Worker permits currently free (tests).
    pub fn available_workers(&self) -> usize {
        self.workers.available_permits()
    }
}

/// Identity fields echoed by the handler survive; the session token is
/// always replaced with the current one.
fn stamp_identity(response: &mut CommandResponse, state: &SessionState, info: &ClientInfo) {
    let mut identity = response
        .identity
        .take()
        .unwrap_or_else(|| info.identity(""));
    identity.session_token = state.token();
    response.identity = Some(identity);
}
