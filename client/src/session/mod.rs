//! Session manager.
//!
//! Drives one logical session through connect -> register -> stream ->
//! shutdown. Stream errors reconnect with backoff; registration rejection is
//! fatal; SIGINT/SIGTERM drain with a 5s bound. The heartbeat runs on its
//! own transport and asks for a re-register through the callback installed
//! here, never by touching the session directly.

mod state;

pub use state::SessionState;

use crate::dispatch::CommandDispatcher;
use crate::heartbeat::Heartbeat;
use elchi_core::backoff::{Backoff, BackoffPolicy};
use elchi_core::info::ClientInfo;
use elchi_core::transport::{ControllerChannel, ControllerConnector, TransportEvent};
use elchi_core::{Error, Result};
use elchi_proto::{CommandResponse, UnregisterRequest};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Command id of the first frame sent on every fresh stream.
pub const INITIAL_CONNECTION_ID: &str = "initial_connection";

/// Outbound frame queue depth between dispatcher and stream.
const RESPONSE_QUEUE: usize = 64;

/// Session tuning knobs.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Consecutive failed connects before the process gives up.
    pub connect_attempts: u32,
    /// Wall-clock bound on shutdown cleanup.
    pub shutdown_timeout: Duration,
    /// Extra pause before reconnecting after a flow-control kick.
    pub flow_control_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            connect_attempts: 5,
            shutdown_timeout: Duration::from_secs(5),
            flow_control_delay: Duration::from_secs(5),
        }
    }
}

enum SessionExit {
    Shutdown,
    Reconnect { extra_delay: Option<Duration> },
}

/// One logical session per process.
pub struct Session {
    info: Arc<ClientInfo>,
    register_token: String,
    state: Arc<SessionState>,
    connector: Arc<dyn ControllerConnector>,
    heartbeat: Arc<Heartbeat>,
    dispatcher: Arc<CommandDispatcher>,
    events: Mutex<mpsc::Receiver<TransportEvent>>,
    options: SessionOptions,
}

impl Session {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        info: Arc<ClientInfo>,
        register_token: String,
        state: Arc<SessionState>,
        connector: Arc<dyn ControllerConnector>,
        heartbeat: Arc<Heartbeat>,
        dispatcher: Arc<CommandDispatcher>,
        events: mpsc::Receiver<TransportEvent>,
        options: SessionOptions,
    ) -> Self {
        Self {
            info,
            register_token,
            state,
            connector,
            heartbeat,
            dispatcher,
            events: Mutex::new(events),
            options,
        }
    }

    /// Run until cancelled or failed. Registration rejection and exhausted
    /// connect retries return an error; the process exits non-zero.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let mut backoff = Backoff::new(BackoffPolicy::session());
        let mut connect_failures = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            match self.run_streaming(&cancel).await {
                Ok(SessionExit::Shutdown) => return Ok(()),
                Ok(SessionExit::Reconnect { extra_delay }) => {
                    connect_failures = 0;
                    backoff.reset();
                    let delay =
                        backoff.next_delay() + extra_delay.unwrap_or(Duration::ZERO);
                    info!(delay = ?delay, "reconnecting to controller");
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "registration rejected, terminating");
                    return Err(e);
                }
                Err(e) => {
                    connect_failures += 1;
                    if connect_failures >= self.options.connect_attempts {
                        error!(
                            attempts = connect_failures,
                            error = %e,
                            "connect retries exhausted"
                        );
                        return Err(e);
                    }
                    let delay = backoff.next_delay();
                    warn!(
                        attempt = connect_failures,
                        delay = ?delay,
                        error = %e,
                        "connect failed, backing off"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// One connect -> register -> stream cycle. `Err` means the cycle died
    /// before streaming (connect or register); stream-phase failures come
    /// back as `Ok(Reconnect)`.
    async fn run_streaming(&self, cancel: &CancellationToken) -> Result<SessionExit> {
        let transport = self.connector.connect().await?;

        let response = transport
            .register(self.info.register_request(&self.register_token))
            .await?;

        if !response.success || response.session_token.is_empty() {
            let reason = if response.error.is_empty() {
                "controller returned no session token".to_string()
            } else {
                response.error
            };
            return Err(Error::Registration(reason));
        }

        let session_token = response.session_token;
        self.state.set_registered(session_token.clone());
        info!(client_id = %self.info.client_id, "registered with controller");

        // Heartbeat restarts on every successful Register; its only way back
        // into the session is this callback.
        let (reregister_tx, mut reregister_rx) = mpsc::channel::<()>(1);
        let callback: Arc<dyn Fn() + Send + Sync> = {
            let state = self.state.clone();
            Arc::new(move || {
                state.clear();
                let _ = reregister_tx.try_send(());
            })
        };
        if let Err(e) = self.heartbeat.start(callback).await {
            warn!(error = %e, "heartbeat transport failed to start");
        }

        let (response_tx, response_rx) = mpsc::channel::<CommandResponse>(RESPONSE_QUEUE);
        let mut inbound = match transport.open_command_stream(response_rx).await {
            Ok(stream) => stream,
            Err(e) => {
                self.teardown(&transport).await;
                return Err(e);
            }
        };

        // The initial-connection response is always the first frame on a
        // fresh stream; the controller correlates the stream to the session
        // with it.
        let mut initial = CommandResponse::ok(INITIAL_CONNECTION_ID);
        initial.identity = Some(self.info.identity(&session_token));
        if response_tx.send(initial).await.is_err() {
            self.teardown(&transport).await;
            return Err(Error::Transport(
                "command stream closed before initial response".into(),
            ));
        }

        info!("command stream open");

        let mut events = self.events.lock().await;
        let mut events_open = true;
        let mut reregister_open = true;

        let exit = loop {
            tokio::select! {
                _ = cancel.cancelled() => break SessionExit::Shutdown,
                request = reregister_rx.recv(), if reregister_open => match request {
                    Some(()) => {
                        info!("heartbeat requested re-register");
                        break SessionExit::Reconnect { extra_delay: None };
                    }
                    // Heartbeat never started; keep streaming without it.
                    None => reregister_open = false,
                },
                event = events.recv(), if events_open => match event {
                    Some(TransportEvent::Surrendered) => {
                        warn!("transport monitor surrendered");
                        break SessionExit::Reconnect { extra_delay: None };
                    }
                    Some(TransportEvent::Reconnected) => {
                        debug!("transport monitor re-established the channel");
                    }
                    None => events_open = false,
                },
                item = inbound.next() => match item {
                    Some(Ok(command)) => {
                        self.dispatcher.dispatch(command, &response_tx, cancel).await;
                    }
                    Some(Err(e)) => {
                        break SessionExit::Reconnect { extra_delay: self.classify_stream_error(&e) };
                    }
                    None => {
                        warn!("command stream closed by controller");
                        break SessionExit::Reconnect { extra_delay: None };
                    }
                }
            }
        };
        drop(events);

        match exit {
            SessionExit::Shutdown => {
                self.shutdown(&transport).await;
                Ok(SessionExit::Shutdown)
            }
            reconnect => {
                self.teardown(&transport).await;
                Ok(reconnect)
            }
        }
    }

    /// Stream error classification: flow-control kicks get an extra pause,
    /// everything else reconnects on the normal curve.
    fn classify_stream_error(&self, error: &Error) -> Option<Duration> {
        let message = error.to_string().to_lowercase();

        if message.contains("enhance_your_calm")
            || message.contains("enhance your calm")
            || message.contains("too_many_pings")
        {
            warn!(error = %error, "controller applied flow control, delaying reconnect");
            return Some(self.options.flow_control_delay);
        }

        if message.contains("transport is closing") || message.contains("connection is closing") {
            info!(error = %error, "stream closed, reconnecting");
        } else {
            warn!(error = %error, "stream error, reconnecting");
        }
        None
    }

    /// Reconnect-path cleanup: token invalidated, heartbeat down, transport
    /// closed so the next cycle starts clean.
    async fn teardown(&self, transport: &Arc<dyn ControllerChannel>) {
        self.heartbeat.stop().await;
        self.state.clear();
        transport.close().await;
    }

    /// Shutdown: best-effort Unregister, then heartbeat and transport, all
    /// bounded by the shutdown deadline.
    async fn shutdown(&self, transport: &Arc<dyn ControllerChannel>) {
        info!("draining session");
        let bounded = tokio::time::timeout(self.options.shutdown_timeout, async {
            let identity = self.info.identity(&self.state.token());
            if let Err(e) = transport
                .unregister(UnregisterRequest {
                    identity: Some(identity),
                })
                .await
            {
                debug!(error = %e, "unregister failed during shutdown");
            }
            self.heartbeat.stop().await;
            transport.close().await;
        })
        .await;

        if bounded.is_err() {
            warn!(
                deadline = ?self.options.shutdown_timeout,
                "shutdown cleanup exceeded deadline"
            );
        }
        self.state.clear();
        info!("session terminated");
    }
}
