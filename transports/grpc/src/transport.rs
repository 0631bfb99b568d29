//! `ControllerChannel` over a tonic channel.
//!
//! The transport owns one multiplexed connection. Unary RPCs share the
//! channel with the command stream; the heartbeat service opens a second
//! transport instance so ping liveness is not masked by stream stalls.

use crate::endpoint::{build_endpoint, TransportConfig};
use crate::interceptor::ClientIdInterceptor;
use crate::monitor::{
    MonitorLifecycle, TransportEvent, TransportEvents, MONITOR_INTERVAL, MONITOR_MAX_RECONNECTS,
};
use async_trait::async_trait;
use elchi_core::backoff::{Backoff, BackoffPolicy};
use elchi_core::transport::{CommandStream, ControllerChannel, ControllerConnector};
use elchi_core::{Error, Result};
use elchi_proto::command_service_client::CommandServiceClient;
use elchi_proto::{
    CommandResponse, PingRequest, PingResponse, RegisterRequest, RegisterResponse,
    UnregisterRequest, UnregisterResponse,
};
use futures::StreamExt;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::Channel;
use tracing::{debug, info, warn};

type InterceptedClient = CommandServiceClient<InterceptedService<Channel, ClientIdInterceptor>>;

/// One streaming-capable gRPC connection to the controller.
pub struct GrpcTransport {
    config: TransportConfig,
    client_id: Arc<RwLock<String>>,
    channel: Mutex<Option<Channel>>,
    monitor: MonitorLifecycle,
    /// Cancelled by `close`; ends any open command stream.
    closed: CancellationToken,
}

impl GrpcTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            client_id: Arc::new(RwLock::new(String::new())),
            channel: Mutex::new(None),
            monitor: MonitorLifecycle::new(),
            closed: CancellationToken::new(),
        }
    }

    /// Stable process-wide identifier stamped on every outgoing request.
    pub fn set_client_id(&self, id: impl Into<String>) {
        *self.client_id.write() = id.into();
    }

    /// Establish the connection. Idempotent while the channel is healthy.
    pub async fn connect(&self) -> Result<()> {
        self.channel().await.map(|_| ())
    }

    async fn channel(&self) -> Result<Channel> {
        let mut guard = self.channel.lock().await;

        if let Some(ref channel) = *guard {
            return Ok(channel.clone());
        }

        let endpoint = build_endpoint(&self.config).await?;
        let channel = endpoint.connect().await.map_err(|e| {
            Error::Transport(format!(
                "connecting to {}:{}: {}",
                self.config.host, self.config.port, e
            ))
        })?;

        debug!(host = %self.config.host, port = self.config.port, "controller channel established");
        *guard = Some(channel.clone());
        Ok(channel)
    }

    /// Drop the cached channel so the next call dials again.
    async fn reset_channel(&self) {
        *self.channel.lock().await = None;
    }

    fn intercepted(&self, channel: Channel) -> InterceptedClient {
        CommandServiceClient::with_interceptor(
            channel,
            ClientIdInterceptor::new(self.client_id.clone()),
        )
    }

    async fn client(&self) -> Result<InterceptedClient> {
        let channel = self.channel().await?;
        Ok(self.intercepted(channel))
    }

    async fn unary_deadline<T>(
        &self,
        fut: impl std::future::Future<Output = std::result::Result<tonic::Response<T>, tonic::Status>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.config.request_timeout, fut).await {
            Ok(Ok(response)) => Ok(response.into_inner()),
            Ok(Err(status)) => Err(status_to_error(&status)),
            Err(_) => Err(Error::Transport(format!(
                "rpc deadline of {:?} exceeded",
                self.config.request_timeout
            ))),
        }
    }

    /// Start the background monitor for this transport, replacing any
    /// previous instance. Events land on `events`.
    pub async fn start_monitor(self: &Arc<Self>, events: TransportEvents) {
        let cancel = CancellationToken::new();
        let transport = Arc::clone(self);
        let token = cancel.clone();

        let join = tokio::spawn(async move {
            transport.monitor_loop(token, events).await;
        });

        self.monitor.replace(cancel, join).await;
    }

    async fn monitor_loop(&self, cancel: CancellationToken, events: TransportEvents) {
        let mut ticker = tokio::time::interval(MONITOR_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }

            if self.probe().await {
                continue;
            }

            warn!("controller unreachable, monitor reconnecting");
            let mut backoff = Backoff::new(BackoffPolicy::transport());
            let mut recovered = false;

            while backoff.attempt() < MONITOR_MAX_RECONNECTS {
                let delay = backoff.next_delay();
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }

                self.reset_channel().await;
                match self.connect().await {
                    Ok(()) if self.probe().await => {
                        info!(attempt = backoff.attempt(), "monitor re-established controller channel");
                        let _ = events.send(TransportEvent::Reconnected).await;
                        recovered = true;
                        break;
                    }
                    Ok(()) => {}
                    Err(e) => {
                        debug!(error = %e, attempt = backoff.attempt(), "monitor reconnect failed");
                    }
                }
            }

            if !recovered {
                warn!("monitor reconnect attempts exhausted, surrendering to session manager");
                let _ = events.send(TransportEvent::Surrendered).await;
                return;
            }
        }
    }

    /// Cheap liveness probe on the shared channel.
    async fn probe(&self) -> bool {
        let request = PingRequest {
            timestamp: chrono::Utc::now().timestamp_millis(),
            client_id: self.client_id.read().clone(),
        };
        match tokio::time::timeout(Duration::from_secs(5), async {
            self.client().await?.ping(request).await.map_err(|s| status_to_error(&s))
        })
        .await
        {
            Ok(Ok(_)) => true,
            _ => false,
        }
    }
}

#[async_trait]
impl ControllerChannel for GrpcTransport {
    async fn register(&self, request: RegisterRequest) -> Result<RegisterResponse> {
        let mut client = self.client().await?;
        self.unary_deadline(client.register(request)).await
    }

    async fn unregister(&self, request: UnregisterRequest) -> Result<UnregisterResponse> {
        let mut client = self.client().await?;
        self.unary_deadline(client.unregister(request)).await
    }

    async fn ping(&self, request: PingRequest) -> Result<PingResponse> {
        let mut client = self.client().await?;
        self.unary_deadline(client.ping(request)).await
    }

    async fn open_command_stream(
        &self,
        outbound: mpsc::Receiver<CommandResponse>,
    ) -> Result<CommandStream> {
        let mut client = self.client().await?;
        let response = client
            .command_stream(ReceiverStream::new(outbound))
            .await
            .map_err(|s| status_to_error(&s))?;

        let inbound = response
            .into_inner()
            .map(|item| item.map_err(|s| status_to_error(&s)))
            .take_until(self.closed.clone().cancelled_owned());

        Ok(Box::pin(inbound))
    }

    async fn close(&self) {
        self.monitor.stop().await;
        self.closed.cancel();
        self.reset_channel().await;
    }
}

/// Preserve the status text; the session classifies stream errors by it.
fn status_to_error(status: &tonic::Status) -> Error {
    Error::Transport(format!("{:?}: {}", status.code(), status.message()))
}

/// Connector handed to the session and heartbeat. Each `connect` call
/// produces a fresh transport; when an event sender is attached the
/// transport also gets a background monitor.
pub struct GrpcConnector {
    config: TransportConfig,
    client_id: String,
    events: Option<TransportEvents>,
}

impl GrpcConnector {
    pub fn new(config: TransportConfig, client_id: impl Into<String>) -> Self {
        Self {
            config,
            client_id: client_id.into(),
            events: None,
        }
    }

    /// Attach the session-manager event channel; transports from this
    /// connector will run a background monitor.
    pub fn with_events(mut self, events: TransportEvents) -> Self {
        self.events = Some(events);
        self
    }
}

#[async_trait]
impl ControllerConnector for GrpcConnector {
    async fn connect(&self) -> Result<Arc<dyn ControllerChannel>> {
        let transport = Arc::new(GrpcTransport::new(self.config.clone()));
        transport.set_client_id(self.client_id.clone());
        transport.connect().await?;

        if let Some(ref events) = self.events {
            transport.start_monitor(events.clone()).await;
        }

        Ok(transport)
    }
}
