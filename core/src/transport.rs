//! Client-side controller channel abstraction.
//!
//! The session runtime, heartbeat and dispatcher are written against these
//! traits; `elchi-grpc` provides the tonic implementation and tests provide
//! scripted fakes.

use crate::Result;
use async_trait::async_trait;
use elchi_proto::{
    Command, CommandResponse, PingRequest, PingResponse, RegisterRequest, RegisterResponse,
    UnregisterRequest, UnregisterResponse,
};
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Inbound half of the command stream.
pub type CommandStream = Pin<Box<dyn Stream<Item = Result<Command>> + Send>>;

/// Events a transport's background monitor reports to the session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// The monitor re-established the connection on its own.
    Reconnected,
    /// Reconnect attempts exhausted; the session manager must take over.
    Surrendered,
}

/// Sender half used by transports to report monitor events.
pub type TransportEvents = mpsc::Sender<TransportEvent>;

/// One streaming-capable connection to the controller.
///
/// # Thread Safety
///
/// Implementations must be Send + Sync; the session, dispatcher and monitor
/// all hold the same instance.
#[async_trait]
pub trait ControllerChannel: Send + Sync {
    /// Register this client; on success the response carries the session
    /// token every subsequent frame must be stamped with.
    async fn register(&self, request: RegisterRequest) -> Result<RegisterResponse>;

    /// Best-effort unregister during shutdown.
    async fn unregister(&self, request: UnregisterRequest) -> Result<UnregisterResponse>;

    /// Liveness ping; also used as the cheapest controller reachability probe.
    async fn ping(&self, request: PingRequest) -> Result<PingResponse>;

    /// Open the bidirectional command stream. Frames queued on `outbound`
    /// are sent to the controller; the returned stream yields its commands.
    async fn open_command_stream(
        &self,
        outbound: mpsc::Receiver<CommandResponse>,
    ) -> Result<CommandStream>;

    /// Idempotent close; interrupts a blocked stream read.
    async fn close(&self);
}

/// Factory for controller channels. The session uses one for the command
/// stream; the heartbeat opens its own so ping liveness is not masked by
/// stream stalls.
#[async_trait]
pub trait ControllerConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn ControllerChannel>>;
}
