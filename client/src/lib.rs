//! elchi-client: on-host network-management agent.
//!
//! The binary keeps one authenticated bidirectional command stream open to
//! the controller and executes dispatched commands against the local OS.
//! Session lifecycle, heartbeat liveness, the dispatch pipeline and the
//! reconcilers live here; the transport-free machinery is in `elchi-core`
//! and the tonic transport in `elchi-grpc`.

pub mod cli;
pub mod dispatch;
pub mod handlers;
pub mod heartbeat;
pub mod logging;
pub mod reconcile;
pub mod session;
