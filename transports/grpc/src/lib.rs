//! tonic transport for the elchi controller channel.
//!
//! Owns one multiplexed gRPC connection per instance: endpoint construction
//! (IPv4-only resolution, TLS or cleartext, HTTP/2 keepalive), the
//! `client-id` metadata interceptor, and the single-instance background
//! monitor that reconnects on failure and surrenders to the session manager
//! after its attempt budget.

pub mod endpoint;
pub mod interceptor;
pub mod monitor;
pub mod transport;

pub use endpoint::TransportConfig;
pub use monitor::{MonitorLifecycle, TransportEvent};
pub use transport::{GrpcConnector, GrpcTransport};
