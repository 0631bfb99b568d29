//! Controller reachability probes for the connectivity guard.
//!
//! Ladder, cheapest-meaningful first: gRPC ping over a controller channel,
//! TCP connect against the controller's known ports, ICMP echo. Controller
//! IP detection: explicit env vars, then the kernel socket table, then the
//! default gateway.

use crate::reconcile::exec::run_command;
use crate::reconcile::guard::ControllerProbe;
use async_trait::async_trait;
use elchi_core::transport::ControllerConnector;
use elchi_proto::PingRequest;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Ports probed on the controller IP, in order.
pub const PROBE_TCP_PORTS: [u16; 4] = [443, 50051, 8080, 9090];

/// Env vars consulted for the controller address, in order.
pub const CONTROLLER_ENV_VARS: [&str; 3] =
    ["ELCHI_SERVER_HOST", "CONTROLLER_HOST", "GRPC_SERVER_HOST"];

const GRPC_PROBE_TIMEOUT: Duration = Duration::from_secs(1);
const TCP_PROBE_TIMEOUT: Duration = Duration::from_millis(300);

/// Probe ladder over a dedicated controller connector plus raw reachability
/// checks against the detected controller IP.
pub struct LadderProbe {
    connector: Option<Arc<dyn ControllerConnector>>,
    controller_ip: Option<IpAddr>,
    client_id: String,
}

impl LadderProbe {
    pub fn new(
        connector: Option<Arc<dyn ControllerConnector>>,
        controller_ip: Option<IpAddr>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            connector,
            controller_ip,
            client_id: client_id.into(),
        }
    }

    async fn grpc_probe(&self) -> bool {
        let Some(connector) = &self.connector else {
            return false;
        };
        let request = PingRequest {
            timestamp: chrono::Utc::now().timestamp_millis(),
            client_id: self.client_id.clone(),
        };
        let attempt = async {
            let channel = connector.connect().await?;
            channel.ping(request).await
        };
        matches!(
            tokio::time::timeout(GRPC_PROBE_TIMEOUT, attempt).await,
            Ok(Ok(_))
        )
    }

    async fn tcp_probe(&self, ip: IpAddr) -> bool {
        for port in PROBE_TCP_PORTS {
            let addr = SocketAddr::new(ip, port);
            if let Ok(Ok(_)) =
                tokio::time::timeout(TCP_PROBE_TIMEOUT, tokio::net::TcpStream::connect(addr)).await
            {
                return true;
            }
        }
        false
    }

    async fn icmp_probe(&self, ip: IpAddr) -> bool {
        let target = ip.to_string();
        run_command(
            "ping",
            ["-c", "1", "-W", "1", target.as_str()],
            Duration::from_secs(2),
        )
        .await
        .is_ok()
    }
}

#[async_trait]
impl ControllerProbe for LadderProbe {
    async fn probe(&self) -> bool {
        if self.grpc_probe().await {
            return true;
        }
        let Some(ip) = self.controller_ip else {
            debug!("no controller ip detected, probe ladder exhausted");
            return false;
        };
        if self.tcp_probe(ip).await {
            return true;
        }
        self.icmp_probe(ip).await
    }
}

/// Detect the controller IP: env var, established outbound TCP session on a
/// controller port, default gateway as last resort.
pub async fn detect_controller_ip() -> Option<IpAddr> {
    for var in CONTROLLER_ENV_VARS {
        if let Ok(value) = std::env::var(var) {
            if value.is_empty() {
                continue;
            }
            if let Ok(ip) = value.parse::<IpAddr>() {
                return Some(ip);
            }
            if let Some(ip) = resolve_first_ipv4(&value).await {
                return Some(ip);
            }
        }
    }

    if let Ok(contents) = tokio::fs::read_to_string("/proc/net/tcp").await {
        if let Some(ip) = parse_established_remote(&contents, &[443, 50051]) {
            return Some(IpAddr::V4(ip));
        }
    }

    if let Ok(contents) = tokio::fs::read_to_string("/proc/net/route").await {
        if let Some(ip) = parse_default_gateway(&contents) {
            return Some(IpAddr::V4(ip));
        }
    }

    None
}

async fn resolve_first_ipv4(host: &str) -> Option<IpAddr> {
    tokio::net::lookup_host((host, 443))
        .await
        .ok()?
        .find(SocketAddr::is_ipv4)
        .map(|addr| addr.ip())
}

/// Remote IPv4 of an ESTABLISHED session whose remote port is in `ports`,
/// from `/proc/net/tcp` (hex, little-endian addresses).
pub fn parse_established_remote(contents: &str, ports: &[u16]) -> Option<Ipv4Addr> {
    for line in contents.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }
        // st 01 = ESTABLISHED
        if fields[3] != "01" {
            continue;
        }
        let (addr_hex, port_hex) = fields[2].split_once(':')?;
        let port = u16::from_str_radix(port_hex, 16).ok()?;
        if !ports.contains(&port) {
            continue;
        }
        let raw = u32::from_str_radix(addr_hex, 16).ok()?;
        let ip = Ipv4Addr::from(raw.swap_bytes());
        if !ip.is_loopback() && !ip.is_unspecified() {
            return Some(ip);
        }
    }
    None
}

/// Default gateway from `/proc/net/route` (hex, little-endian).
pub fn parse_default_gateway(contents: &str) -> Option<Ipv4Addr> {
    for line in contents.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            continue;
        }
        if fields[1] != "00000000" {
            continue;
        }
        let raw = u32::from_str_radix(fields[2], 16).ok()?;
        let gateway = Ipv4Addr::from(raw.swap_bytes());
        if !gateway.is_unspecified() {
            return Some(gateway);
        }
    }
    None
}
