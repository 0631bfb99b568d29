//! Endpoint construction for the controller connection.
//!
//! The controller name is resolved to IPv4 only; the endpoint carries the
//! connect deadline and HTTP/2 keepalive settings, and TLS validates against
//! the configured host name.

use elchi_core::config::ServerConfig;
use elchi_core::{Error, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tonic::transport::{ClientTlsConfig, Endpoint};
use tracing::warn;

/// Connect deadline applied to every dial.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP/2 keepalive ping period.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Keepalive ack deadline.
pub const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(20);

/// Connection parameters extracted from the server config once at startup.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub insecure_skip_verify: bool,
    /// Applied to unary RPCs only; the command stream is long-lived.
    pub request_timeout: Duration,
}

impl TransportConfig {
    pub fn from_server_config(server: &ServerConfig) -> Result<Self> {
        Ok(Self {
            host: server.host.clone(),
            port: server.port,
            tls: server.tls,
            insecure_skip_verify: server.insecure_skip_verify,
            request_timeout: server.timeout()?,
        })
    }
}

/// Resolve the controller name to its first IPv4 address.
pub async fn resolve_ipv4(host: &str, port: u16) -> Result<SocketAddr> {
    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| Error::Transport(format!("resolving {}: {}", host, e)))?;

    addrs
        .into_iter()
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| Error::Transport(format!("no IPv4 address for {}", host)))
}

/// Build the tonic endpoint for the configured controller.
pub async fn build_endpoint(config: &TransportConfig) -> Result<Endpoint> {
    let addr = resolve_ipv4(&config.host, config.port).await?;

    let scheme = if config.tls { "https" } else { "http" };
    let uri = format!("{}://{}:{}", scheme, addr.ip(), config.port);

    let mut endpoint = Endpoint::from_shared(uri)
        .map_err(|e| Error::Transport(format!("invalid endpoint: {}", e)))?
        .connect_timeout(CONNECT_TIMEOUT)
        .tcp_nodelay(true)
        .http2_keep_alive_interval(KEEPALIVE_INTERVAL)
        .keep_alive_timeout(KEEPALIVE_TIMEOUT)
        .keep_alive_while_idle(false);

    if config.tls {
        if config.insecure_skip_verify {
            // Dev flag; the ring-backed stack still validates against the
            // platform trust anchors.
            warn!("server.insecure_skip_verify is set; controller certificate should be CA-signed in production");
        }
        let tls = ClientTlsConfig::new()
            .with_native_roots()
            .domain_name(config.host.clone());
        endpoint = endpoint
            .tls_config(tls)
            .map_err(|e| Error::Transport(format!("tls config: {}", e)))?;
    }

    Ok(endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: &str, tls: bool) -> TransportConfig {
        TransportConfig {
            host: host.to_string(),
            port: 50051,
            tls,
            insecure_skip_verify: false,
            request_timeout: Duration::from_secs(30),
        }
    }

    #[tokio::test]
    async fn test_resolves_ipv4_literal() {
        let addr = resolve_ipv4("127.0.0.1", 50051).await.unwrap();
        assert!(addr.is_ipv4());
        assert_eq!(addr.port(), 50051);
    }

    #[tokio::test]
    async fn test_rejects_ipv6_only() {
        let result = resolve_ipv4("::1", 50051).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cleartext_endpoint_uri() {
        let endpoint = build_endpoint(&config("127.0.0.1", false)).await.unwrap();
        assert_eq!(endpoint.uri().scheme_str(), Some("http"));
        assert_eq!(endpoint.uri().port_u16(), Some(50051));
    }

    #[tokio::test]
    async fn test_tls_endpoint_uri() {
        let endpoint = build_endpoint(&config("127.0.0.1", true)).await.unwrap();
        assert_eq!(endpoint.uri().scheme_str(), Some("https"));
    }

    #[test]
    fn test_from_server_config_parses_timeout() {
        let server = ServerConfig {
            host: "controller".into(),
            timeout: "10s".into(),
            ..Default::default()
        };
        let config = TransportConfig::from_server_config(&server).unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }
}
