//! PROXY handler: Envoy admin interface passthrough.
//!
//! The admin interface listens on loopback only; the handler forwards one
//! request and returns the status plus a bounded body.

use async_trait::async_trait;
use elchi_core::command::{CommandHandler, HandlerContext};
use elchi_core::{Error, Result};
use elchi_proto::command::Payload;
use elchi_proto::command_response::Result as CommandResult;
use elchi_proto::{Command, CommandResponse, ProxyResult};

/// Envoy's default admin port.
pub const DEFAULT_ADMIN_PORT: u16 = 9901;

/// Body bytes forwarded at most.
pub const MAX_BODY_BYTES: usize = 256 * 1024;

pub struct ProxyHandler {
    http: reqwest::Client,
}

impl ProxyHandler {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl CommandHandler for ProxyHandler {
    fn name(&self) -> &'static str {
        "proxy"
    }

    async fn handle(&self, _ctx: &HandlerContext, command: Command) -> Result<CommandResponse> {
        let Some(Payload::Proxy(request)) = command.payload else {
            return Err(Error::Validation(
                "PROXY command requires a proxy payload".into(),
            ));
        };

        if !request.path.starts_with('/') {
            return Err(Error::Validation(format!(
                "admin path '{}' must start with '/'",
                request.path
            )));
        }

        let port = if request.admin_port > 0 && request.admin_port <= u32::from(u16::MAX) {
            request.admin_port as u16
        } else {
            DEFAULT_ADMIN_PORT
        };
        let url = format!("http://127.0.0.1:{}{}", port, request.path);

        let builder = match request.method.to_uppercase().as_str() {
            "" | "GET" => self.http.get(&url),
            "POST" => self.http.post(&url),
            other => {
                return Err(Error::Validation(format!(
                    "method '{}' is not allowed against the admin interface",
                    other
                )));
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Operation(format!("admin request to {}: {}", url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map(clamp_body)
            .map_err(|e| Error::Operation(format!("reading admin response: {}", e)))?;

        Ok(
            CommandResponse::ok(command.command_id).with_result(CommandResult::ProxyResult(
                ProxyResult {
                    status: u32::from(status),
                    body,
                },
            )),
        )
    }
}

/// Bound the forwarded body, cutting on a char boundary; admin output can
/// hold multi-byte characters anywhere (cluster names in /config_dump,
/// stats tags).
fn clamp_body(mut body: String) -> String {
    if body.len() > MAX_BODY_BYTES {
        let mut cut = MAX_BODY_BYTES;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use elchi_proto::{CommandType, ProxyRequest};
    use tokio_util::sync::CancellationToken;

    fn proxy_command(method: &str, path: &str) -> Command {
        Command {
            command_id: "proxy-1".into(),
            r#type: CommandType::Proxy as i32,
            payload: Some(Payload::Proxy(ProxyRequest {
                name: "edge".into(),
                method: method.into(),
                path: path.into(),
                admin_port: 0,
            })),
            ..Default::default()
        }
    }

    fn handler() -> ProxyHandler {
        ProxyHandler::new(reqwest::Client::new())
    }

    #[tokio::test]
    async fn test_relative_path_rejected() {
        let ctx = HandlerContext::new(CancellationToken::new());
        let err = handler()
            .handle(&ctx, proxy_command("GET", "stats"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_destructive_method_rejected() {
        let ctx = HandlerContext::new(CancellationToken::new());
        let err = handler()
            .handle(&ctx, proxy_command("DELETE", "/stats"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_missing_payload_rejected() {
        let ctx = HandlerContext::new(CancellationToken::new());
        let command = Command {
            command_id: "proxy-2".into(),
            r#type: CommandType::Proxy as i32,
            ..Default::default()
        };
        let err = handler().handle(&ctx, command).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_clamp_body_leaves_short_bodies_alone() {
        let body = clamp_body("cluster_a::rq_total: 12\n".to_string());
        assert_eq!(body, "cluster_a::rq_total: 12\n");
    }

    #[test]
    fn test_clamp_body_respects_char_boundaries() {
        // One leading byte shifts every 2-byte char onto an odd offset, so
        // the cap lands mid-character.
        let body = format!("a{}", "é".repeat(MAX_BODY_BYTES / 2));
        assert!(body.len() > MAX_BODY_BYTES);
        assert!(!body.is_char_boundary(MAX_BODY_BYTES));

        let clamped = clamp_body(body);
        assert!(clamped.len() <= MAX_BODY_BYTES);
        assert_eq!(clamped.len(), MAX_BODY_BYTES - 1);
    }
}
