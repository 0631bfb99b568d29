//! SERVICE handler: systemd unit control.

use crate::reconcile::systemd::{validate_unit_name, SystemdOps, UnitAction};
use async_trait::async_trait;
use elchi_core::command::{CommandHandler, HandlerContext};
use elchi_core::{Error, Result};
use elchi_proto::command::Payload;
use elchi_proto::command_response::Result as CommandResult;
use elchi_proto::{Command, CommandResponse};
use std::sync::Arc;
use tracing::info;

pub struct ServiceHandler {
    systemd: Arc<dyn SystemdOps>,
}

impl ServiceHandler {
    pub fn new(systemd: Arc<dyn SystemdOps>) -> Self {
        Self { systemd }
    }
}

#[async_trait]
impl CommandHandler for ServiceHandler {
    fn name(&self) -> &'static str {
        "service"
    }

    async fn handle(&self, _ctx: &HandlerContext, command: Command) -> Result<CommandResponse> {
        let Some(Payload::Service(request)) = command.payload else {
            return Err(Error::Validation(
                "SERVICE command requires a service payload".into(),
            ));
        };

        validate_unit_name(&request.name)?;

        // The action rides in the payload, falling back to the sub_type.
        let action = if request.action.is_empty() {
            command.sub_type.clone()
        } else {
            request.action.clone()
        };

        if action.is_empty() || action == "status" {
            let status = self.systemd.status(&request.name).await?;
            return Ok(CommandResponse::ok(command.command_id)
                .with_result(CommandResult::ServiceStatus(status)));
        }

        let action = UnitAction::parse(&action)
            .ok_or_else(|| Error::Validation(format!("unknown service action '{}'", action)))?;

        self.systemd.unit_action(action, &request.name).await?;
        info!(unit = %request.name, action = action.as_arg(), "service action applied");

        let status = self.systemd.status(&request.name).await?;
        Ok(CommandResponse::ok(command.command_id)
            .with_result(CommandResult::ServiceStatus(status)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elchi_proto::{CommandType, ServiceRequest, ServiceStatus};
    use tokio::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct FakeSystemd {
        actions: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SystemdOps for FakeSystemd {
        async fn unit_action(&self, action: UnitAction, unit: &str) -> Result<()> {
            self.actions
                .lock()
                .await
                .push((action.as_arg().to_string(), unit.to_string()));
            Ok(())
        }
        async fn daemon_reload(&self) -> Result<()> {
            self.actions
                .lock()
                .await
                .push(("daemon-reload".into(), String::new()));
            Ok(())
        }
        async fn status(&self, unit: &str) -> Result<ServiceStatus> {
            Ok(ServiceStatus {
                name: unit.to_string(),
                active_state: "active".into(),
                sub_state: "running".into(),
                enabled: true,
            })
        }
    }

    fn service_command(name: &str, action: &str) -> Command {
        Command {
            command_id: "svc-1".into(),
            r#type: CommandType::Service as i32,
            payload: Some(Payload::Service(ServiceRequest {
                name: name.into(),
                action: action.into(),
            })),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_restart_runs_and_reports_status() {
        let systemd = Arc::new(FakeSystemd::default());
        let handler = ServiceHandler::new(systemd.clone());
        let ctx = HandlerContext::new(CancellationToken::new());

        let response = handler
            .handle(&ctx, service_command("frr", "restart"))
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(
            systemd.actions.lock().await.as_slice(),
            &[("restart".to_string(), "frr".to_string())]
        );
        assert!(matches!(
            response.result,
            Some(CommandResult::ServiceStatus(_))
        ));
    }

    #[tokio::test]
    async fn test_status_is_read_only() {
        let systemd = Arc::new(FakeSystemd::default());
        let handler = ServiceHandler::new(systemd.clone());
        let ctx = HandlerContext::new(CancellationToken::new());

        let response = handler
            .handle(&ctx, service_command("envoy-edge", "status"))
            .await
            .unwrap();

        assert!(response.success);
        assert!(systemd.actions.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_action_rejected() {
        let handler = ServiceHandler::new(Arc::new(FakeSystemd::default()));
        let ctx = HandlerContext::new(CancellationToken::new());

        let err = handler
            .handle(&ctx, service_command("frr", "explode"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_invalid_unit_name_rejected() {
        let handler = ServiceHandler::new(Arc::new(FakeSystemd::default()));
        let ctx = HandlerContext::new(CancellationToken::new());

        let err = handler
            .handle(&ctx, service_command("bad unit; rm -rf", "start"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
