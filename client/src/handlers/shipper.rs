//! FILEBEAT / RSYSLOG handler: log-shipper configuration.
//!
//! Desired config is written atomically and the shipper restarted, but only
//! when the contents actually changed.

use crate::reconcile::files;
use crate::reconcile::systemd::{SystemdOps, UnitAction};
use async_trait::async_trait;
use elchi_core::command::{CommandHandler, HandlerContext};
use elchi_core::config::PathsConfig;
use elchi_core::{Error, Result};
use elchi_proto::command::Payload;
use elchi_proto::{Command, CommandResponse};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub struct ShipperHandler {
    systemd: Arc<dyn SystemdOps>,
    config_path: PathBuf,
    unit: &'static str,
    component: &'static str,
}

impl ShipperHandler {
    pub fn filebeat(systemd: Arc<dyn SystemdOps>, paths: &PathsConfig) -> Self {
        Self {
            systemd,
            config_path: paths.filebeat_config.clone(),
            unit: "filebeat",
            component: "filebeat",
        }
    }

    pub fn rsyslog(systemd: Arc<dyn SystemdOps>, paths: &PathsConfig) -> Self {
        Self {
            systemd,
            config_path: paths.rsyslog_config.clone(),
            unit: "rsyslog",
            component: "rsyslog",
        }
    }
}

#[async_trait]
impl CommandHandler for ShipperHandler {
    fn name(&self) -> &'static str {
        self.component
    }

    async fn handle(&self, _ctx: &HandlerContext, command: Command) -> Result<CommandResponse> {
        let Some(Payload::LogPipeline(request)) = command.payload else {
            return Err(Error::Validation(format!(
                "{} command requires a log pipeline payload",
                self.component.to_uppercase()
            )));
        };

        if request.contents.is_empty() {
            return Err(Error::Validation("shipper config contents are required".into()));
        }

        let current = files::read_if_exists(&self.config_path).await?;
        if current.as_deref() == Some(request.contents.as_str()) {
            return Ok(CommandResponse::ok(command.command_id));
        }

        files::write_atomic(&self.config_path, &request.contents, 0o600).await?;
        if request.restart {
            self.systemd
                .unit_action(UnitAction::Restart, self.unit)
                .await?;
        }

        info!(component = self.component, restarted = request.restart, "shipper config updated");
        Ok(CommandResponse::ok(command.command_id))
    }
}
