//! Managed-proxy lifecycle handlers: DEPLOY, UNDEPLOY, UPDATE_BOOTSTRAP,
//! UPGRADE_LISTENER.
//!
//! A deployment is a systemd unit plus a bootstrap file under the agent's
//! state directory. All mutations observe before writing, so re-deploying
//! the same payload is a no-op.

use crate::reconcile::files;
use crate::reconcile::systemd::{SystemdOps, UnitAction};
use async_trait::async_trait;
use elchi_core::command::{CommandHandler, HandlerContext};
use elchi_core::config::PathsConfig;
use elchi_core::{Error, Result};
use elchi_proto::command::Payload;
use elchi_proto::command_response::Result as CommandResult;
use elchi_proto::{Command, CommandResponse};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Longest listener drain honoured before the restart.
const MAX_DRAIN: Duration = Duration::from_secs(30);

fn unit_name(deployment: &str) -> String {
    format!("elchi-{}.service", deployment)
}

fn validate_deployment_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));
    if valid {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "invalid deployment name '{}'",
            name
        )))
    }
}

fn bootstrap_path(state_dir: &Path, deployment: &str) -> PathBuf {
    state_dir.join("bootstrap").join(format!("{}.yaml", deployment))
}

/// Write `contents` only when they differ from the file. Returns whether a
/// write happened.
async fn write_if_changed(path: &Path, contents: &str, mode: u32) -> Result<bool> {
    if files::read_if_exists(path).await?.as_deref() == Some(contents) {
        return Ok(false);
    }
    files::write_atomic(path, contents, mode).await?;
    Ok(true)
}

pub struct DeployHandler {
    systemd: Arc<dyn SystemdOps>,
    systemd_dir: PathBuf,
    state_dir: PathBuf,
}

impl DeployHandler {
    pub fn new(systemd: Arc<dyn SystemdOps>, paths: &PathsConfig) -> Self {
        Self {
            systemd,
            systemd_dir: paths.systemd_dir.clone(),
            state_dir: paths.state_dir.clone(),
        }
    }
}

#[async_trait]
impl CommandHandler for DeployHandler {
    fn name(&self) -> &'static str {
        "deploy"
    }

    async fn handle(&self, _ctx: &HandlerContext, command: Command) -> Result<CommandResponse> {
        let Some(Payload::Deploy(request)) = command.payload else {
            return Err(Error::Validation(
                "DEPLOY command requires a deploy payload".into(),
            ));
        };

        validate_deployment_name(&request.name)?;
        if request.unit_contents.is_empty() {
            return Err(Error::Validation("unit contents are required".into()));
        }

        let unit = unit_name(&request.name);
        let unit_path = self.systemd_dir.join(&unit);

        let mut changed = write_if_changed(&unit_path, &request.unit_contents, 0o644).await?;
        if changed {
            self.systemd.daemon_reload().await?;
        }

        if !request.bootstrap_contents.is_empty() {
            let path = bootstrap_path(&self.state_dir, &request.name);
            changed |= write_if_changed(&path, &request.bootstrap_contents, 0o600).await?;
        }

        let status = self.systemd.status(&unit).await?;
        if !status.enabled {
            self.systemd.unit_action(UnitAction::Enable, &unit).await?;
        }
        if status.active_state != "active" {
            self.systemd.unit_action(UnitAction::Start, &unit).await?;
        } else if changed {
            self.systemd.unit_action(UnitAction::Restart, &unit).await?;
        }

        info!(
            deployment = %request.name,
            version = %request.version,
            changed,
            "deployment converged"
        );

        let status = self.systemd.status(&unit).await?;
        Ok(CommandResponse::ok(command.command_id)
            .with_result(CommandResult::ServiceStatus(status)))
    }
}

pub struct UndeployHandler {
    systemd: Arc<dyn SystemdOps>,
    systemd_dir: PathBuf,
    state_dir: PathBuf,
}

impl UndeployHandler {
    pub fn new(systemd: Arc<dyn SystemdOps>, paths: &PathsConfig) -> Self {
        Self {
            systemd,
            systemd_dir: paths.systemd_dir.clone(),
            state_dir: paths.state_dir.clone(),
        }
    }
}

#[async_trait]
impl CommandHandler for UndeployHandler {
    fn name(&self) -> &'static str {
        "undeploy"
    }

    async fn handle(&self, _ctx: &HandlerContext, command: Command) -> Result<CommandResponse> {
        let Some(Payload::Undeploy(request)) = command.payload else {
            return Err(Error::Validation(
                "UNDEPLOY command requires an undeploy payload".into(),
            ));
        };

        validate_deployment_name(&request.name)?;

        let unit = unit_name(&request.name);
        let unit_path = self.systemd_dir.join(&unit);

        // Already gone: undeploy is idempotent.
        if files::read_if_exists(&unit_path).await?.is_none() {
            return Ok(CommandResponse::ok(command.command_id));
        }

        if let Err(e) = self.systemd.unit_action(UnitAction::Stop, &unit).await {
            warn!(unit = %unit, error = %e, "stop during undeploy failed");
        }
        if let Err(e) = self.systemd.unit_action(UnitAction::Disable, &unit).await {
            warn!(unit = %unit, error = %e, "disable during undeploy failed");
        }

        tokio::fs::remove_file(&unit_path).await?;
        self.systemd.daemon_reload().await?;

        let bootstrap = bootstrap_path(&self.state_dir, &request.name);
        match tokio::fs::remove_file(&bootstrap).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        info!(deployment = %request.name, "deployment removed");
        Ok(CommandResponse::ok(command.command_id))
    }
}

pub struct BootstrapHandler {
    systemd: Arc<dyn SystemdOps>,
    state_dir: PathBuf,
}

impl BootstrapHandler {
    pub fn new(systemd: Arc<dyn SystemdOps>, paths: &PathsConfig) -> Self {
        Self {
            systemd,
            state_dir: paths.state_dir.clone(),
        }
    }
}

#[async_trait]
impl CommandHandler for BootstrapHandler {
    fn name(&self) -> &'static str {
        "update_bootstrap"
    }

    async fn handle(&self, _ctx: &HandlerContext, command: Command) -> Result<CommandResponse> {
        let Some(Payload::Bootstrap(request)) = command.payload else {
            return Err(Error::Validation(
                "UPDATE_BOOTSTRAP command requires a bootstrap payload".into(),
            ));
        };

        validate_deployment_name(&request.name)?;
        if request.contents.is_empty() {
            return Err(Error::Validation("bootstrap contents are required".into()));
        }

        let path = bootstrap_path(&self.state_dir, &request.name);
        let changed = write_if_changed(&path, &request.contents, 0o600).await?;
        if changed {
            self.systemd
                .unit_action(UnitAction::ReloadOrRestart, &unit_name(&request.name))
                .await?;
            info!(deployment = %request.name, "bootstrap updated");
        }

        Ok(CommandResponse::ok(command.command_id))
    }
}

pub struct ListenerUpgradeHandler {
    systemd: Arc<dyn SystemdOps>,
}

impl ListenerUpgradeHandler {
    pub fn new(systemd: Arc<dyn SystemdOps>) -> Self {
        Self { systemd }
    }
}

#[async_trait]
impl CommandHandler for ListenerUpgradeHandler {
    fn name(&self) -> &'static str {
        "upgrade_listener"
    }

    async fn handle(&self, ctx: &HandlerContext, command: Command) -> Result<CommandResponse> {
        let Some(Payload::Listener(request)) = command.payload else {
            return Err(Error::Validation(
                "UPGRADE_LISTENER command requires a listener payload".into(),
            ));
        };

        validate_deployment_name(&request.name)?;

        let drain = Duration::from_secs(u64::from(request.drain_seconds)).min(MAX_DRAIN);
        if !drain.is_zero() {
            tokio::select! {
                _ = ctx.cancel.cancelled() => {
                    return Err(Error::Operation("cancelled during listener drain".into()));
                }
                _ = tokio::time::sleep(drain) => {}
            }
        }

        let unit = unit_name(&request.name);
        self.systemd
            .unit_action(UnitAction::ReloadOrRestart, &unit)
            .await?;

        info!(deployment = %request.name, drain = ?drain, "listener upgraded");
        Ok(CommandResponse::ok(command.command_id))
    }
}
