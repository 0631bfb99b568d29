//! systemd unit control behind a trait seam.
//!
//! The production implementation drives systemctl as a subprocess with a
//! deadline. Unit names are validated before they reach a command line.

use crate::reconcile::exec::run_command;
use async_trait::async_trait;
use elchi_core::{Error, Result};
use elchi_proto::ServiceStatus;
use std::time::Duration;

const SYSTEMCTL_TIMEOUT: Duration = Duration::from_secs(30);

/// Actions the SERVICE handler accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitAction {
    Start,
    Stop,
    Restart,
    Reload,
    ReloadOrRestart,
    Enable,
    Disable,
}

impl UnitAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            "restart" => Some(Self::Restart),
            "reload" => Some(Self::Reload),
            "reload-or-restart" => Some(Self::ReloadOrRestart),
            "enable" => Some(Self::Enable),
            "disable" => Some(Self::Disable),
            _ => None,
        }
    }

    pub fn as_arg(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Reload => "reload",
            Self::ReloadOrRestart => "reload-or-restart",
            Self::Enable => "enable",
            Self::Disable => "disable",
        }
    }
}

/// systemd operations the handlers need.
#[async_trait]
pub trait SystemdOps: Send + Sync {
    async fn unit_action(&self, action: UnitAction, unit: &str) -> Result<()>;
    async fn daemon_reload(&self) -> Result<()>;
    async fn status(&self, unit: &str) -> Result<ServiceStatus>;
}

/// Production implementation over systemctl.
pub struct SystemctlOps;

#[async_trait]
impl SystemdOps for SystemctlOps {
    async fn unit_action(&self, action: UnitAction, unit: &str) -> Result<()> {
        validate_unit_name(unit)?;
        run_command("systemctl", [action.as_arg(), unit], SYSTEMCTL_TIMEOUT)
            .await
            .map(|_| ())
    }

    async fn daemon_reload(&self) -> Result<()> {
        run_command("systemctl", ["daemon-reload"], SYSTEMCTL_TIMEOUT)
            .await
            .map(|_| ())
    }

    async fn status(&self, unit: &str) -> Result<ServiceStatus> {
        validate_unit_name(unit)?;
        let output = run_command(
            "systemctl",
            [
                "show",
                unit,
                "--property=ActiveState,SubState,UnitFileState",
                "--no-pager",
            ],
            SYSTEMCTL_TIMEOUT,
        )
        .await?;
        Ok(parse_show_output(unit, &output))
    }
}

/// Reject names that could smuggle arguments or paths into systemctl.
pub fn validate_unit_name(unit: &str) -> Result<()> {
    let valid = !unit.is_empty()
        && unit.len() <= 255
        && unit
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));
    if valid {
        Ok(())
    } else {
        Err(Error::Validation(format!("invalid unit name '{}'", unit)))
    }
}

/// Parse `systemctl show` KEY=VALUE output.
pub fn parse_show_output(unit: &str, output: &str) -> ServiceStatus {
    let mut status = ServiceStatus {
        name: unit.to_string(),
        ..Default::default()
    };

    for line in output.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key {
            "ActiveState" => status.active_state = value.to_string(),
            "SubState" => status.sub_state = value.to_string(),
            "UnitFileState" => status.enabled = value == "enabled",
            _ => {}
        }
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parse_round_trip() {
        for action in ["start", "stop", "restart", "reload", "enable", "disable"] {
            assert_eq!(UnitAction::parse(action).unwrap().as_arg(), action);
        }
        assert!(UnitAction::parse("explode").is_none());
    }

    #[test]
    fn test_unit_name_validation() {
        assert!(validate_unit_name("envoy-edge.service").is_ok());
        assert!(validate_unit_name("frr").is_ok());
        assert!(validate_unit_name("proxy@1.service").is_ok());
        assert!(validate_unit_name("").is_err());
        assert!(validate_unit_name("unit name").is_err());
        assert!(validate_unit_name("../etc/passwd").is_err());
        assert!(validate_unit_name("unit;rm").is_err());
    }

    #[test]
    fn test_parse_show_output() {
        let output = "ActiveState=active\nSubState=running\nUnitFileState=enabled\n";
        let status = parse_show_output("envoy.service", output);
        assert_eq!(status.name, "envoy.service");
        assert_eq!(status.active_state, "active");
        assert_eq!(status.sub_state, "running");
        assert!(status.enabled);
    }

    #[test]
    fn test_parse_show_output_inactive() {
        let output = "ActiveState=inactive\nSubState=dead\nUnitFileState=disabled\n";
        let status = parse_show_output("frr.service", output);
        assert_eq!(status.active_state, "inactive");
        assert!(!status.enabled);
    }
}
