//! ENVOY_VERSION / WAF_VERSION handler.

use crate::reconcile::exec::run_command;
use async_trait::async_trait;
use elchi_core::command::{CommandHandler, HandlerContext};
use elchi_core::{Error, Result};
use elchi_proto::command_response::Result as CommandResult;
use elchi_proto::{Command, CommandResponse, VersionInfo};
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

pub struct VersionHandler {
    component: &'static str,
    binary: PathBuf,
}

impl VersionHandler {
    pub fn new(component: &'static str, binary: PathBuf) -> Self {
        Self { component, binary }
    }
}

#[async_trait]
impl CommandHandler for VersionHandler {
    fn name(&self) -> &'static str {
        self.component
    }

    async fn handle(&self, _ctx: &HandlerContext, command: Command) -> Result<CommandResponse> {
        let output = run_command(
            &self.binary.to_string_lossy(),
            ["--version"],
            Duration::from_secs(5),
        )
        .await?;

        let version = parse_version(&output).ok_or_else(|| {
            Error::Operation(format!(
                "no version found in {} output",
                self.binary.display()
            ))
        })?;

        Ok(
            CommandResponse::ok(command.command_id).with_result(CommandResult::VersionInfo(
                VersionInfo {
                    component: self.component.to_string(),
                    version,
                },
            )),
        )
    }
}

/// First semver-looking token in tool output.
pub fn parse_version(output: &str) -> Option<String> {
    static VERSION_RE: OnceLock<Regex> = OnceLock::new();
    let re = VERSION_RE.get_or_init(|| {
        Regex::new(r"\d+\.\d+\.\d+(-[0-9A-Za-z.]+)?").expect("version regex is valid")
    });
    re.find(output).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_envoy_version_line() {
        let output =
            "envoy  version: 816188b86a0a52095b116b107f576324082c7c02/1.30.1/Clean/RELEASE/BoringSSL\n";
        assert_eq!(parse_version(output).unwrap(), "1.30.1");
    }

    #[test]
    fn test_parse_plain_version() {
        assert_eq!(parse_version("frr 8.4.2\n").unwrap(), "8.4.2");
        assert_eq!(parse_version("v2.0.0-rc.1").unwrap(), "2.0.0-rc.1");
    }

    #[test]
    fn test_no_version_token() {
        assert!(parse_version("command not found").is_none());
    }
}
