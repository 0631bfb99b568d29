//! FRR control through vtysh subprocesses.
//!
//! Every configuration session is `configure terminal ... end` followed by
//! `write memory`, run as one fresh vtysh invocation with a 10s deadline.
//! No persistent vty session is kept across commands. vtysh reports many
//! errors on stdout with exit status 0, so output is scanned for its error
//! markers regardless of status.

use crate::reconcile::exec::run_command;
use async_trait::async_trait;
use elchi_core::{Error, Result};
use std::time::Duration;

/// Per-invocation deadline.
pub const VTYSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Error markers vtysh prints with exit status 0.
pub const VTYSH_ERROR_MARKERS: [&str; 5] = [
    "% Invalid",
    "% Unknown",
    "% No such",
    "% Incomplete",
    "% Error",
];

/// vtysh invocation seam.
#[async_trait]
pub trait VtyshRunner: Send + Sync {
    /// Run one vtysh session executing `commands` in order.
    async fn run(&self, commands: &[String]) -> Result<String>;
}

/// Production runner: `vtysh -c cmd1 -c cmd2 ...` as a subprocess.
pub struct VtyshProcess;

#[async_trait]
impl VtyshRunner for VtyshProcess {
    async fn run(&self, commands: &[String]) -> Result<String> {
        let mut args: Vec<String> = Vec::with_capacity(commands.len() * 2);
        for command in commands {
            args.push("-c".into());
            args.push(command.clone());
        }
        run_command("vtysh", args, VTYSH_TIMEOUT).await
    }
}

/// Wrap configuration lines in a full config session.
pub fn config_session(lines: &[String]) -> Vec<String> {
    let mut commands = Vec::with_capacity(lines.len() + 3);
    commands.push("configure terminal".to_string());
    commands.extend_from_slice(lines);
    commands.push("end".to_string());
    commands.push("write memory".to_string());
    commands
}

/// Reject output carrying any vtysh error marker.
pub fn scan_output(output: &str) -> Result<()> {
    for marker in VTYSH_ERROR_MARKERS {
        if output.contains(marker) {
            let line = output
                .lines()
                .find(|line| line.contains(marker))
                .unwrap_or(marker);
            return Err(Error::Protocol(format!("vtysh rejected input: {}", line.trim())));
        }
    }
    Ok(())
}

/// Run a config session and scan the output.
pub async fn apply_config(runner: &dyn VtyshRunner, lines: &[String]) -> Result<String> {
    let commands = config_session(lines);
    let output = runner.run(&commands).await?;
    scan_output(&output)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_session_shape() {
        let lines = vec!["router bgp 65001".to_string()];
        let commands = config_session(&lines);
        assert_eq!(commands.first().unwrap(), "configure terminal");
        assert_eq!(commands[1], "router bgp 65001");
        assert_eq!(commands[commands.len() - 2], "end");
        assert_eq!(commands.last().unwrap(), "write memory");
    }

    #[test]
    fn test_scan_detects_markers_despite_exit_zero() {
        for marker in VTYSH_ERROR_MARKERS {
            let output = format!("building config\n{} command at '^'\n", marker);
            let err = scan_output(&output).unwrap_err();
            assert!(matches!(err, Error::Protocol(_)));
        }
    }

    #[test]
    fn test_scan_accepts_clean_output() {
        assert!(scan_output("Building Configuration...\n[OK]\n").is_ok());
    }

    #[tokio::test]
    async fn test_apply_config_propagates_marker_as_protocol_error() {
        struct BadRunner;

        #[async_trait]
        impl VtyshRunner for BadRunner {
            async fn run(&self, _commands: &[String]) -> Result<String> {
                Ok("% Unknown command: router bpg 65001\n".to_string())
            }
        }

        let err = apply_config(&BadRunner, &["router bpg 65001".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
