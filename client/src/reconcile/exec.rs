//! Bounded subprocess execution.
//!
//! Every OS tool the reconcilers drive (ip, systemctl, vtysh, netplan,
//! ping) is a fresh subprocess with a deadline; there are no persistent
//! shells.

use elchi_core::{Error, Result};
use std::ffi::OsStr;
use std::time::Duration;
use tokio::process::Command;

/// Run `program` with `args`, returning stdout. Non-zero exit or exceeding
/// `timeout` is an Operation error carrying the tool's stderr.
pub async fn run_command<I, S>(program: &str, args: I, timeout: Duration) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = tokio::time::timeout(timeout, Command::new(program).args(args).output())
        .await
        .map_err(|_| Error::Operation(format!("{} timed out after {:?}", program, timeout)))?
        .map_err(|e| Error::Operation(format!("spawning {}: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Operation(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
