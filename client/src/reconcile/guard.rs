//! Connectivity-preserving apply.
//!
//! Protocol for any mutation that can sever the controller link: snapshot,
//! atomic write, apply in the background while a monitor probes controller
//! reachability, and roll back unless the apply finishes with connectivity
//! provably intact. Two consecutive good probes declare "connected"; five
//! consecutive misses declare "lost"; an indecisive timeout rolls back.

use crate::reconcile::files;
use crate::reconcile::netplan::NetplanApplier;
use async_trait::async_trait;
use elchi_core::{Error, Result};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Guard timing and decision thresholds.
#[derive(Debug, Clone, Copy)]
pub struct GuardConfig {
    /// Overall budget for apply + verdict.
    pub timeout: Duration,
    /// Settle time before the first probe.
    pub grace: Duration,
    /// Probe cadence after the grace period.
    pub cadence: Duration,
    /// Consecutive successes declaring "connected".
    pub ok_threshold: u32,
    /// Consecutive failures declaring "lost".
    pub lost_threshold: u32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            grace: Duration::from_secs(3),
            cadence: Duration::from_millis(500),
            ok_threshold: 2,
            lost_threshold: 5,
        }
    }
}

/// Controller reachability check used by the guard.
#[async_trait]
pub trait ControllerProbe: Send + Sync {
    /// One probe attempt; true when the controller answered.
    async fn probe(&self) -> bool;
}

enum Verdict {
    Connected,
    Lost,
}

/// Write `desired` to `file` and apply it, rolling back unless the
/// controller stays reachable. The returned error always mentions the
/// rollback so the controller sees what happened.
pub async fn apply_with_guard(
    file: &Path,
    desired: &str,
    applier: &dyn NetplanApplier,
    probe: &dyn ControllerProbe,
    config: &GuardConfig,
) -> Result<()> {
    let backup = files::snapshot(file).await?;
    files::write_atomic(file, desired, 0o600).await?;

    let apply_fut = applier.apply();
    tokio::pin!(apply_fut);
    let watch_fut = watch_connectivity(probe, config);
    tokio::pin!(watch_fut);
    let deadline = tokio::time::sleep(config.timeout);
    tokio::pin!(deadline);

    let mut apply_done = false;

    let failure: Option<String> = loop {
        tokio::select! {
            result = &mut apply_fut, if !apply_done => {
                match result {
                    Ok(()) => apply_done = true,
                    Err(e) => break Some(format!("apply failed: {}", e)),
                }
            }
            verdict = &mut watch_fut => {
                match verdict {
                    Verdict::Lost => break Some("controller connectivity lost after apply".into()),
                    Verdict::Connected if apply_done => break None,
                    Verdict::Connected => {
                        // Connectivity held; all that remains is the apply
                        // itself, still bounded by the overall deadline.
                        tokio::select! {
                            result = &mut apply_fut => match result {
                                Ok(()) => break None,
                                Err(e) => break Some(format!("apply failed: {}", e)),
                            },
                            _ = &mut deadline => break Some("apply did not finish before timeout".into()),
                        }
                    }
                }
            }
            _ = &mut deadline => break Some("no connectivity verdict before timeout".into()),
        }
    };

    match failure {
        None => {
            info!(file = %file.display(), "guarded apply kept");
            Ok(())
        }
        Some(reason) => {
            warn!(file = %file.display(), reason = %reason, "guarded apply rolling back");
            rollback(file, backup.as_deref(), applier).await;
            Err(Error::Operation(format!("{}, rolled back", reason)))
        }
    }
}

/// Restore the snapshot and re-apply it. Best effort: the original file
/// contents always come back even if the re-apply fails.
async fn rollback(file: &Path, backup: Option<&Path>, applier: &dyn NetplanApplier) {
    if let Err(e) = files::restore(file, backup).await {
        warn!(file = %file.display(), error = %e, "restoring backup failed");
        return;
    }
    if let Err(e) = applier.apply().await {
        warn!(file = %file.display(), error = %e, "re-applying backup failed");
    }
}

async fn watch_connectivity(probe: &dyn ControllerProbe, config: &GuardConfig) -> Verdict {
    tokio::time::sleep(config.grace).await;

    let mut ok = 0u32;
    let mut lost = 0u32;

    loop {
        if probe.probe().await {
            ok += 1;
            lost = 0;
            if ok >= config.ok_threshold {
                return Verdict::Connected;
            }
        } else {
            lost += 1;
            ok = 0;
            if lost >= config.lost_threshold {
                return Verdict::Lost;
            }
        }
        tokio::time::sleep(config.cadence).await;
    }
}
