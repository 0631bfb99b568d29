//! Background connection monitor.
//!
//! A single task per transport polls controller reachability every 10s and
//! reconnects with exponential backoff on failure, surrendering to the
//! session manager after five attempts. The monitor is single-instance:
//! starting a replacement cancels the previous task and joins it under a
//! 5s watchdog.

pub use elchi_core::transport::{TransportEvent, TransportEvents};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Poll period for the connection check.
pub const MONITOR_INTERVAL: Duration = Duration::from_secs(10);

/// Reconnect attempts before the monitor gives up.
pub const MONITOR_MAX_RECONNECTS: u32 = 5;

/// Join deadline when replacing or stopping a monitor.
pub const MONITOR_STOP_TIMEOUT: Duration = Duration::from_secs(5);

struct MonitorHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// One-shot lifecycle object guarding the monitor task.
///
/// Replacement discipline: stop the previous task, wait for it to exit with
/// a watchdog, then start the new one. Never two monitors at once.
#[derive(Default)]
pub struct MonitorLifecycle {
    inner: Mutex<Option<MonitorHandle>>,
}

impl MonitorLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new monitor task, stopping and joining any previous one.
    pub async fn replace(&self, cancel: CancellationToken, join: JoinHandle<()>) {
        self.stop().await;
        let mut guard = self.inner.lock().await;
        *guard = Some(MonitorHandle { cancel, join });
    }

    /// Stop the current monitor, if any. Idempotent.
    pub async fn stop(&self) {
        let handle = self.inner.lock().await.take();
        if let Some(handle) = handle {
            handle.cancel.cancel();
            let abort = handle.join.abort_handle();
            if tokio::time::timeout(MONITOR_STOP_TIMEOUT, handle.join)
                .await
                .is_err()
            {
                warn!("connection monitor did not exit within watchdog, aborting");
                abort.abort();
            }
        }
    }

    /// Whether a monitor task is currently installed.
    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn spawn_idle(lifecycle: &MonitorLifecycle) -> CancellationToken {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let join = tokio::spawn(async move { token.cancelled().await });
        lifecycle.replace(cancel.clone(), join).await;
        cancel
    }

    #[tokio::test]
    async fn test_stop_cancels_and_joins() {
        let lifecycle = MonitorLifecycle::new();
        let cancel = spawn_idle(&lifecycle).await;

        assert!(lifecycle.is_running().await);
        lifecycle.stop().await;
        assert!(!lifecycle.is_running().await);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_replace_stops_previous_instance() {
        let lifecycle = MonitorLifecycle::new();
        let first = spawn_idle(&lifecycle).await;
        let second = spawn_idle(&lifecycle).await;

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        lifecycle.stop().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let lifecycle = MonitorLifecycle::new();
        spawn_idle(&lifecycle).await;
        lifecycle.stop().await;
        lifecycle.stop().await;
        assert!(!lifecycle.is_running().await);
    }

    #[tokio::test]
    async fn test_watchdog_aborts_stuck_task() {
        let lifecycle = MonitorLifecycle::new();
        let cancel = CancellationToken::new();
        // Task that ignores cancellation; the watchdog has to abort it.
        let join = tokio::spawn(async {
            loop {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        });
        lifecycle.replace(cancel, join).await;

        tokio::time::pause();
        let stop = lifecycle.stop();
        tokio::pin!(stop);
        stop.await;
        assert!(!lifecycle.is_running().await);
    }
}
