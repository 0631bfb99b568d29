//! Heartbeat service.
//!
//! Runs on its own transport instance so ping liveness is not masked by
//! command-stream stalls. A "client is not registered" answer (or a run of
//! hard ping failures) fires the re-register callback installed by the
//! session; the heartbeat never touches the session any other way.

use elchi_core::transport::{ControllerChannel, ControllerConnector};
use elchi_core::Result;
use elchi_proto::PingRequest;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default ping period.
pub const PING_PERIOD: Duration = Duration::from_secs(15);

/// Hard ping failures tolerated before forcing a re-register.
pub const MAX_PING_FAILURES: u32 = 5;

/// Per-ping deadline.
const PING_TIMEOUT: Duration = Duration::from_secs(5);

type ReRegisterCallback = Arc<dyn Fn() + Send + Sync>;

struct HeartbeatHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
    transport: Arc<dyn ControllerChannel>,
}

/// Periodic liveness pinger over a dedicated transport.
pub struct Heartbeat {
    connector: Arc<dyn ControllerConnector>,
    client_id: String,
    period: Duration,
    handle: Mutex<Option<HeartbeatHandle>>,
    last_ok: Arc<RwLock<Option<Instant>>>,
}

impl Heartbeat {
    pub fn new(connector: Arc<dyn ControllerConnector>, client_id: impl Into<String>) -> Self {
        Self {
            connector,
            client_id: client_id.into(),
            period: PING_PERIOD,
            handle: Mutex::new(None),
            last_ok: Arc::new(RwLock::new(None)),
        }
    }

    /// Override the ping period (tests).
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Open the dedicated transport and start pinging. Stops any previous
    /// instance first, so every Register gets a clean heartbeat.
    pub async fn start(&self, on_unregistered: ReRegisterCallback) -> Result<()> {
        self.stop().await;

        let transport = self.connector.connect().await?;
        let cancel = CancellationToken::new();

        let join = tokio::spawn(ping_loop(
            transport.clone(),
            self.client_id.clone(),
            self.period,
            cancel.clone(),
            self.last_ok.clone(),
            on_unregistered,
        ));

        let mut guard = self.handle.lock().await;
        *guard = Some(HeartbeatHandle {
            cancel,
            join,
            transport,
        });
        Ok(())
    }

    /// Stop pinging and close the dedicated transport. Idempotent.
    pub async fn stop(&self) {
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            handle.cancel.cancel();
            let abort = handle.join.abort_handle();
            if tokio::time::timeout(Duration::from_secs(2), handle.join)
                .await
                .is_err()
            {
                abort.abort();
            }
            handle.transport.close().await;
        }
    }

    /// Whether the ping loop is currently running.
    pub async fn is_running(&self) -> bool {
        self.handle.lock().await.is_some()
    }

    /// Instant of the last successful ping.
    pub fn last_ok(&self) -> Option<Instant> {
        *self.last_ok.read()
    }
}

async fn ping_loop(
    transport: Arc<dyn ControllerChannel>,
    client_id: String,
    period: Duration,
    cancel: CancellationToken,
    last_ok: Arc<RwLock<Option<Instant>>>,
    on_unregistered: ReRegisterCallback,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut failures = 0u32;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let request = PingRequest {
            timestamp: chrono::Utc::now().timestamp_millis(),
            client_id: client_id.clone(),
        };

        let outcome = tokio::time::timeout(PING_TIMEOUT, transport.ping(request)).await;
        match outcome {
            Ok(Ok(response)) => {
                if response.success && response.registered {
                    failures = 0;
                    *last_ok.write() = Some(Instant::now());
                    continue;
                }
                if !response.registered
                    || response.error.to_lowercase().contains("not registered")
                {
                    warn!("controller reports client not registered, requesting re-register");
                    on_unregistered();
                    return;
                }
                failures += 1;
                debug!(error = %response.error, failures, "ping rejected");
            }
            Ok(Err(e)) => {
                failures += 1;
                debug!(error = %e, failures, "ping failed");
            }
            Err(_) => {
                failures += 1;
                debug!(failures, "ping timed out");
            }
        }

        if failures >= MAX_PING_FAILURES {
            warn!(failures, "heartbeat lost the controller, requesting re-register");
            on_unregistered();
            return;
        }
    }
}
