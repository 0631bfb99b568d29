//! elchi-client binary entry point.

use anyhow::Result;
use clap::Parser;
use elchi_client::cli::{Cli, CliCommand};
use elchi_client::dispatch::{CommandDispatcher, DispatcherConfig};
use elchi_client::handlers::{self, HandlerDeps};
use elchi_client::heartbeat::Heartbeat;
use elchi_client::logging;
use elchi_client::reconcile::netlink::IpRouteOps;
use elchi_client::reconcile::netplan::NetplanCommand;
use elchi_client::reconcile::probe::{self, LadderProbe};
use elchi_client::reconcile::systemd::SystemctlOps;
use elchi_client::reconcile::vtysh::VtyshProcess;
use elchi_client::session::{Session, SessionOptions, SessionState};
use elchi_core::config::Config;
use elchi_core::identity;
use elchi_core::info::ClientInfo;
use elchi_core::transport::ControllerConnector;
use elchi_grpc::{GrpcConnector, TransportConfig};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        CliCommand::Version => {
            println!("elchi-client {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliCommand::Start { config, name } => start(config, name),
    }
}

#[tokio::main]
async fn start(config_path: PathBuf, name_override: Option<String>) -> Result<()> {
    let mut config = Config::load(&config_path)?;
    if let Some(name) = name_override {
        config.client.name = name;
    }
    config.validate()?;

    logging::init(&config.logging);
    info!(version = env!("CARGO_PKG_VERSION"), "starting elchi-client");

    let client_id = identity::get_or_create_client_id(&config.paths.state_dir).await?;
    let info = Arc::new(ClientInfo::detect(
        &config,
        client_id.clone(),
        env!("CARGO_PKG_VERSION"),
    ));
    info!(
        client_id = %info.client_id,
        name = %info.name,
        provider = %info.provider,
        project_id = %info.project_id,
        "client identity ready"
    );

    let transport_config = TransportConfig::from_server_config(&config.server)?;

    // Three transports: command stream (monitored), heartbeat, and the
    // connectivity guard's probe channel.
    let (events_tx, events_rx) = mpsc::channel(8);
    let stream_connector: Arc<dyn ControllerConnector> = Arc::new(
        GrpcConnector::new(transport_config.clone(), client_id.clone()).with_events(events_tx),
    );
    let heartbeat_connector: Arc<dyn ControllerConnector> = Arc::new(GrpcConnector::new(
        transport_config.clone(),
        client_id.clone(),
    ));
    let probe_connector: Arc<dyn ControllerConnector> =
        Arc::new(GrpcConnector::new(transport_config, client_id.clone()));

    let controller_ip = probe::detect_controller_ip().await;
    let probe = Arc::new(LadderProbe::new(
        Some(probe_connector),
        controller_ip,
        client_id.clone(),
    ));

    let bgp_enabled = config.client.bgp.unwrap_or(false);
    let registry = handlers::build_registry(HandlerDeps {
        paths: config.paths.clone(),
        netlink: Arc::new(IpRouteOps),
        systemd: Arc::new(SystemctlOps),
        vtysh: Arc::new(VtyshProcess),
        netplan: Arc::new(NetplanCommand),
        probe,
        stats: Arc::new(handlers::stats::ProcStats),
        bgp_enabled,
    })?;
    info!(types = registry.len(), "command registry initialised");

    let state = Arc::new(SessionState::new());
    let dispatcher = Arc::new(CommandDispatcher::new(
        registry,
        DispatcherConfig::default(),
        state.clone(),
        info.clone(),
    ));
    let heartbeat = Arc::new(Heartbeat::new(heartbeat_connector, client_id));

    let session = Session::new(
        info,
        config.server.token.clone(),
        state,
        stream_connector,
        heartbeat,
        dispatcher,
        events_rx,
        SessionOptions::default(),
    );

    let cancel = CancellationToken::new();
    let got_signal = Arc::new(AtomicBool::new(false));
    {
        // SIGINT/SIGTERM cancel the root context; the session drains under
        // its shutdown deadline and the process exits 130.
        let cancel = cancel.clone();
        let got_signal = got_signal.clone();
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::spawn(async move {
            tokio::select! {
                _ = signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
            info!("shutdown signal received, draining");
            got_signal.store(true, Ordering::SeqCst);
            cancel.cancel();
        });
    }

    let result = session.run(cancel).await;

    if got_signal.load(Ordering::SeqCst) {
        info!("shutdown complete");
        std::process::exit(130);
    }

    result?;
    Ok(())
}
