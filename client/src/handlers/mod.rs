//! Typed command handlers.
//!
//! One module per command family; every §6 command type gets an entry in
//! the registry built here. Handlers reach the OS only through the
//! reconcile traits so tests can count and script mutations.

pub mod deploy;
pub mod frr;
pub mod logs;
pub mod network;
pub mod proxy;
pub mod service;
pub mod shipper;
pub mod stats;
pub mod versions;

use crate::reconcile::guard::ControllerProbe;
use crate::reconcile::netlink::NetlinkOps;
use crate::reconcile::netplan::NetplanApplier;
use crate::reconcile::systemd::SystemdOps;
use crate::reconcile::vtysh::VtyshRunner;
use elchi_core::command::HandlerRegistry;
use elchi_core::config::PathsConfig;
use elchi_core::{Error, Result};
use elchi_proto::CommandType;
use self::stats::StatsSource;
use std::sync::Arc;
use std::time::Duration;

/// Everything the handler set needs from the environment.
pub struct HandlerDeps {
    pub paths: PathsConfig,
    pub netlink: Arc<dyn NetlinkOps>,
    pub systemd: Arc<dyn SystemdOps>,
    pub vtysh: Arc<dyn VtyshRunner>,
    pub netplan: Arc<dyn NetplanApplier>,
    pub probe: Arc<dyn ControllerProbe>,
    pub stats: Arc<dyn StatsSource>,
    pub bgp_enabled: bool,
}

/// Build the full routing table. Every command type the controller can
/// send is registered here; anything else answers "unsupported".
pub fn build_registry(deps: HandlerDeps) -> Result<HandlerRegistry> {
    let mut registry = HandlerRegistry::new();

    registry.register(
        CommandType::Network,
        Arc::new(network::NetworkHandler::new(
            &deps.paths,
            deps.netlink.clone(),
            deps.netplan.clone(),
            deps.probe.clone(),
        )),
    );

    registry.register(
        CommandType::Service,
        Arc::new(service::ServiceHandler::new(deps.systemd.clone())),
    );

    registry.register(
        CommandType::Frr,
        Arc::new(frr::FrrHandler::new(deps.vtysh.clone(), deps.bgp_enabled)),
    );

    registry.register(
        CommandType::ClientStats,
        Arc::new(stats::StatsHandler::new(deps.stats.clone())),
    );

    registry.register(
        CommandType::ClientLogs,
        Arc::new(logs::LogsHandler::new(deps.paths.log_file.clone(), "client")),
    );
    registry.register(
        CommandType::FrrLogs,
        Arc::new(logs::LogsHandler::new(deps.paths.frr_log_file.clone(), "frr")),
    );

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| Error::Operation(format!("building http client: {}", e)))?;
    registry.register(
        CommandType::Proxy,
        Arc::new(proxy::ProxyHandler::new(http)),
    );

    registry.register(
        CommandType::EnvoyVersion,
        Arc::new(versions::VersionHandler::new(
            "envoy",
            deps.paths.envoy_bin.clone(),
        )),
    );
    registry.register(
        CommandType::WafVersion,
        Arc::new(versions::VersionHandler::new(
            "waf",
            deps.paths.waf_bin.clone(),
        )),
    );

    registry.register(
        CommandType::Deploy,
        Arc::new(deploy::DeployHandler::new(
            deps.systemd.clone(),
            &deps.paths,
        )),
    );
    registry.register(
        CommandType::Undeploy,
        Arc::new(deploy::UndeployHandler::new(
            deps.systemd.clone(),
            &deps.paths,
        )),
    );
    registry.register(
        CommandType::UpdateBootstrap,
        Arc::new(deploy::BootstrapHandler::new(
            deps.systemd.clone(),
            &deps.paths,
        )),
    );
    registry.register(
        CommandType::UpgradeListener,
        Arc::new(deploy::ListenerUpgradeHandler::new(deps.systemd.clone())),
    );

    registry.register(
        CommandType::Filebeat,
        Arc::new(shipper::ShipperHandler::filebeat(
            deps.systemd.clone(),
            &deps.paths,
        )),
    );
    registry.register(
        CommandType::Rsyslog,
        Arc::new(shipper::ShipperHandler::rsyslog(
            deps.systemd.clone(),
            &deps.paths,
        )),
    );

    Ok(registry)
}
