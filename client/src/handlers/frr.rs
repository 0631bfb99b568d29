//! FRR handler: BGP configuration through vtysh.
//!
//! Refused outright on hosts registered with `bgp: false`. Config sessions
//! go through the shared vtysh session wrapper; `show` sub-commands run a
//! read-only invocation.

use crate::reconcile::vtysh::{apply_config, VtyshRunner};
use async_trait::async_trait;
use elchi_core::command::{CommandHandler, HandlerContext};
use elchi_core::{Error, Result};
use elchi_proto::command::Payload;
use elchi_proto::command_response::Result as CommandResult;
use elchi_proto::{Command, CommandResponse, FrrConfig, FrrOutput};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tracing::info;

pub struct FrrHandler {
    vtysh: Arc<dyn VtyshRunner>,
    bgp_enabled: bool,
}

impl FrrHandler {
    pub fn new(vtysh: Arc<dyn VtyshRunner>, bgp_enabled: bool) -> Self {
        Self { vtysh, bgp_enabled }
    }

    fn validate(config: &FrrConfig) -> Result<()> {
        if config.as_number == 0 {
            return Err(Error::Validation("BGP AS number is required".into()));
        }
        if !config.router_id.is_empty() && config.router_id.parse::<Ipv4Addr>().is_err() {
            return Err(Error::Validation(format!(
                "router id '{}' is not an IPv4 address",
                config.router_id
            )));
        }
        for neighbor in &config.neighbors {
            if neighbor.address.parse::<IpAddr>().is_err() {
                return Err(Error::Validation(format!(
                    "neighbor address '{}' is not an IP address",
                    neighbor.address
                )));
            }
            if neighbor.remote_as == 0 {
                return Err(Error::Validation(format!(
                    "neighbor {} requires a remote AS",
                    neighbor.address
                )));
            }
        }
        for network in &config.networks {
            validate_cidr(network)?;
        }
        Ok(())
    }

    fn config_lines(config: &FrrConfig) -> Vec<String> {
        let mut lines = vec![format!("router bgp {}", config.as_number)];
        if !config.router_id.is_empty() {
            lines.push(format!("bgp router-id {}", config.router_id));
        }
        for neighbor in &config.neighbors {
            lines.push(format!(
                "neighbor {} remote-as {}",
                neighbor.address, neighbor.remote_as
            ));
            if !neighbor.description.is_empty() {
                lines.push(format!(
                    "neighbor {} description {}",
                    neighbor.address, neighbor.description
                ));
            }
        }
        for network in &config.networks {
            lines.push(format!("network {}", network));
        }
        lines
    }
}

#[async_trait]
impl CommandHandler for FrrHandler {
    fn name(&self) -> &'static str {
        "frr"
    }

    async fn handle(&self, _ctx: &HandlerContext, command: Command) -> Result<CommandResponse> {
        if !self.bgp_enabled {
            return Err(Error::Validation(
                "client is not BGP capable (client.bgp=false)".into(),
            ));
        }

        if command.sub_type == "show" {
            let output = self
                .vtysh
                .run(&["show ip bgp summary".to_string()])
                .await?;
            return Ok(CommandResponse::ok(command.command_id)
                .with_result(CommandResult::FrrOutput(FrrOutput { output })));
        }

        let Some(Payload::Frr(config)) = command.payload else {
            return Err(Error::Validation(
                "FRR command requires an frr payload".into(),
            ));
        };

        Self::validate(&config)?;
        let lines = Self::config_lines(&config);
        let output = apply_config(self.vtysh.as_ref(), &lines).await?;

        info!(
            as_number = config.as_number,
            neighbors = config.neighbors.len(),
            "bgp configuration applied"
        );

        Ok(CommandResponse::ok(command.command_id)
            .with_result(CommandResult::FrrOutput(FrrOutput { output })))
    }
}

fn validate_cidr(network: &str) -> Result<()> {
    let invalid = || Error::Validation(format!("'{}' is not an IPv4 CIDR", network));
    let (addr, prefix) = network.split_once('/').ok_or_else(invalid)?;
    addr.parse::<Ipv4Addr>().map_err(|_| invalid())?;
    let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
    if prefix > 32 {
        return Err(invalid());
    }
    Ok(())
}
