//! Netplan document rendering and validation.
//!
//! The agent owns one unified netplan file for interface configuration.
//! Routes and routing policy are managed through dedicated files and
//! netlink, so a unified document carrying `routes:` or `routing-policy:`
//! is rejected before it touches the disk.

use async_trait::async_trait;
use elchi_core::{Error, Result};
use elchi_proto::NetworkDesiredState;
use serde_yaml::{Mapping, Value};
use std::time::Duration;

/// Unified interface file owned by the agent.
pub const NETPLAN_FILE: &str = "99-elchi-interfaces.yaml";

/// Keys that belong to the dedicated routing files, never the unified file.
const FORBIDDEN_KEYS: [&str; 2] = ["routes", "routing-policy"];

/// Applies the on-disk netplan state to the OS.
#[async_trait]
pub trait NetplanApplier: Send + Sync {
    async fn apply(&self) -> Result<()>;
}

/// Production applier: `netplan apply` as a subprocess.
pub struct NetplanCommand;

#[async_trait]
impl NetplanApplier for NetplanCommand {
    async fn apply(&self) -> Result<()> {
        crate::reconcile::exec::run_command("netplan", ["apply"], Duration::from_secs(30))
            .await
            .map(|_| ())
    }
}

/// Render the desired interface set as a netplan document.
pub fn render(state: &NetworkDesiredState) -> Result<String> {
    let mut ethernets = Mapping::new();

    for interface in &state.interfaces {
        if interface.name.is_empty() {
            return Err(Error::Validation("interface name is required".into()));
        }

        let mut entry = Mapping::new();
        entry.insert(Value::from("dhcp4"), Value::from(interface.dhcp4));

        if !interface.addresses.is_empty() {
            entry.insert(
                Value::from("addresses"),
                Value::from(
                    interface
                        .addresses
                        .iter()
                        .map(|a| Value::from(a.clone()))
                        .collect::<Vec<_>>(),
                ),
            );
        }
        if !interface.gateway4.is_empty() {
            entry.insert(Value::from("gateway4"), Value::from(interface.gateway4.clone()));
        }
        if interface.mtu > 0 {
            entry.insert(Value::from("mtu"), Value::from(interface.mtu));
        }
        if !interface.nameservers.is_empty() {
            let mut nameservers = Mapping::new();
            nameservers.insert(
                Value::from("addresses"),
                Value::from(
                    interface
                        .nameservers
                        .iter()
                        .map(|a| Value::from(a.clone()))
                        .collect::<Vec<_>>(),
                ),
            );
            entry.insert(Value::from("nameservers"), Value::Mapping(nameservers));
        }
        if interface.optional {
            entry.insert(Value::from("optional"), Value::from(true));
        }

        ethernets.insert(Value::from(interface.name.clone()), Value::Mapping(entry));
    }

    let mut network = Mapping::new();
    network.insert(Value::from("version"), Value::from(2));
    network.insert(Value::from("ethernets"), Value::Mapping(ethernets));

    let mut root = Mapping::new();
    root.insert(Value::from("network"), Value::Mapping(network));

    serde_yaml::to_string(&Value::Mapping(root)).map_err(Into::into)
}

/// Validate a unified netplan document: well-formed YAML, no routing keys.
pub fn validate(yaml: &str) -> Result<()> {
    let doc: Value = serde_yaml::from_str(yaml)
        .map_err(|e| Error::Protocol(format!("netplan yaml parse: {}", e)))?;
    reject_forbidden_keys(&doc)
}

fn reject_forbidden_keys(value: &Value) -> Result<()> {
    match value {
        Value::Mapping(mapping) => {
            for (key, child) in mapping {
                if let Value::String(name) = key {
                    if FORBIDDEN_KEYS.contains(&name.as_str()) {
                        return Err(Error::Protocol(format!(
                            "'{}' is managed through dedicated routing files, not the unified netplan file",
                            name
                        )));
                    }
                }
                reject_forbidden_keys(child)?;
            }
            Ok(())
        }
        Value::Sequence(items) => {
            for item in items {
                reject_forbidden_keys(item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elchi_proto::InterfaceConfig;

    fn desired() -> NetworkDesiredState {
        NetworkDesiredState {
            interfaces: vec![InterfaceConfig {
                name: "eth1".into(),
                dhcp4: false,
                addresses: vec!["10.1.0.5/24".into()],
                gateway4: "10.1.0.1".into(),
                mtu: 1500,
                nameservers: vec!["10.1.0.2".into()],
                optional: true,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_render_produces_valid_document() {
        let yaml = render(&desired()).unwrap();
        assert!(yaml.contains("version: 2"));
        assert!(yaml.contains("eth1"));
        assert!(yaml.contains("10.1.0.5/24"));
        assert!(validate(&yaml).is_ok());
    }

    #[test]
    fn test_render_is_deterministic() {
        assert_eq!(render(&desired()).unwrap(), render(&desired()).unwrap());
    }

    #[test]
    fn test_render_rejects_unnamed_interface() {
        let mut state = desired();
        state.interfaces[0].name.clear();
        assert!(render(&state).is_err());
    }

    #[test]
    fn test_validate_rejects_routes_key() {
        let yaml = r#"
network:
  version: 2
  ethernets:
    eth0:
      dhcp4: true
      routes:
        - to: 0.0.0.0/0
          via: 10.0.0.1
"#;
        let err = validate(yaml).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(err.to_string().contains("routes"));
    }

    #[test]
    fn test_validate_rejects_routing_policy_key() {
        let yaml = r#"
network:
  version: 2
  ethernets:
    eth0:
      routing-policy:
        - from: 10.0.0.0/24
"#;
        assert!(validate(yaml).is_err());
    }

    #[test]
    fn test_validate_rejects_malformed_yaml() {
        assert!(validate("network: [unclosed").is_err());
    }
}
