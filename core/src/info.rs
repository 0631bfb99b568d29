//! Client self-description sent at Register.
//!
//! Everything except the persisted client id is recomputed at process start:
//! hostname, kernel, cloud provider, project id derived from the token.

use crate::config::Config;
use elchi_proto::{Identity, RegisterRequest};
use std::collections::HashMap;

/// Process-wide client identity, read-only after init.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub client_id: String,
    pub name: String,
    pub version: String,
    pub hostname: String,
    pub os: String,
    pub arch: String,
    pub kernel: String,
    pub project_id: String,
    pub bgp: bool,
    pub cloud: String,
    pub provider: String,
    pub metadata: HashMap<String, String>,
}

impl ClientInfo {
    /// Gather host facts. `version` is the binary's crate version.
    pub fn detect(config: &Config, client_id: String, version: &str) -> Self {
        let cloud = if config.client.cloud.is_empty() {
            "other".to_string()
        } else {
            config.client.cloud.clone()
        };

        let mut metadata = HashMap::new();
        metadata.insert("startTime".to_string(), chrono::Utc::now().to_rfc3339());

        Self {
            client_id,
            name: config.client.name.clone(),
            version: version.to_string(),
            hostname: detect_hostname(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            kernel: detect_kernel(),
            project_id: config.server.project_id(),
            bgp: config.client.bgp.unwrap_or(false),
            cloud,
            provider: detect_provider(),
            metadata,
        }
    }

    /// Identity stamped onto stream frames.
    pub fn identity(&self, session_token: &str) -> Identity {
        Identity {
            client_id: self.client_id.clone(),
            session_token: session_token.to_string(),
            client_name: self.name.clone(),
        }
    }

    /// The Register payload for this host.
    pub fn register_request(&self, token: &str) -> RegisterRequest {
        RegisterRequest {
            client_id: self.client_id.clone(),
            token: token.to_string(),
            name: self.name.clone(),
            version: self.version.clone(),
            hostname: self.hostname.clone(),
            os: self.os.clone(),
            arch: self.arch.clone(),
            kernel: self.kernel.clone(),
            project_id: self.project_id.clone(),
            bgp: self.bgp,
            cloud: self.cloud.clone(),
            provider: self.provider.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

fn detect_hostname() -> String {
    nix::unistd::gethostname()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn detect_kernel() -> String {
    std::fs::read_to_string("/proc/sys/kernel/osrelease")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Auto-detected cloud provider from DMI identifiers.
pub fn detect_provider() -> String {
    let vendor = read_dmi("sys_vendor").unwrap_or_default();
    let product = read_dmi("product_name").unwrap_or_default();
    classify_dmi(&vendor, &product).to_string()
}

fn read_dmi(name: &str) -> Option<String> {
    std::fs::read_to_string(format!("/sys/class/dmi/id/{}", name))
        .ok()
        .map(|s| s.trim().to_string())
}

fn classify_dmi(vendor: &str, product: &str) -> &'static str {
    let haystack = format!("{} {}", vendor, product).to_lowercase();
    if haystack.contains("amazon") || haystack.contains("ec2") {
        "aws"
    } else if haystack.contains("google") {
        "gcp"
    } else if haystack.contains("microsoft") {
        "azure"
    } else if haystack.contains("openstack") {
        "openstack"
    } else {
        "other"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        let mut config = Config::default();
        config.server.host = "controller".into();
        config.server.token = "tok--proj9".into();
        config.client.name = "edge-3".into();
        config.client.bgp = Some(true);
        config
    }

    #[test]
    fn test_detect_fills_identity_fields() {
        let info = ClientInfo::detect(&config(), "11111111-2222-3333-4444-555555555555".into(), "0.4.1");
        assert_eq!(info.name, "edge-3");
        assert_eq!(info.project_id, "proj9");
        assert_eq!(info.cloud, "other");
        assert!(info.bgp);
        assert!(info.metadata.contains_key("startTime"));
    }

    #[test]
    fn test_register_request_round_trip() {
        let info = ClientInfo::detect(&config(), "id-1".into(), "0.4.1");
        let req = info.register_request("tok--proj9");
        assert_eq!(req.client_id, "id-1");
        assert_eq!(req.token, "tok--proj9");
        assert_eq!(req.project_id, "proj9");
        assert!(req.bgp);
    }

    #[test]
    fn test_identity_carries_session_token() {
        let info = ClientInfo::detect(&config(), "id-2".into(), "0.4.1");
        let identity = info.identity("T1");
        assert_eq!(identity.client_id, "id-2");
        assert_eq!(identity.session_token, "T1");
        assert_eq!(identity.client_name, "edge-3");
    }

    #[test]
    fn test_classify_dmi() {
        assert_eq!(classify_dmi("Amazon EC2", "t3.micro"), "aws");
        assert_eq!(classify_dmi("Google", "Google Compute Engine"), "gcp");
        assert_eq!(classify_dmi("Microsoft Corporation", "Virtual Machine"), "azure");
        assert_eq!(classify_dmi("OpenStack Foundation", "Nova"), "openstack");
        assert_eq!(classify_dmi("Dell Inc.", "PowerEdge"), "other");
    }
}
