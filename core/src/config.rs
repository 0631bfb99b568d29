//! Configuration for the elchi client.
//!
//! Configuration is read once at start from a YAML file; any key can be
//! overridden with an `ELCHI_`-prefixed environment variable (dotted names
//! mapped, e.g. `ELCHI_SERVER_HOST` -> `server.host`).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for the elchi client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Controller endpoint configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Client identity configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Filesystem paths the handlers operate on
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Controller endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Controller DNS name or IP
    #[serde(default)]
    pub host: String,

    /// Controller port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable TLS
    #[serde(default)]
    pub tls: bool,

    /// Skip certificate validation (dev flag)
    #[serde(default)]
    pub insecure_skip_verify: bool,

    /// Shared secret; `project_id` is the suffix after `--`
    #[serde(default)]
    pub token: String,

    /// Per-RPC timeout, e.g. "30s"
    #[serde(default = "default_timeout")]
    pub timeout: String,
}

fn default_port() -> u16 {
    50051
}

fn default_timeout() -> String {
    "30s".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            tls: false,
            insecure_skip_verify: false,
            token: String::new(),
            timeout: default_timeout(),
        }
    }
}

impl ServerConfig {
    /// Parsed per-RPC timeout.
    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(&self.timeout)
    }

    /// Project id derived from the token suffix after `--`.
    pub fn project_id(&self) -> String {
        self.token
            .split_once("--")
            .map(|(_, suffix)| suffix.to_string())
            .unwrap_or_default()
    }
}

/// Client identity configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Operator-chosen label; required
    #[serde(default)]
    pub name: String,

    /// Whether this host runs FRR/BGP; required, absent is fatal
    #[serde(default)]
    pub bgp: Option<bool>,

    /// Operator-chosen cloud label; empty maps to "other"
    #[serde(default)]
    pub cloud: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `debug` / `info` / `warn` / `error`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `text` / `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Filesystem paths the handlers operate on. OS paths are conventions of the
/// installation, not contracts of the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Agent state directory (client-id file lives here)
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Netplan configuration directory
    #[serde(default = "default_netplan_dir")]
    pub netplan_dir: PathBuf,

    /// Routing-tables file symlinked into the kernel's rt_tables search path
    #[serde(default = "default_routing_tables_file")]
    pub routing_tables_file: PathBuf,

    /// Directory for managed systemd units
    #[serde(default = "default_systemd_dir")]
    pub systemd_dir: PathBuf,

    /// Agent log file served by CLIENT_LOGS
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// FRR log file served by FRR_LOGS
    #[serde(default = "default_frr_log_file")]
    pub frr_log_file: PathBuf,

    /// Envoy binary queried by ENVOY_VERSION
    #[serde(default = "default_envoy_bin")]
    pub envoy_bin: PathBuf,

    /// WAF-enabled proxy binary queried by WAF_VERSION
    #[serde(default = "default_waf_bin")]
    pub waf_bin: PathBuf,

    /// Filebeat configuration written by FILEBEAT
    #[serde(default = "default_filebeat_config")]
    pub filebeat_config: PathBuf,

    /// Rsyslog drop-in written by RSYSLOG
    #[serde(default = "default_rsyslog_config")]
    pub rsyslog_config: PathBuf,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("/var/lib/elchi-client")
}

fn default_netplan_dir() -> PathBuf {
    PathBuf::from("/etc/netplan")
}

fn default_routing_tables_file() -> PathBuf {
    PathBuf::from("/etc/iproute2/rt_tables.d/elchi.conf")
}

fn default_systemd_dir() -> PathBuf {
    PathBuf::from("/etc/systemd/system")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("/var/log/elchi/elchi-client.log")
}

fn default_frr_log_file() -> PathBuf {
    PathBuf::from("/var/log/frr/frr.log")
}

fn default_envoy_bin() -> PathBuf {
    PathBuf::from("/usr/local/bin/envoy")
}

fn default_waf_bin() -> PathBuf {
    PathBuf::from("/usr/local/bin/envoy-waf")
}

fn default_filebeat_config() -> PathBuf {
    PathBuf::from("/etc/filebeat/filebeat.yml")
}

fn default_rsyslog_config() -> PathBuf {
    PathBuf::from("/etc/rsyslog.d/60-elchi.conf")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            netplan_dir: default_netplan_dir(),
            routing_tables_file: default_routing_tables_file(),
            systemd_dir: default_systemd_dir(),
            log_file: default_log_file(),
            frr_log_file: default_frr_log_file(),
            envoy_bin: default_envoy_bin(),
            waf_bin: default_waf_bin(),
            filebeat_config: default_filebeat_config(),
            rsyslog_config: default_rsyslog_config(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            client: ClientConfig::default(),
            logging: LoggingConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file, then apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `ELCHI_*` environment overrides over the parsed file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("ELCHI_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("ELCHI_SERVER_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(tls) = std::env::var("ELCHI_SERVER_TLS") {
            if let Ok(t) = tls.parse() {
                self.server.tls = t;
            }
        }
        if let Ok(skip) = std::env::var("ELCHI_SERVER_INSECURE_SKIP_VERIFY") {
            if let Ok(s) = skip.parse() {
                self.server.insecure_skip_verify = s;
            }
        }
        if let Ok(token) = std::env::var("ELCHI_SERVER_TOKEN") {
            self.server.token = token;
        }
        if let Ok(timeout) = std::env::var("ELCHI_SERVER_TIMEOUT") {
            self.server.timeout = timeout;
        }
        if let Ok(name) = std::env::var("ELCHI_CLIENT_NAME") {
            self.client.name = name;
        }
        if let Ok(bgp) = std::env::var("ELCHI_CLIENT_BGP") {
            if let Ok(b) = bgp.parse() {
                self.client.bgp = Some(b);
            }
        }
        if let Ok(cloud) = std::env::var("ELCHI_CLIENT_CLOUD") {
            self.client.cloud = cloud;
        }
        if let Ok(level) = std::env::var("ELCHI_LOGGING_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("ELCHI_LOGGING_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(dir) = std::env::var("ELCHI_PATHS_STATE_DIR") {
            self.paths.state_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("ELCHI_PATHS_NETPLAN_DIR") {
            self.paths.netplan_dir = PathBuf::from(dir);
        }
    }

    /// Reject configurations the agent cannot run with. Called once at
    /// startup; failures here exit the process with code 1.
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(Error::Validation("server.host is required".into()));
        }
        if self.server.token.is_empty() {
            return Err(Error::Validation("server.token is required".into()));
        }
        if self.client.name.is_empty() {
            return Err(Error::Validation("client.name is required".into()));
        }
        if self.client.bgp.is_none() {
            return Err(Error::Validation(
                "client.bgp must be set to true or false".into(),
            ));
        }
        self.server.timeout().map_err(|_| {
            Error::Validation(format!("server.timeout '{}' is not a duration", self.server.timeout))
        })?;
        match self.logging.level.as_str() {
            "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(Error::Validation(format!(
                    "logging.level '{}' is not one of debug/info/warn/error",
                    other
                )));
            }
        }
        match self.logging.format.as_str() {
            "text" | "json" => {}
            other => {
                return Err(Error::Validation(format!(
                    "logging.format '{}' is not one of text/json",
                    other
                )));
            }
        }
        Ok(())
    }
}

/// Parse durations of the form "500ms", "30s", "5m" or "1h".
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let (value, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => s.split_at(idx),
        None => (s, "s"),
    };
    let value: u64 = value
        .parse()
        .map_err(|_| Error::Validation(format!("invalid duration '{}'", s)))?;
    let duration = match unit {
        "ms" => Duration::from_millis(value),
        "s" => Duration::from_secs(value),
        "m" => Duration::from_secs(value * 60),
        "h" => Duration::from_secs(value * 3600),
        _ => return Err(Error::Validation(format!("invalid duration '{}'", s))),
    };
    Ok(duration)
}
