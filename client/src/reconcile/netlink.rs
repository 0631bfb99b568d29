//! Policy-routing mutations behind a trait seam.
//!
//! The production implementation drives ip(8) as a subprocess and parses
//! its JSON output; all mutations are serialised through a module-level
//! mutex. Tables 100-999 are reserved for agent-managed state and are the
//! only ones the reconciler will touch.

use crate::reconcile::exec::run_command;
use async_trait::async_trait;
use elchi_core::{Error, Result};
use elchi_proto::{PolicyRoute, PolicyRule};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;

/// Agent-managed routing table id range.
pub const TABLE_RANGE: std::ops::RangeInclusive<u32> = 100..=999;

const IP_TIMEOUT: Duration = Duration::from_secs(5);

/// All netlink-level mutations are serialised process-wide.
static NETLINK_LOCK: Mutex<()> = Mutex::const_new(());

/// Policy-rule and route operations the network reconciler needs.
#[async_trait]
pub trait NetlinkOps: Send + Sync {
    async fn list_rules(&self) -> Result<Vec<PolicyRule>>;
    async fn add_rule(&self, rule: &PolicyRule) -> Result<()>;
    async fn del_rule(&self, rule: &PolicyRule) -> Result<()>;
    async fn list_routes(&self, table: u32) -> Result<Vec<PolicyRoute>>;
    async fn add_route(&self, route: &PolicyRoute) -> Result<()>;
    async fn del_route(&self, route: &PolicyRoute) -> Result<()>;
}

/// Production implementation over ip(8).
pub struct IpRouteOps;

#[async_trait]
impl NetlinkOps for IpRouteOps {
    async fn list_rules(&self) -> Result<Vec<PolicyRule>> {
        let _guard = NETLINK_LOCK.lock().await;
        let output = run_command("ip", ["-j", "rule", "show"], IP_TIMEOUT).await?;
        parse_rules(&output)
    }

    async fn add_rule(&self, rule: &PolicyRule) -> Result<()> {
        let _guard = NETLINK_LOCK.lock().await;
        let mut args: Vec<String> = vec!["rule".into(), "add".into()];
        if !rule.from.is_empty() && rule.from != "all" {
            args.push("from".into());
            args.push(rule.from.clone());
        }
        if !rule.to.is_empty() && rule.to != "all" {
            args.push("to".into());
            args.push(rule.to.clone());
        }
        args.push("table".into());
        args.push(rule.table.to_string());
        args.push("priority".into());
        args.push(rule.priority.to_string());
        run_command("ip", args, IP_TIMEOUT).await.map(|_| ())
    }

    async fn del_rule(&self, rule: &PolicyRule) -> Result<()> {
        let _guard = NETLINK_LOCK.lock().await;
        let mut args: Vec<String> = vec![
            "rule".into(),
            "del".into(),
            "priority".into(),
            rule.priority.to_string(),
            "table".into(),
            rule.table.to_string(),
        ];
        if !rule.from.is_empty() && rule.from != "all" {
            args.push("from".into());
            args.push(rule.from.clone());
        }
        run_command("ip", args, IP_TIMEOUT).await.map(|_| ())
    }

    async fn list_routes(&self, table: u32) -> Result<Vec<PolicyRoute>> {
        let _guard = NETLINK_LOCK.lock().await;
        let output = run_command(
            "ip",
            ["-j", "route", "show", "table", &table.to_string()],
            IP_TIMEOUT,
        )
        .await?;
        parse_routes(&output, table)
    }

    async fn add_route(&self, route: &PolicyRoute) -> Result<()> {
        let _guard = NETLINK_LOCK.lock().await;
        let mut args: Vec<String> = vec!["route".into(), "add".into(), route.to.clone()];
        if !route.via.is_empty() {
            args.push("via".into());
            args.push(route.via.clone());
        }
        if !route.interface.is_empty() {
            args.push("dev".into());
            args.push(route.interface.clone());
        }
        args.push("table".into());
        args.push(route.table.to_string());
        run_command("ip", args, IP_TIMEOUT).await.map(|_| ())
    }

    async fn del_route(&self, route: &PolicyRoute) -> Result<()> {
        let _guard = NETLINK_LOCK.lock().await;
        let args: Vec<String> = vec![
            "route".into(),
            "del".into(),
            route.to.clone(),
            "table".into(),
            route.table.to_string(),
        ];
        run_command("ip", args, IP_TIMEOUT).await.map(|_| ())
    }
}

/// Parse `ip -j rule show`, keeping only rules in the agent table range.
pub fn parse_rules(json: &str) -> Result<Vec<PolicyRule>> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| Error::Operation(format!("parsing ip rule output: {}", e)))?;

    let mut rules = Vec::new();
    for entry in value.as_array().into_iter().flatten() {
        let Some(table) = numeric_table(entry.get("table")) else {
            continue;
        };
        if !TABLE_RANGE.contains(&table) {
            continue;
        }
        rules.push(PolicyRule {
            table,
            from: string_field(entry.get("src")),
            to: string_field(entry.get("dst")),
            priority: entry
                .get("priority")
                .and_then(Value::as_u64)
                .unwrap_or_default() as u32,
        });
    }
    Ok(rules)
}

/// Parse `ip -j route show table N`.
pub fn parse_routes(json: &str, table: u32) -> Result<Vec<PolicyRoute>> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| Error::Operation(format!("parsing ip route output: {}", e)))?;

    let mut routes = Vec::new();
    for entry in value.as_array().into_iter().flatten() {
        let to = string_field(entry.get("dst"));
        if to.is_empty() {
            continue;
        }
        routes.push(PolicyRoute {
            table,
            to,
            via: string_field(entry.get("gateway")),
            interface: string_field(entry.get("dev")),
        });
    }
    Ok(routes)
}

/// `table` in ip JSON is a number, a numeric string, or a name; only
/// numeric values can be agent tables.
fn numeric_table(value: Option<&Value>) -> Option<u32> {
    match value? {
        Value::Number(n) => n.as_u64().map(|v| v as u32),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn string_field(value: Option<&Value>) -> String {
    match value.and_then(Value::as_str) {
        Some("all") | None => String::new(),
        Some(s) => s.to_string(),
    }
}
