//! NETWORK reconciler.
//!
//! Converges host networking to the desired state: the unified netplan
//! interface file (through the connectivity-preserving guard), the
//! agent-owned routing-tables file, and policy rules/routes in tables
//! 100-999 through the netlink seam. Observe before mutate throughout:
//! equal desired and current state performs no write.

use crate::reconcile::files;
use crate::reconcile::guard::{apply_with_guard, ControllerProbe, GuardConfig};
use crate::reconcile::netlink::{NetlinkOps, TABLE_RANGE};
use crate::reconcile::netplan::{self, NetplanApplier, NETPLAN_FILE};
use async_trait::async_trait;
use elchi_core::command::{CommandHandler, HandlerContext};
use elchi_core::config::PathsConfig;
use elchi_core::{Error, Result};
use elchi_proto::command::Payload;
use elchi_proto::command_response::Result as CommandResult;
use elchi_proto::{
    Command, CommandResponse, NetworkDesiredState, NetworkState, PolicyRoute, PolicyRule,
    RoutingTable,
};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct NetworkHandler {
    netplan_file: PathBuf,
    routing_tables_file: PathBuf,
    netlink: Arc<dyn NetlinkOps>,
    applier: Arc<dyn NetplanApplier>,
    probe: Arc<dyn ControllerProbe>,
    guard: GuardConfig,
}

impl NetworkHandler {
    pub fn new(
        paths: &PathsConfig,
        netlink: Arc<dyn NetlinkOps>,
        applier: Arc<dyn NetplanApplier>,
        probe: Arc<dyn ControllerProbe>,
    ) -> Self {
        Self {
            netplan_file: paths.netplan_dir.join(NETPLAN_FILE),
            routing_tables_file: paths.routing_tables_file.clone(),
            netlink,
            applier,
            probe,
            guard: GuardConfig::default(),
        }
    }

    /// Override guard timings (tests).
    pub fn with_guard_config(mut self, guard: GuardConfig) -> Self {
        self.guard = guard;
        self
    }

    fn validate(state: &NetworkDesiredState) -> Result<()> {
        for table in &state.tables {
            if !TABLE_RANGE.contains(&table.id) {
                return Err(Error::Validation(format!(
                    "routing table id {} outside the agent-managed range 100-999",
                    table.id
                )));
            }
            if table.name.is_empty()
                || !table
                    .name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
            {
                return Err(Error::Validation(format!(
                    "invalid routing table name '{}'",
                    table.name
                )));
            }
        }
        for rule in &state.rules {
            if !TABLE_RANGE.contains(&rule.table) {
                return Err(Error::Validation(format!(
                    "policy rule targets table {} outside the agent-managed range",
                    rule.table
                )));
            }
        }
        for route in &state.routes {
            if !TABLE_RANGE.contains(&route.table) {
                return Err(Error::Validation(format!(
                    "policy route targets table {} outside the agent-managed range",
                    route.table
                )));
            }
        }
        Ok(())
    }

    async fn reconcile_interfaces(&self, state: &NetworkDesiredState) -> Result<bool> {
        if state.interfaces.is_empty() {
            return Ok(false);
        }

        let desired = netplan::render(state)?;
        netplan::validate(&desired)?;

        let current = files::read_if_exists(&self.netplan_file).await?;
        if current.as_deref() == Some(desired.as_str()) {
            return Ok(false);
        }

        let guard = GuardConfig {
            timeout: if state.apply_timeout_seconds > 0 {
                Duration::from_secs(u64::from(state.apply_timeout_seconds))
            } else {
                self.guard.timeout
            },
            ..self.guard
        };

        apply_with_guard(
            &self.netplan_file,
            &desired,
            self.applier.as_ref(),
            self.probe.as_ref(),
            &guard,
        )
        .await?;
        Ok(true)
    }

    async fn reconcile_tables_file(&self, tables: &[RoutingTable]) -> Result<bool> {
        let desired = render_tables(tables);
        let current = files::read_if_exists(&self.routing_tables_file).await?;

        if current.is_none() && desired.is_empty() {
            return Ok(false);
        }
        if current.as_deref() == Some(desired.as_str()) {
            return Ok(false);
        }

        files::write_atomic(&self.routing_tables_file, &desired, 0o644).await?;
        Ok(true)
    }

    async fn reconcile_rules(&self, desired: &[PolicyRule]) -> Result<bool> {
        let current = self.netlink.list_rules().await?;
        let mut changed = false;

        for rule in desired {
            if !current.iter().any(|c| rule_eq(c, rule)) {
                self.netlink.add_rule(rule).await?;
                changed = true;
            }
        }
        for rule in &current {
            if !desired.iter().any(|d| rule_eq(d, rule)) {
                self.netlink.del_rule(rule).await?;
                changed = true;
            }
        }
        Ok(changed)
    }

    async fn reconcile_routes(&self, state: &NetworkDesiredState) -> Result<bool> {
        let mut tables: BTreeSet<u32> = state.routes.iter().map(|r| r.table).collect();
        tables.extend(state.tables.iter().map(|t| t.id));

        let mut changed = false;
        for table in tables {
            let desired: Vec<&PolicyRoute> =
                state.routes.iter().filter(|r| r.table == table).collect();
            let current = self.netlink.list_routes(table).await?;

            for route in &desired {
                if !current.iter().any(|c| route_eq(c, route)) {
                    self.netlink.add_route(route).await?;
                    changed = true;
                }
            }
            for route in &current {
                if !desired.iter().any(|d| route_eq(d, route)) {
                    self.netlink.del_route(route).await?;
                    changed = true;
                }
            }
        }
        Ok(changed)
    }
}

#[async_trait]
impl CommandHandler for NetworkHandler {
    fn name(&self) -> &'static str {
        "network"
    }

    async fn handle(&self, _ctx: &HandlerContext, command: Command) -> Result<CommandResponse> {
        let Some(Payload::Network(state)) = command.payload else {
            return Err(Error::Validation(
                "NETWORK command requires a network payload".into(),
            ));
        };

        Self::validate(&state)?;

        let mut changed = false;
        changed |= self.reconcile_interfaces(&state).await?;
        changed |= self.reconcile_tables_file(&state.tables).await?;
        changed |= self.reconcile_rules(&state.rules).await?;
        changed |= self.reconcile_routes(&state).await?;

        if changed {
            info!(interfaces = state.interfaces.len(), "network state converged");
        }

        Ok(
            CommandResponse::ok(command.command_id).with_result(CommandResult::NetworkState(
                NetworkState {
                    interfaces: state.interfaces.iter().map(|i| i.name.clone()).collect(),
                    tables: state.tables.iter().map(|t| t.id).collect(),
                    changed,
                },
            )),
        )
    }
}

/// rt_tables.d format: one `<id> <name>` per line, sorted by id.
fn render_tables(tables: &[RoutingTable]) -> String {
    let mut entries: Vec<(u32, &str)> = tables.iter().map(|t| (t.id, t.name.as_str())).collect();
    entries.sort_unstable();

    let mut out = String::new();
    for (id, name) in entries {
        out.push_str(&format!("{} {}\n", id, name));
    }
    out
}

fn rule_eq(a: &PolicyRule, b: &PolicyRule) -> bool {
    a.table == b.table
        && a.priority == b.priority
        && norm(&a.from) == norm(&b.from)
        && norm(&a.to) == norm(&b.to)
}

fn route_eq(a: &PolicyRoute, b: &PolicyRoute) -> bool {
    a.to == b.to && norm(&a.via) == norm(&b.via) && norm(&a.interface) == norm(&b.interface)
}

fn norm(s: &str) -> &str {
    if s == "all" {
        ""
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elchi_proto::{CommandType, InterfaceConfig};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    /// Counting in-memory netlink fake.
    struct FakeNetlink {
        rules: Mutex<Vec<PolicyRule>>,
        routes: Mutex<Vec<PolicyRoute>>,
        adds: AtomicUsize,
        dels: AtomicUsize,
    }

    impl FakeNetlink {
        fn new() -> Self {
            Self {
                rules: Mutex::new(Vec::new()),
                routes: Mutex::new(Vec::new()),
                adds: AtomicUsize::new(0),
                dels: AtomicUsize::new(0),
            }
        }

        fn writes(&self) -> usize {
            self.adds.load(Ordering::SeqCst) + self.dels.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl NetlinkOps for FakeNetlink {
        async fn list_rules(&self) -> Result<Vec<PolicyRule>> {
            Ok(self.rules.lock().await.clone())
        }
        async fn add_rule(&self, rule: &PolicyRule) -> Result<()> {
            self.adds.fetch_add(1, Ordering::SeqCst);
            self.rules.lock().await.push(rule.clone());
            Ok(())
        }
        async fn del_rule(&self, rule: &PolicyRule) -> Result<()> {
            self.dels.fetch_add(1, Ordering::SeqCst);
            self.rules.lock().await.retain(|r| !rule_eq(r, rule));
            Ok(())
        }
        async fn list_routes(&self, table: u32) -> Result<Vec<PolicyRoute>> {
            Ok(self
                .routes
                .lock()
                .await
                .iter()
                .filter(|r| r.table == table)
                .cloned()
                .collect())
        }
        async fn add_route(&self, route: &PolicyRoute) -> Result<()> {
            self.adds.fetch_add(1, Ordering::SeqCst);
            self.routes.lock().await.push(route.clone());
            Ok(())
        }
        async fn del_route(&self, route: &PolicyRoute) -> Result<()> {
            self.dels.fetch_add(1, Ordering::SeqCst);
            self.routes
                .lock()
                .await
                .retain(|r| !(r.table == route.table && route_eq(r, route)));
            Ok(())
        }
    }

    struct FakeApplier {
        applies: AtomicUsize,
    }

    #[async_trait]
    impl NetplanApplier for FakeApplier {
        async fn apply(&self) -> Result<()> {
            self.applies.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FixedProbe(AtomicBool);

    #[async_trait]
    impl ControllerProbe for FixedProbe {
        async fn probe(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    struct Fixture {
        handler: NetworkHandler,
        netlink: Arc<FakeNetlink>,
        applier: Arc<FakeApplier>,
        _dir: tempfile::TempDir,
    }

    fn fixture(probe_up: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = PathsConfig::default();
        paths.netplan_dir = dir.path().join("netplan");
        paths.routing_tables_file = dir.path().join("rt_tables.d/elchi.conf");

        let netlink = Arc::new(FakeNetlink::new());
        let applier = Arc::new(FakeApplier {
            applies: AtomicUsize::new(0),
        });
        let probe = Arc::new(FixedProbe(AtomicBool::new(probe_up)));

        let handler = NetworkHandler::new(
            &paths,
            netlink.clone(),
            applier.clone(),
            probe,
        )
        .with_guard_config(GuardConfig {
            timeout: Duration::from_millis(500),
            grace: Duration::from_millis(1),
            cadence: Duration::from_millis(5),
            ok_threshold: 2,
            lost_threshold: 5,
        });

        Fixture {
            handler,
            netlink,
            applier,
            _dir: dir,
        }
    }

    fn desired_state() -> NetworkDesiredState {
        NetworkDesiredState {
            interfaces: vec![InterfaceConfig {
                name: "eth1".into(),
                dhcp4: false,
                addresses: vec!["10.1.0.5/24".into()],
                ..Default::default()
            }],
            tables: vec![RoutingTable {
                id: 150,
                name: "elchi-wan".into(),
            }],
            rules: vec![PolicyRule {
                table: 150,
                from: "10.1.0.0/24".into(),
                to: String::new(),
                priority: 1500,
            }],
            routes: vec![PolicyRoute {
                table: 150,
                to: "0.0.0.0/0".into(),
                via: "10.1.0.1".into(),
                interface: "eth1".into(),
            }],
            apply_timeout_seconds: 0,
        }
    }

    fn network_command(state: NetworkDesiredState) -> Command {
        Command {
            command_id: "net-1".into(),
            r#type: CommandType::Network as i32,
            payload: Some(Payload::Network(state)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_first_apply_converges_everything() {
        let fx = fixture(true);
        let ctx = HandlerContext::new(CancellationToken::new());

        let response = fx
            .handler
            .handle(&ctx, network_command(desired_state()))
            .await
            .unwrap();

        assert!(response.success);
        let Some(CommandResult::NetworkState(state)) = response.result else {
            panic!("expected network state result");
        };
        assert!(state.changed);
        assert_eq!(state.tables, vec![150]);
        assert_eq!(fx.applier.applies.load(Ordering::SeqCst), 1);
        // one rule add + one route add
        assert_eq!(fx.netlink.writes(), 2);
    }

    #[tokio::test]
    async fn test_second_identical_apply_performs_no_writes() {
        let fx = fixture(true);
        let ctx = HandlerContext::new(CancellationToken::new());

        fx.handler
            .handle(&ctx, network_command(desired_state()))
            .await
            .unwrap();
        let writes_after_first = fx.netlink.writes();
        let applies_after_first = fx.applier.applies.load(Ordering::SeqCst);

        let response = fx
            .handler
            .handle(&ctx, network_command(desired_state()))
            .await
            .unwrap();

        let Some(CommandResult::NetworkState(state)) = response.result else {
            panic!("expected network state result");
        };
        assert!(!state.changed);
        assert_eq!(fx.netlink.writes(), writes_after_first);
        assert_eq!(fx.applier.applies.load(Ordering::SeqCst), applies_after_first);
    }

    #[tokio::test]
    async fn test_stale_rules_and_routes_removed() {
        let fx = fixture(true);
        let ctx = HandlerContext::new(CancellationToken::new());

        fx.handler
            .handle(&ctx, network_command(desired_state()))
            .await
            .unwrap();

        // Desired state drops the rule and route but keeps the table.
        let mut state = desired_state();
        state.rules.clear();
        state.routes.clear();
        fx.handler
            .handle(&ctx, network_command(state))
            .await
            .unwrap();

        assert!(fx.netlink.rules.lock().await.is_empty());
        assert!(fx.netlink.routes.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_table_outside_range_rejected() {
        let fx = fixture(true);
        let ctx = HandlerContext::new(CancellationToken::new());

        let mut state = desired_state();
        state.tables[0].id = 50;
        let err = fx
            .handler
            .handle(&ctx, network_command(state))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        // Nothing was touched.
        assert_eq!(fx.netlink.writes(), 0);
    }

    #[tokio::test]
    async fn test_lost_connectivity_rolls_back_netplan_file() {
        let fx = fixture(false);
        let ctx = HandlerContext::new(CancellationToken::new());

        let err = fx
            .handler
            .handle(&ctx, network_command(desired_state()))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("rolled back"));
        // Fresh install: the unified file must be gone again.
        assert!(!fx.handler.netplan_file.exists());
    }

    #[tokio::test]
    async fn test_missing_payload_rejected() {
        let fx = fixture(true);
        let ctx = HandlerContext::new(CancellationToken::new());

        let command = Command {
            command_id: "net-2".into(),
            r#type: CommandType::Network as i32,
            ..Default::default()
        };
        let err = fx.handler.handle(&ctx, command).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
