//! Session lifecycle scenarios against the scripted controller.

mod common;

use async_trait::async_trait;
use common::{FakeConnector, FakeController};
use elchi_client::dispatch::{CommandDispatcher, DispatcherConfig};
use elchi_client::handlers::stats::{StatsHandler, StatsSource};
use elchi_client::heartbeat::Heartbeat;
use elchi_client::session::{Session, SessionOptions, SessionState, INITIAL_CONNECTION_ID};
use elchi_core::command::{CommandHandler, HandlerContext, HandlerRegistry};
use elchi_core::config::Config;
use elchi_core::info::ClientInfo;
use elchi_core::transport::TransportEvent;
use elchi_core::{Error, Result};
use elchi_proto::command_response::Result as CommandResult;
use elchi_proto::{ClientStats, Command, CommandResponse, CommandType, Identity};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct FixedStats;

#[async_trait]
impl StatsSource for FixedStats {
    async fn collect(&self) -> Result<ClientStats> {
        Ok(ClientStats {
            load1: 0.1,
            uptime_seconds: 42,
            ..Default::default()
        })
    }
}

/// Handler that parks until cancelled, for shutdown tests.
struct SlowHandler;

#[async_trait]
impl CommandHandler for SlowHandler {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn handle(&self, ctx: &HandlerContext, command: Command) -> Result<CommandResponse> {
        tokio::select! {
            _ = ctx.cancel.cancelled() => Err(Error::Operation("cancelled".into())),
            _ = tokio::time::sleep(Duration::from_secs(30)) => {
                Ok(CommandResponse::ok(command.command_id))
            }
        }
    }
}

struct Fixture {
    controller: Arc<FakeController>,
    session: Arc<Session>,
    heartbeat: Arc<Heartbeat>,
    cancel: CancellationToken,
}

fn client_info() -> Arc<ClientInfo> {
    let mut config = Config::default();
    config.server.host = "controller".into();
    config.server.token = "secret--proj".into();
    config.client.name = "edge-test".into();
    config.client.bgp = Some(false);
    Arc::new(ClientInfo::detect(&config, "client-test".into(), "0.0.0"))
}

fn fixture_with_registry(tokens: &[&str], registry: HandlerRegistry) -> Fixture {
    let controller = FakeController::new(tokens);
    let connector = FakeConnector::new(controller.clone());

    let info = client_info();
    let state = Arc::new(SessionState::new());
    let dispatcher = Arc::new(CommandDispatcher::new(
        registry,
        DispatcherConfig::default(),
        state.clone(),
        info.clone(),
    ));
    let heartbeat = Arc::new(
        Heartbeat::new(connector.clone(), "client-test").with_period(Duration::from_millis(50)),
    );

    let (_events_tx, events_rx) = mpsc::channel::<TransportEvent>(4);
    let session = Arc::new(Session::new(
        info,
        "secret--proj".into(),
        state,
        connector,
        heartbeat.clone(),
        dispatcher,
        events_rx,
        SessionOptions {
            connect_attempts: 3,
            shutdown_timeout: Duration::from_secs(5),
            flow_control_delay: Duration::from_millis(100),
        },
    ));

    Fixture {
        controller,
        session,
        heartbeat,
        cancel: CancellationToken::new(),
    }
}

fn fixture(tokens: &[&str]) -> Fixture {
    let mut registry = HandlerRegistry::new();
    registry.register(
        CommandType::ClientStats,
        Arc::new(StatsHandler::new(Arc::new(FixedStats))),
    );
    fixture_with_registry(tokens, registry)
}

fn stats_command(id: &str, token: &str) -> Command {
    Command {
        command_id: id.into(),
        r#type: CommandType::ClientStats as i32,
        identity: Some(Identity {
            client_id: "client-test".into(),
            session_token: token.into(),
            client_name: "edge-test".into(),
        }),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_happy_path_register_then_command() {
    let fx = fixture(&["T1"]);
    let run = tokio::spawn({
        let session = fx.session.clone();
        let cancel = fx.cancel.clone();
        async move { session.run(cancel).await }
    });

    // The initial-connection response is the first frame, stamped with T1.
    let frames = fx.controller.wait_for_frames(1).await;
    assert_eq!(frames[0].command_id, INITIAL_CONNECTION_ID);
    assert!(frames[0].success);
    assert_eq!(
        frames[0].identity.as_ref().unwrap().session_token,
        "T1"
    );

    fx.controller.send_command(stats_command("cmd-1", "T1")).await;
    let frames = fx.controller.wait_for_frames(2).await;
    let response = &frames[1];
    assert_eq!(response.command_id, "cmd-1");
    assert!(response.success);
    assert_eq!(response.identity.as_ref().unwrap().session_token, "T1");
    assert!(matches!(
        response.result,
        Some(CommandResult::ClientStats(_))
    ));

    fx.cancel.cancel();
    run.await.unwrap().unwrap();
    assert_eq!(
        fx.controller
            .unregisters
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

#[tokio::test]
async fn test_stale_token_rejected_stream_survives() {
    let fx = fixture(&["T1"]);
    let run = tokio::spawn({
        let session = fx.session.clone();
        let cancel = fx.cancel.clone();
        async move { session.run(cancel).await }
    });
    fx.controller.wait_for_frames(1).await;

    fx.controller.send_command(stats_command("cmd-2", "T0")).await;
    let frames = fx.controller.wait_for_frames(2).await;
    assert!(!frames[1].success);
    assert!(frames[1].error.contains("Command validation failed"));

    // Stream stayed open: the next valid command processes normally.
    fx.controller.send_command(stats_command("cmd-3", "T1")).await;
    let frames = fx.controller.wait_for_frames(3).await;
    assert_eq!(frames[2].command_id, "cmd-3");
    assert!(frames[2].success);

    fx.cancel.cancel();
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_heartbeat_triggers_reregister_with_fresh_token() {
    let fx = fixture(&["T1", "T2"]);
    fx.controller
        .script_ping(FakeController::not_registered())
        .await;

    let run = tokio::spawn({
        let session = fx.session.clone();
        let cancel = fx.cancel.clone();
        async move { session.run(cancel).await }
    });

    // The "not registered" ping forces a second Register with the same
    // client id and a fresh token.
    fx.controller.wait_for_registers(2).await;

    // Two initial-connection frames; the second one carries T2.
    let frames = fx.controller.wait_for_frames(2).await;
    assert_eq!(frames[1].command_id, INITIAL_CONNECTION_ID);
    assert_eq!(frames[1].identity.as_ref().unwrap().session_token, "T2");

    // Commands after the re-register are stamped with the fresh token.
    fx.controller.send_command(stats_command("cmd-4", "T2")).await;
    let frames = fx.controller.wait_for_frames(3).await;
    assert_eq!(frames[2].command_id, "cmd-4");
    assert_eq!(frames[2].identity.as_ref().unwrap().session_token, "T2");

    fx.cancel.cancel();
    run.await.unwrap().unwrap();
    // No leaked heartbeat after shutdown.
    assert!(!fx.heartbeat.is_running().await);
}

#[tokio::test]
async fn test_registration_rejection_is_fatal() {
    let fx = fixture(&[]);
    let result = fx.session.run(fx.cancel.clone()).await;

    let err = result.unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(
        fx.controller
            .registers
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

#[tokio::test]
async fn test_graceful_shutdown_with_handler_in_flight() {
    let mut registry = HandlerRegistry::new();
    registry.register(CommandType::ClientStats, Arc::new(SlowHandler));
    let fx = fixture_with_registry(&["T1"], registry);

    let run = tokio::spawn({
        let session = fx.session.clone();
        let cancel = fx.cancel.clone();
        async move { session.run(cancel).await }
    });
    fx.controller.wait_for_frames(1).await;

    // Handler is now mid-flight; shutdown must cancel it and finish fast.
    fx.controller.send_command(stats_command("cmd-5", "T1")).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = std::time::Instant::now();
    fx.cancel.cancel();
    run.await.unwrap().unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(
        fx.controller
            .unregisters
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
    assert!(!fx.heartbeat.is_running().await);
}
