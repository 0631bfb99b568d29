//! CLIENT_STATS handler.
//!
//! The /proc readers are collaborators behind `StatsSource`; the handler
//! itself only shapes the snapshot into a response.

use async_trait::async_trait;
use elchi_core::command::{CommandHandler, HandlerContext};
use elchi_core::{Error, Result};
use elchi_proto::command_response::Result as CommandResult;
use elchi_proto::{ClientStats, Command, CommandResponse};
use std::sync::Arc;

/// Host statistics snapshot provider.
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn collect(&self) -> Result<ClientStats>;
}

/// Production source reading the usual /proc files.
pub struct ProcStats;

#[async_trait]
impl StatsSource for ProcStats {
    async fn collect(&self) -> Result<ClientStats> {
        let loadavg = tokio::fs::read_to_string("/proc/loadavg").await?;
        let meminfo = tokio::fs::read_to_string("/proc/meminfo").await?;
        let uptime = tokio::fs::read_to_string("/proc/uptime").await?;

        let (load1, load5, load15) = parse_loadavg(&loadavg)?;
        let (mem_total_kb, mem_available_kb) = parse_meminfo(&meminfo);

        Ok(ClientStats {
            load1,
            load5,
            load15,
            mem_total_kb,
            mem_available_kb,
            uptime_seconds: parse_uptime(&uptime)?,
            extra: Default::default(),
        })
    }
}

pub struct StatsHandler {
    source: Arc<dyn StatsSource>,
}

impl StatsHandler {
    pub fn new(source: Arc<dyn StatsSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl CommandHandler for StatsHandler {
    fn name(&self) -> &'static str {
        "client_stats"
    }

    async fn handle(&self, _ctx: &HandlerContext, command: Command) -> Result<CommandResponse> {
        let stats = self.source.collect().await?;
        Ok(CommandResponse::ok(command.command_id)
            .with_result(CommandResult::ClientStats(stats)))
    }
}

fn parse_loadavg(contents: &str) -> Result<(f64, f64, f64)> {
    let mut fields = contents.split_whitespace();
    let mut next = || -> Result<f64> {
        fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or_else(|| Error::Operation("malformed /proc/loadavg".into()))
    };
    Ok((next()?, next()?, next()?))
}

fn parse_meminfo(contents: &str) -> (u64, u64) {
    let mut total = 0;
    let mut available = 0;
    for line in contents.lines() {
        let mut fields = line.split_whitespace();
        match fields.next() {
            Some("MemTotal:") => total = fields.next().and_then(|v| v.parse().ok()).unwrap_or(0),
            Some("MemAvailable:") => {
                available = fields.next().and_then(|v| v.parse().ok()).unwrap_or(0)
            }
            _ => {}
        }
    }
    (total, available)
}

fn parse_uptime(contents: &str) -> Result<u64> {
    contents
        .split_whitespace()
        .next()
        .and_then(|f| f.parse::<f64>().ok())
        .map(|secs| secs as u64)
        .ok_or_else(|| Error::Operation("malformed /proc/uptime".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use elchi_proto::CommandType;
    use tokio_util::sync::CancellationToken;

    struct FixedStats;

    #[async_trait]
    impl StatsSource for FixedStats {
        async fn collect(&self) -> Result<ClientStats> {
            Ok(ClientStats {
                load1: 0.5,
                mem_total_kb: 16_000_000,
                mem_available_kb: 9_000_000,
                uptime_seconds: 3600,
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_stats_result_attached() {
        let handler = StatsHandler::new(Arc::new(FixedStats));
        let ctx = HandlerContext::new(CancellationToken::new());
        let command = Command {
            command_id: "stats-1".into(),
            r#type: CommandType::ClientStats as i32,
            ..Default::default()
        };

        let response = handler.handle(&ctx, command).await.unwrap();
        assert!(response.success);
        let Some(CommandResult::ClientStats(stats)) = response.result else {
            panic!("expected client stats result");
        };
        assert_eq!(stats.uptime_seconds, 3600);
    }

    #[test]
    fn test_parse_loadavg() {
        let (l1, l5, l15) = parse_loadavg("0.52 0.58 0.59 1/467 2338\n").unwrap();
        assert_eq!((l1, l5, l15), (0.52, 0.58, 0.59));
        assert!(parse_loadavg("garbage").is_err());
    }

    #[test]
    fn test_parse_meminfo() {
        let contents = "MemTotal:       16265456 kB\nMemFree:  1234 kB\nMemAvailable:    9876543 kB\n";
        assert_eq!(parse_meminfo(contents), (16_265_456, 9_876_543));
    }

    #[test]
    fn test_parse_uptime() {
        assert_eq!(parse_uptime("12345.67 23456.78\n").unwrap(), 12345);
        assert!(parse_uptime("").is_err());
    }
}
