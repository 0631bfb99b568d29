//! CLIENT_LOGS / FRR_LOGS handler: bounded tail of a log file.

use async_trait::async_trait;
use elchi_core::command::{CommandHandler, HandlerContext};
use elchi_core::{Error, Result};
use elchi_proto::command::Payload;
use elchi_proto::command_response::Result as CommandResult;
use elchi_proto::{Command, CommandResponse, LogChunk};
use std::path::PathBuf;

/// Default lines returned when the request does not say.
pub const DEFAULT_LINES: usize = 100;

/// Hard cap per response.
pub const MAX_LINES: usize = 1000;

pub struct LogsHandler {
    path: PathBuf,
    component: &'static str,
}

impl LogsHandler {
    pub fn new(path: PathBuf, component: &'static str) -> Self {
        Self { path, component }
    }
}

#[async_trait]
impl CommandHandler for LogsHandler {
    fn name(&self) -> &'static str {
        self.component
    }

    async fn handle(&self, _ctx: &HandlerContext, command: Command) -> Result<CommandResponse> {
        let (lines, search) = match command.payload {
            Some(Payload::Logs(request)) => (request.lines, request.search),
            _ => (0, String::new()),
        };

        let want = if lines == 0 {
            DEFAULT_LINES
        } else {
            (lines as usize).min(MAX_LINES)
        };

        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::Operation(format!(
                "reading {} log {}: {}",
                self.component,
                self.path.display(),
                e
            ))
        })?;

        let matching: Vec<&str> = contents
            .lines()
            .filter(|line| search.is_empty() || line.contains(&search))
            .collect();

        let truncated = matching.len() > want;
        let start = matching.len().saturating_sub(want);
        let tail = matching[start..].iter().map(|s| s.to_string()).collect();

        Ok(
            CommandResponse::ok(command.command_id).with_result(CommandResult::LogChunk(
                LogChunk {
                    lines: tail,
                    truncated,
                },
            )),
        )
    }
}
