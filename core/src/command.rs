//! Handler contract and routing registry.
//!
//! One handler per `CommandType`, registered at construction; adding a type
//! is a compile-time extension. Handlers are stateless reconcilers: repeated
//! invocation with equal input must not change observable state after the
//! first success, and failures come back as errors, never panics.

use crate::Result;
use async_trait::async_trait;
use elchi_proto::{Command, CommandResponse, CommandType};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-invocation context passed to handlers.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    /// Cancelled on shutdown; handlers observe it at their next I/O point.
    pub cancel: CancellationToken,
}

impl HandlerContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }
}

/// A typed command handler.
///
/// Implementations translate a desired-state payload into OS mutations and
/// answer with a `CommandResponse`. The dispatcher owns identity stamping;
/// handlers only fill `success`, `error` and the typed result.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handler name for logs.
    fn name(&self) -> &'static str;

    /// Execute the command. An `Err` is mapped by the dispatcher into a
    /// `success=false` response and counts as a breaker failure.
    async fn handle(&self, ctx: &HandlerContext, command: Command) -> Result<CommandResponse>;
}

/// Static routing table keyed by `Command.type`.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<CommandType, Arc<dyn CommandHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a command type, replacing any previous entry.
    pub fn register(&mut self, kind: CommandType, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(kind, handler);
    }

    /// Look up the handler for a command type.
    pub fn get(&self, kind: CommandType) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(&kind).cloned()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered types, for the startup log line.
    pub fn registered_types(&self) -> Vec<CommandType> {
        let mut types: Vec<_> = self.handlers.keys().copied().collect();
        types.sort();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoHandler;

    #[async_trait]
    impl CommandHandler for EchoHandler {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn handle(
            &self,
            _ctx: &HandlerContext,
            command: Command,
        ) -> Result<CommandResponse> {
            Ok(CommandResponse::ok(command.command_id))
        }
    }

    #[tokio::test]
    async fn test_registry_routes_by_type() {
        let mut registry = HandlerRegistry::new();
        registry.register(CommandType::ClientStats, Arc::new(EchoHandler));

        assert!(registry.get(CommandType::ClientStats).is_some());
        assert!(registry.get(CommandType::Network).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_handler_echoes_command_id() {
        let handler = EchoHandler;
        let ctx = HandlerContext::new(CancellationToken::new());
        let command = Command {
            command_id: "cmd-9".into(),
            ..Default::default()
        };

        let response = handler.handle(&ctx, command).await.unwrap();
        assert_eq!(response.command_id, "cmd-9");
        assert!(response.success);
    }
}
