//! Wire protocol for the elchi controller channel.
//!
//! The protobuf contract lives in `protos/elchi.proto`; the generated module
//! is checked in under `src/generated`. This crate re-exports the generated
//! types and adds the small constructors the session runtime and handlers
//! use when building frames.

mod generated;

pub use generated::elchi::*;

impl Command {
    /// Decoded command type, `Unspecified` when the controller sent a value
    /// this build does not know.
    pub fn command_type(&self) -> CommandType {
        CommandType::try_from(self.r#type).unwrap_or(CommandType::Unspecified)
    }
}

impl CommandType {
    /// Short name without the proto enum prefix, for logs and error strings.
    pub fn short_name(&self) -> &'static str {
        self.as_str_name()
            .strip_prefix("COMMAND_TYPE_")
            .unwrap_or(self.as_str_name())
    }
}

impl CommandResponse {
    /// Successful response frame for `command_id`; the dispatcher stamps the
    /// identity before the frame reaches the stream.
    pub fn ok(command_id: impl Into<String>) -> Self {
        Self {
            command_id: command_id.into(),
            identity: None,
            success: true,
            error: String::new(),
            result: None,
        }
    }

    /// Failed response frame carrying a user-legible error string.
    pub fn failure(command_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            command_id: command_id.into(),
            identity: None,
            success: false,
            error: error.into(),
            result: None,
        }
    }

    /// Attach a typed result to a response.
    pub fn with_result(mut self, result: command_response::Result) -> Self {
        self.result = Some(result);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_type_decodes_known_values() {
        let cmd = Command {
            r#type: CommandType::Network as i32,
            ..Default::default()
        };
        assert_eq!(cmd.command_type(), CommandType::Network);
    }

    #[test]
    fn test_command_type_falls_back_to_unspecified() {
        let cmd = Command {
            r#type: 9999,
            ..Default::default()
        };
        assert_eq!(cmd.command_type(), CommandType::Unspecified);
    }

    #[test]
    fn test_short_name_strips_prefix() {
        assert_eq!(CommandType::ClientStats.short_name(), "CLIENT_STATS");
        assert_eq!(CommandType::Frr.short_name(), "FRR");
    }

    #[test]
    fn test_failure_response_carries_error() {
        let resp = CommandResponse::failure("cmd-1", "boom");
        assert_eq!(resp.command_id, "cmd-1");
        assert!(!resp.success);
        assert_eq!(resp.error, "boom");
        assert!(resp.result.is_none());
    }

    #[test]
    fn test_ok_response_with_result() {
        let resp = CommandResponse::ok("cmd-2").with_result(
            command_response::Result::VersionInfo(VersionInfo {
                component: "envoy".into(),
                version: "1.30.1".into(),
            }),
        );
        assert!(resp.success);
        assert!(matches!(
            resp.result,
            Some(command_response::Result::VersionInfo(_))
        ));
    }
}
