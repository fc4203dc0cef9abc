pub mod accounts;
pub mod cache;
pub mod cleanup;
pub mod config;
pub mod digest;
pub mod doctor;
pub mod migrate;
pub mod scheduled;
pub mod wiring;

use serde::Serialize;
use serde_json::Value;

/// Exit codes shared by every command.
pub mod exit {
    pub const CONFIG: u8 = 2;
    pub const RUNTIME: u8 = 3;
    pub const DATABASE: u8 = 4;
    pub const MIGRATION: u8 = 5;
    pub const WIRING: u8 = 6;
    pub const ABORTED: u8 = 7;
    pub const PARTIAL: u8 = 8;
}

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<Value>,
}

/// A command that stopped early, classified for scripting.
#[derive(Debug)]
pub struct CommandFailure {
    pub error_class: &'static str,
    pub message: String,
    pub exit_code: u8,
}

impl CommandFailure {
    pub fn new(error_class: &'static str, message: impl Into<String>, exit_code: u8) -> Self {
        Self { error_class, message: message.into(), exit_code }
    }

    pub fn into_result(self, command: &str) -> CommandResult {
        CommandResult::failure(command, self.error_class, self.message, self.exit_code)
    }
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            report: None,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            report: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Finished run. Recorded unit failures turn into a `partial` status and a
    /// non-zero exit code while the report is still emitted.
    pub fn with_report(
        command: &str,
        message: impl Into<String>,
        report: &impl Serialize,
        clean: bool,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: if clean { "ok" } else { "partial" }.to_string(),
            error_class: if clean { None } else { Some("unit_failures".to_string()) },
            message: message.into(),
            report: serde_json::to_value(report).ok(),
        };
        let exit_code = if clean { 0 } else { exit::PARTIAL };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
