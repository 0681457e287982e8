use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ErrorCode, GatewayError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Context attached to a failed result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
    pub code: ErrorCode,
    pub details: ErrorDetails,
}

/// The value handed back to every caller of the gateway
///
/// Serializes to:
///
/// ```json
/// {"status": "error", "output": "...", "exit_code": 1, "execution_time": 0.2,
///  "error": {"message": "...", "code": "EXECUTION_ERROR",
///            "details": {"command": "...", "exit_code": 1, "stderr": "..."}}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: Status,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Wall-clock seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl ExecutionResult {
    pub fn success(output: String, exit_code: i32, elapsed: Duration) -> Self {
        Self {
            status: Status::Success,
            output,
            exit_code: Some(exit_code),
            execution_time: Some(elapsed.as_secs_f64()),
            error: None,
        }
    }

    /// Convert an internal fault into a failed result for `command`
    pub fn from_error(err: GatewayError, command: &str) -> Self {
        let message = err.to_string();
        let exit_code = err.exit_code();

        Self {
            status: Status::Error,
            output: message.clone(),
            exit_code,
            execution_time: None,
            error: Some(ErrorInfo {
                message,
                code: err.code(),
                details: ErrorDetails {
                    command: command.to_string(),
                    exit_code,
                    stderr: err.stderr().map(str::to_string),
                },
            }),
        }
    }

    pub fn with_execution_time(mut self, elapsed: Duration) -> Self {
        self.execution_time = Some(elapsed.as_secs_f64());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Error code of a failed result
    pub fn code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|error| error.code)
    }

    pub fn message(&self) -> Option<&str> {
        self.error.as_ref().map(|error| error.message.as_str())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
