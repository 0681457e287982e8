use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::command::CommandParseError;
use crate::config::ConfigError;
use crate::security::ValidationError;

/// Wire-level error codes reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    #[serde(rename = "EXECUTION_ERROR")]
    Execution,
    #[serde(rename = "AUTH_ERROR")]
    Authentication,
    #[serde(rename = "TIMEOUT_ERROR")]
    Timeout,
    #[serde(rename = "INTERNAL_ERROR")]
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Validation => "VALIDATION_ERROR",
            ErrorCode::Execution => "EXECUTION_ERROR",
            ErrorCode::Authentication => "AUTH_ERROR",
            ErrorCode::Timeout => "TIMEOUT_ERROR",
            ErrorCode::Internal => "INTERNAL_ERROR",
        }
    }
}

/// Errors raised while validating or running a command
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{message}")]
    Execution {
        message: String,
        exit_code: Option<i32>,
        stderr: Option<String>,
    },

    #[error("{message}")]
    Authentication {
        message: String,
        exit_code: Option<i32>,
        stderr: Option<String>,
    },

    #[error("Command timed out after {:.1} seconds (limit {}s)", .elapsed.as_secs_f64(), .limit.as_secs())]
    Timeout { elapsed: Duration, limit: Duration },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl GatewayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GatewayError::Validation(_) => ErrorCode::Validation,
            GatewayError::Execution { .. } => ErrorCode::Execution,
            GatewayError::Authentication { .. } => ErrorCode::Authentication,
            GatewayError::Timeout { .. } => ErrorCode::Timeout,
            GatewayError::Internal(_) | GatewayError::Io(_) => ErrorCode::Internal,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            GatewayError::Execution { exit_code, .. }
            | GatewayError::Authentication { exit_code, .. } => *exit_code,
            _ => None,
        }
    }

    pub fn stderr(&self) -> Option<&str> {
        match self {
            GatewayError::Execution { stderr, .. }
            | GatewayError::Authentication { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }
}

impl From<CommandParseError> for GatewayError {
    fn from(err: CommandParseError) -> Self {
        GatewayError::Validation(ValidationError::from(err))
    }
}

impl From<ConfigError> for GatewayError {
    fn from(err: ConfigError) -> Self {
        GatewayError::Internal(format!("Configuration error: {}", err))
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
