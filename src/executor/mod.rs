pub mod auth;
pub mod output;
pub mod process;

pub use auth::{AUTH_ERROR_PATTERNS, auth_error_message, is_auth_error};
pub use output::{decode, truncate_output};
pub use process::{CommandOutput, ExecutionRequest, ProcessExecutor};
