pub mod audit;
pub mod command;
pub mod config;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod injection;
pub mod security;

// Re-export commonly used types for convenience
pub use config::{CliToolDescriptor, GatewayConfig};
pub use error::{ErrorCode, GatewayError, GatewayResult};
pub use gateway::{ExecutionResult, Gateway, Status, ToolProbe};
pub use security::{SecurityMode, ValidationError};
