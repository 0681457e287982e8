pub mod settings;
pub mod tools;

pub use settings::{
    AuditConfig, ConfigError, ExecutionConfig, GatewayConfig, KubernetesConfig, SecurityConfig,
};
pub use tools::{CliToolDescriptor, ToolCredentials, default_tools};
