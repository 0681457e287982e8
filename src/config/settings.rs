use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::config::tools::{CliToolDescriptor, default_tools};
use crate::security::SecurityMode;

pub const ENV_CONFIG_PATH: &str = "KUBEGATE_CONFIG";
pub const ENV_TIMEOUT: &str = "KUBEGATE_TIMEOUT";
pub const ENV_MAX_OUTPUT: &str = "KUBEGATE_MAX_OUTPUT";
pub const ENV_CONTEXT: &str = "K8S_CONTEXT";
pub const ENV_NAMESPACE: &str = "K8S_NAMESPACE";
pub const ENV_SECURITY_MODE: &str = "KUBEGATE_SECURITY_MODE";
pub const ENV_SECURITY_CONFIG: &str = "KUBEGATE_SECURITY_CONFIG";
pub const ENV_AUDIT_LOG: &str = "KUBEGATE_AUDIT_LOG";
pub const ENV_TOOL_CACHE_TTL: &str = "KUBEGATE_TOOL_CACHE_TTL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Config directory not found")]
    DirectoryNotFound,

    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct GatewayConfig {
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub kubernetes: KubernetesConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default = "default_tools")]
    pub tools: Vec<CliToolDescriptor>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ExecutionConfig {
    pub timeout_seconds: u64,
    pub max_output_chars: usize,
    pub tool_cache_ttl_seconds: u64,
    /// Shell used for piped commands only
    pub shell: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 300,
            max_output_chars: 100_000,
            tool_cache_ttl_seconds: 300,
            shell: "sh".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct KubernetesConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SecurityConfig {
    #[serde(default)]
    pub mode: SecurityMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AuditConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
}

impl GatewayConfig {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        let home = std::env::var("HOME").map_err(|_| ConfigError::DirectoryNotFound)?;
        Ok(PathBuf::from(home).join(".config").join("kubegate"))
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Create default configuration
    pub fn default_config() -> Self {
        Self {
            tools: default_tools(),
            ..Default::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: GatewayConfig = toml::from_str(&contents)?;

        config.validate()?;

        Ok(config)
    }

    /// Load from `KUBEGATE_CONFIG`, then the default path, then built-in
    /// defaults, and apply environment overrides on top
    pub fn from_env() -> Result<Self, ConfigError> {
        let explicit = std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from);

        let mut config = match explicit {
            Some(path) => Self::load_from(&path)?,
            None => match Self::config_path() {
                Ok(path) if path.exists() => Self::load_from(&path)?,
                _ => Self::default_config(),
            },
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment-style key/value overrides
    ///
    /// Empty values are treated as unset.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = get(ENV_TIMEOUT) {
            self.execution.timeout_seconds = parse_number(ENV_TIMEOUT, &value)?;
        }
        if let Some(value) = get(ENV_MAX_OUTPUT) {
            self.execution.max_output_chars = parse_number(ENV_MAX_OUTPUT, &value)?;
        }
        if let Some(value) = get(ENV_TOOL_CACHE_TTL) {
            self.execution.tool_cache_ttl_seconds = parse_number(ENV_TOOL_CACHE_TTL, &value)?;
        }
        if let Some(value) = get(ENV_CONTEXT) {
            self.kubernetes.context = Some(value.trim().to_string());
        }
        if let Some(value) = get(ENV_NAMESPACE) {
            self.kubernetes.namespace = Some(value.trim().to_string());
        }
        if let Some(value) = get(ENV_SECURITY_MODE) {
            self.security.mode = value.parse().map_err(ConfigError::InvalidValue)?;
        }
        if let Some(value) = get(ENV_SECURITY_CONFIG) {
            self.security.policy_path = Some(PathBuf::from(value));
        }
        if let Some(value) = get(ENV_AUDIT_LOG) {
            self.audit.log_path = Some(PathBuf::from(value));
        }

        for tool in &mut self.tools {
            let Some(credentials) = tool.credentials.as_mut() else {
                continue;
            };
            let prefix = format!("KUBEGATE_{}", tool.name.to_uppercase().replace('-', "_"));
            if let Some(url) = get(&format!("{}_URL", prefix)) {
                credentials.url = Some(url);
            }
            if let Some(token) = get(&format!("{}_TOKEN", prefix)) {
                credentials.token = Some(token);
            }
        }

        self.validate()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.execution.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.execution.max_output_chars == 0 {
            return Err(ConfigError::InvalidValue(
                "max_output_chars must be greater than 0".to_string(),
            ));
        }

        if self.execution.shell.trim().is_empty() {
            return Err(ConfigError::InvalidValue("shell must not be empty".to_string()));
        }

        // These values end up inside command lines
        if let Some(context) = &self.kubernetes.context {
            check_flag_value("context", context)?;
        }
        if let Some(namespace) = &self.kubernetes.namespace {
            check_flag_value("namespace", namespace)?;
        }

        let mut names = HashSet::new();
        for tool in &self.tools {
            if tool.name.is_empty() || tool.binary.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "tool name and binary must not be empty".to_string(),
                ));
            }
            if !names.insert(tool.name.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "tool '{}' is declared more than once",
                    tool.name
                )));
            }
        }

        Ok(())
    }

    /// Default per-call timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.execution.timeout_seconds)
    }

    /// Look up a tool descriptor by name
    pub fn tool(&self, name: &str) -> Option<&CliToolDescriptor> {
        self.tools.iter().find(|tool| tool.name == name)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(format!("{} must be a number, got '{}'", key, value)))
}

fn check_flag_value(name: &str, value: &str) -> Result<(), ConfigError> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '@' | '/'));

    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue(format!(
            "{} '{}' contains characters that are not allowed",
            name, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default_config();
        assert_eq!(config.execution.timeout_seconds, 300);
        assert_eq!(config.security.mode, SecurityMode::Strict);
        assert!(config.kubernetes.context.is_none());
        assert!(config.tool("kubectl").is_some());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GatewayConfig::default_config();
        config
            .apply_overrides(lookup(&[
                (ENV_TIMEOUT, "45"),
                (ENV_MAX_OUTPUT, "2048"),
                (ENV_CONTEXT, "bar"),
                (ENV_NAMESPACE, "foo"),
                (ENV_SECURITY_MODE, "permissive"),
                (ENV_SECURITY_CONFIG, "/etc/kubegate/policy.toml"),
            ]))
            .unwrap();

        assert_eq!(config.timeout(), Duration::from_secs(45));
        assert_eq!(config.execution.max_output_chars, 2048);
        assert_eq!(config.kubernetes.context.as_deref(), Some("bar"));
        assert_eq!(config.kubernetes.namespace.as_deref(), Some("foo"));
        assert_eq!(config.security.mode, SecurityMode::Permissive);
        assert_eq!(
            config.security.policy_path,
            Some(PathBuf::from("/etc/kubegate/policy.toml"))
        );
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = GatewayConfig::default_config();
        config
            .apply_overrides(lookup(&[(ENV_CONTEXT, ""), (ENV_NAMESPACE, "  ")]))
            .unwrap();
        assert!(config.kubernetes.context.is_none());
        assert!(config.kubernetes.namespace.is_none());
    }

    #[test]
    fn test_credential_overrides() {
        let mut config = GatewayConfig::default_config();
        config
            .apply_overrides(lookup(&[
                ("KUBEGATE_RANCHER_URL", "https://rancher.example.com"),
                ("KUBEGATE_RANCHER_TOKEN", "token-abc"),
            ]))
            .unwrap();

        let credentials = config.tool("rancher").unwrap().credentials.as_ref().unwrap();
        assert_eq!(credentials.url.as_deref(), Some("https://rancher.example.com"));
        assert_eq!(credentials.token.as_deref(), Some("token-abc"));
    }

    #[test]
    fn test_invalid_timeout() {
        let mut config = GatewayConfig::default_config();
        assert!(config.apply_overrides(lookup(&[(ENV_TIMEOUT, "soon")])).is_err());

        let mut config = GatewayConfig::default_config();
        assert!(config.apply_overrides(lookup(&[(ENV_TIMEOUT, "0")])).is_err());
    }

    #[test]
    fn test_invalid_security_mode() {
        let mut config = GatewayConfig::default_config();
        let result = config.apply_overrides(lookup(&[(ENV_SECURITY_MODE, "yolo")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_namespace_with_shell_characters_rejected() {
        let mut config = GatewayConfig::default_config();
        config.kubernetes.namespace = Some("foo; rm -rf /".to_string());
        assert!(config.validate().is_err());

        config.kubernetes.namespace = Some("team-a".to_string());
        config.kubernetes.context = Some("arn:aws:eks:us-east-1:123:cluster/prod".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_tools_rejected() {
        let mut config = GatewayConfig::default_config();
        let kubectl = config.tool("kubectl").unwrap().clone();
        config.tools.push(kubectl);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_partial_file() {
        let config: GatewayConfig = toml::from_str(
            r#"
[kubernetes]
namespace = "team-a"

[security]
mode = "strict"
"#,
        )
        .unwrap();

        assert_eq!(config.kubernetes.namespace.as_deref(), Some("team-a"));
        assert_eq!(config.execution.timeout_seconds, 300);
        assert_eq!(config.tools.len(), 5);
    }

    #[test]
    fn test_parse_custom_tools() {
        let config: GatewayConfig = toml::from_str(
            r#"
[[tools]]
name = "oc"
binary = "oc"
check_command = "oc version --client"
auth_hint = "Run 'oc login'."
"#,
        )
        .unwrap();

        assert_eq!(config.tools.len(), 1);
        assert_eq!(config.tool("oc").unwrap().help_flag, "--help");
    }

    #[test]
    fn test_serialize_deserialize() {
        let config = GatewayConfig::default_config();
        let toml = toml::to_string(&config).unwrap();
        let parsed: GatewayConfig = toml::from_str(&toml).unwrap();

        assert_eq!(config.execution.timeout_seconds, parsed.execution.timeout_seconds);
        assert_eq!(config.tools, parsed.tools);
    }
}
