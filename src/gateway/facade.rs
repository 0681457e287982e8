use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::audit::AuditLogger;
use crate::command::first_word;
use crate::config::{ConfigError, GatewayConfig};
use crate::error::GatewayError;
use crate::executor::{ExecutionRequest, ProcessExecutor};
use crate::gateway::probe::{CommandProbe, ToolProbe};
use crate::gateway::result::ExecutionResult;
use crate::security::{CommandValidator, PolicyDefinition, PolicySnapshot, PolicyStore, ValidationError};

struct InstalledTools {
    checked_at: Instant,
    tools: HashMap<String, bool>,
}

/// Single entry point for running governed CLI commands
///
/// Every call returns an [`ExecutionResult`]; faults never escape as errors.
pub struct Gateway {
    config: GatewayConfig,
    policy: Arc<PolicyStore>,
    validator: CommandValidator,
    executor: ProcessExecutor,
    probe: Arc<dyn ToolProbe>,
    installed: RwLock<Option<InstalledTools>>,
    audit: Option<AuditLogger>,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let policy = Arc::new(PolicyStore::load(
            PolicyDefinition::builtin(),
            config.security.policy_path.clone(),
        ));
        let validator =
            CommandValidator::new(Arc::clone(&policy), config.security.mode).with_tools(&config.tools);
        let executor = ProcessExecutor::from_config(&config);

        let audit = config.audit.log_path.as_ref().and_then(|path| {
            AuditLogger::with_path(path)
                .map_err(|e| warn!("Audit log disabled, cannot open {}: {}", path.display(), e))
                .ok()
        });

        info!(
            "Gateway ready: {} tools, security mode {}",
            config.tools.len(),
            config.security.mode
        );

        Ok(Self {
            config,
            policy,
            validator,
            executor,
            probe: Arc::new(CommandProbe::default()),
            installed: RwLock::new(None),
            audit,
        })
    }

    /// Replace the installed-tools probe
    pub fn with_probe<P: ToolProbe + 'static>(mut self, probe: P) -> Self {
        self.probe = Arc::new(probe);
        self.installed = RwLock::new(None);
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn policy(&self) -> Arc<PolicySnapshot> {
        self.policy.snapshot()
    }

    /// Validate and run `command` with `tool`
    ///
    /// The tool binary is prepended when the command does not start with it.
    /// `timeout` falls back to the configured default.
    pub async fn execute(&self, tool: &str, command: &str, timeout: Option<Duration>) -> ExecutionResult {
        let Some(descriptor) = self.config.tool(tool) else {
            return self.reject(tool, command, ValidationError::UnsupportedTool(tool.to_string()));
        };

        let raw = command.trim();
        if raw.is_empty() {
            return self.reject(tool, raw, ValidationError::EmptyCommand);
        }

        let command = prefix_binary(&descriptor.binary, raw);

        if !self.is_installed(tool).await {
            return self.reject(tool, &command, ValidationError::ToolNotInstalled(tool.to_string()));
        }

        if let Err(reason) = self.validator.validate(tool, &command) {
            return self.reject(tool, &command, reason);
        }

        let request = ExecutionRequest::new(
            tool,
            command.clone(),
            timeout.unwrap_or_else(|| self.config.timeout()),
        );
        let start = Instant::now();

        match self.executor.run(&request).await {
            Ok(output) => {
                self.audit_command(tool, &output.command, &format!("exit:{}", output.exit_code));
                ExecutionResult::success(output.output, output.exit_code, output.elapsed)
            }
            Err(err) => {
                let outcome = match err.exit_code() {
                    Some(code) => format!("exit:{}", code),
                    None => err.code().as_str().to_string(),
                };
                self.audit_command(tool, &command, &outcome);
                ExecutionResult::from_error(err, &command).with_execution_time(start.elapsed())
            }
        }
    }

    /// Run `<binary> [subcommand] <help-flag>` through [`Gateway::execute`]
    pub async fn describe_help(&self, tool: &str, subcommand: Option<&str>) -> ExecutionResult {
        let Some(descriptor) = self.config.tool(tool) else {
            return self.reject(tool, "", ValidationError::UnsupportedTool(tool.to_string()));
        };

        let mut parts = vec![descriptor.binary.as_str()];
        if let Some(subcommand) = subcommand.map(str::trim).filter(|s| !s.is_empty()) {
            parts.push(subcommand);
        }
        parts.push(descriptor.help_flag.as_str());

        let command = parts.join(" ");
        self.execute(tool, &command, None).await
    }

    /// Re-read the policy override file and publish a new snapshot
    pub fn reload_policy(&self) -> Arc<PolicySnapshot> {
        self.policy.reload()
    }

    /// Installed state of every configured tool, cached for the configured TTL
    pub async fn installed_tools(&self) -> HashMap<String, bool> {
        if let Some(tools) = self.cached_tools() {
            return tools;
        }
        self.refresh_installed_tools().await
    }

    /// Probe every configured tool and replace the cache
    pub async fn refresh_installed_tools(&self) -> HashMap<String, bool> {
        let mut tools = HashMap::new();
        for descriptor in &self.config.tools {
            let installed = self.probe.is_installed(descriptor).await;
            debug!("{} installed: {}", descriptor.name, installed);
            tools.insert(descriptor.name.clone(), installed);
        }

        info!(
            "Installed tools refreshed: {}/{} available",
            tools.values().filter(|installed| **installed).count(),
            tools.len()
        );

        *self.installed.write().unwrap_or_else(|poisoned| poisoned.into_inner()) =
            Some(InstalledTools {
                checked_at: Instant::now(),
                tools: tools.clone(),
            });

        tools
    }

    async fn is_installed(&self, tool: &str) -> bool {
        self.installed_tools().await.get(tool).copied().unwrap_or(false)
    }

    fn cached_tools(&self) -> Option<HashMap<String, bool>> {
        let ttl = Duration::from_secs(self.config.execution.tool_cache_ttl_seconds);
        let cache = self.installed.read().unwrap_or_else(|poisoned| poisoned.into_inner());

        cache
            .as_ref()
            .filter(|cache| cache.checked_at.elapsed() < ttl)
            .map(|cache| cache.tools.clone())
    }

    fn reject(&self, tool: &str, command: &str, reason: ValidationError) -> ExecutionResult {
        warn!("Rejected {} command '{}': {}", tool, command, reason);

        if let Some(audit) = &self.audit
            && let Err(e) = audit.log_validation_failure(tool, command, &reason.to_string())
        {
            warn!("Failed to write audit log: {}", e);
        }

        ExecutionResult::from_error(GatewayError::Validation(reason), command)
    }

    fn audit_command(&self, tool: &str, command: &str, outcome: &str) {
        if let Some(audit) = &self.audit
            && let Err(e) = audit.log_command(tool, command, outcome)
        {
            warn!("Failed to write audit log: {}", e);
        }
    }
}

/// Prepend `binary` unless the command already starts with it
fn prefix_binary(binary: &str, command: &str) -> String {
    if first_word(command) == Some(binary) {
        command.to_string()
    } else {
        format!("{} {}", binary, command)
    }
}
