use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::command::tokenize;
use crate::config::CliToolDescriptor;

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Decides whether a tool is available on this host
#[async_trait]
pub trait ToolProbe: Send + Sync {
    async fn is_installed(&self, tool: &CliToolDescriptor) -> bool;
}

/// Runs the tool's check command and treats a zero exit as installed
#[derive(Debug, Clone)]
pub struct CommandProbe {
    timeout: Duration,
}

impl CommandProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for CommandProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

#[async_trait]
impl ToolProbe for CommandProbe {
    async fn is_installed(&self, tool: &CliToolDescriptor) -> bool {
        let argv = match tokenize(&tool.check_command) {
            Ok(argv) if !argv.is_empty() => argv,
            _ => {
                debug!("Unusable check command for {}: {}", tool.name, tool.check_command);
                return false;
            }
        };

        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, command.status()).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                debug!("{} not available: {}", tool.name, e);
                false
            }
            Err(_) => {
                debug!("Check command for {} timed out", tool.name);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_installed_tool() {
        let tool = CliToolDescriptor::new("echo", "echo", "echo ok");
        assert!(CommandProbe::default().is_installed(&tool).await);
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let tool = CliToolDescriptor::new("ghost", "kubegate-ghost", "kubegate-ghost version");
        assert!(!CommandProbe::default().is_installed(&tool).await);
    }

    #[tokio::test]
    async fn test_failing_check_command() {
        let tool = CliToolDescriptor::new("sh", "sh", "sh -c 'exit 1'");
        assert!(!CommandProbe::default().is_installed(&tool).await);
    }

    #[tokio::test]
    async fn test_slow_check_command() {
        let tool = CliToolDescriptor::new("sleep", "sleep", "sleep 5");
        let probe = CommandProbe::new(Duration::from_millis(100));
        assert!(!probe.is_installed(&tool).await);
    }
}
