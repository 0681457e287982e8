use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::command::{contains_pipe, tokenize};
use crate::config::{CliToolDescriptor, GatewayConfig};
use crate::error::{GatewayError, GatewayResult};
use crate::executor::auth::{auth_error_message, is_auth_error};
use crate::executor::output::{decode, truncate_output};
use crate::injection::ContextInjector;
use crate::security::ValidationError;

/// One validated command to run
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Tool name, used for credentials and auth hints
    pub tool: String,
    /// Full command line, starting with the tool binary
    pub command: String,
    pub timeout: Duration,
}

impl ExecutionRequest {
    pub fn new(tool: impl Into<String>, command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            tool: tool.into(),
            command: command.into(),
            timeout,
        }
    }
}

/// Output of a command that exited successfully
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub output: String,
    pub exit_code: i32,
    pub elapsed: Duration,
    /// The command line actually run, after injection
    pub command: String,
}

/// Runs commands as child processes with a hard timeout
///
/// # Security
///
/// A non-piped command is spawned directly from its argument vector and is
/// never handed to a shell. Only piped commands go through `<shell> -c`,
/// because the shell provides the pipes; callers must validate every stage
/// before calling [`ProcessExecutor::run`].
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    injector: ContextInjector,
    max_output_chars: usize,
    shell: String,
    tools: Vec<CliToolDescriptor>,
}

impl ProcessExecutor {
    pub fn new(
        injector: ContextInjector,
        max_output_chars: usize,
        shell: impl Into<String>,
        tools: Vec<CliToolDescriptor>,
    ) -> Self {
        Self {
            injector,
            max_output_chars,
            shell: shell.into(),
            tools,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            ContextInjector::from_config(&config.kubernetes).with_tools(&config.tools),
            config.execution.max_output_chars,
            config.execution.shell.clone(),
            config.tools.clone(),
        )
    }

    pub fn injector(&self) -> &ContextInjector {
        &self.injector
    }

    /// Inject defaults, run the command and classify the outcome
    pub async fn run(&self, request: &ExecutionRequest) -> GatewayResult<CommandOutput> {
        let start = Instant::now();
        let (mut command, line) = self.build_command(&request.command)?;

        command
            .envs(self.credential_env(&request.tool))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Pipeline stages share the child's process group, so a timeout can
        // kill all of them at once
        #[cfg(unix)]
        command.process_group(0);

        info!("Executing: {}", line);

        let child = command.spawn().map_err(|e| {
            GatewayError::Internal(format!("Failed to start '{}': {}", line, e))
        })?;
        let pid = child.id();

        let wait = child.wait_with_output();
        tokio::pin!(wait);

        let output = match tokio::time::timeout(request.timeout, &mut wait).await {
            Ok(result) => result?,
            Err(_) => {
                // The child is not reaped until `wait` drops, so its pid
                // still names the group here
                kill_process_group(pid);
                let elapsed = start.elapsed();
                warn!("Command timed out after {:?}: {}", elapsed, line);
                return Err(GatewayError::Timeout {
                    elapsed,
                    limit: request.timeout,
                });
            }
        };

        let elapsed = start.elapsed();
        let exit_code = output.status.code().unwrap_or(-1);
        let stderr = decode(&output.stderr);

        if !output.status.success() {
            warn!("Command failed (exit code {}): {}", exit_code, line);
            return Err(self.classify_failure(&request.tool, exit_code, stderr));
        }

        debug!("Command succeeded in {:?}: {}", elapsed, line);

        Ok(CommandOutput {
            output: truncate_output(decode(&output.stdout), self.max_output_chars),
            exit_code,
            elapsed,
            command: line,
        })
    }

    /// Build the process for a command line, returning it with the final line
    fn build_command(&self, command_line: &str) -> GatewayResult<(Command, String)> {
        if contains_pipe(command_line) {
            let line = self.injector.inject(command_line);
            let mut command = Command::new(&self.shell);
            command.arg("-c").arg(&line);
            return Ok((command, line));
        }

        let line = self.injector.inject_single(command_line);
        let argv = tokenize(&line)?;
        let (program, args) = argv
            .split_first()
            .ok_or(GatewayError::Validation(ValidationError::EmptyCommand))?;

        let mut command = Command::new(program);
        command.args(args);
        Ok((command, line))
    }

    /// Credential variables to add to the child environment
    fn credential_env(&self, tool: &str) -> Vec<(String, String)> {
        let Some(credentials) = self
            .descriptor(tool)
            .and_then(|descriptor| descriptor.credentials.as_ref())
        else {
            return Vec::new();
        };

        let mut vars = Vec::new();
        for (var, value) in [
            (&credentials.url_var, &credentials.url),
            (&credentials.token_var, &credentials.token),
        ] {
            match value {
                Some(value) => vars.push((var.clone(), value.clone())),
                None if std::env::var_os(var).is_none() => {
                    warn!("{} is not set; {} may fail to authenticate", var, tool);
                }
                None => {}
            }
        }
        vars
    }

    fn classify_failure(&self, tool: &str, exit_code: i32, stderr: String) -> GatewayError {
        if is_auth_error(&stderr) {
            let hint = self
                .descriptor(tool)
                .and_then(|descriptor| descriptor.auth_hint.as_deref());

            return GatewayError::Authentication {
                message: auth_error_message(tool, &stderr, hint),
                exit_code: Some(exit_code),
                stderr: Some(stderr),
            };
        }

        if stderr.trim().is_empty() {
            return GatewayError::Execution {
                message: format!("Command failed with exit code {}", exit_code),
                exit_code: Some(exit_code),
                stderr: None,
            };
        }

        GatewayError::Execution {
            message: stderr.trim_end().to_string(),
            exit_code: Some(exit_code),
            stderr: Some(stderr),
        }
    }

    fn descriptor(&self, tool: &str) -> Option<&CliToolDescriptor> {
        self.tools.iter().find(|descriptor| descriptor.name == tool)
    }
}

/// SIGKILL every process in the group led by `pid`
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pgid) = pid.and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
        return;
    };

    // SAFETY: killpg only takes integer arguments
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
        debug!(
            "Failed to kill process group {}: {}",
            pgid,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolCredentials;
    use crate::error::ErrorCode;

    fn executor() -> ProcessExecutor {
        ProcessExecutor::new(ContextInjector::default(), 1000, "sh", Vec::new())
    }

    fn request(command: &str) -> ExecutionRequest {
        ExecutionRequest::new("test", command, Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_run_echo() {
        let output = executor().run(&request("echo hello world")).await.unwrap();
        assert_eq!(output.output, "hello world\n");
        assert_eq!(output.exit_code, 0);
    }

    #[tokio::test]
    async fn test_argv_execution_does_not_use_shell() {
        // Without a shell the semicolon is just an argument to echo
        let output = executor().run(&request("echo 'a; echo b'")).await.unwrap();
        assert_eq!(output.output, "a; echo b\n");

        let output = executor().run(&request("echo $HOME")).await.unwrap();
        assert_eq!(output.output, "$HOME\n");
    }

    #[tokio::test]
    async fn test_pipeline_runs_through_shell() {
        let output = executor().run(&request("echo hello | tr a-z A-Z")).await.unwrap();
        assert_eq!(output.output, "HELLO\n");
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let request = ExecutionRequest::new("test", "sleep 5", Duration::from_millis(200));
        let start = Instant::now();
        let err = executor().run(&request).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::Timeout);
        assert!(err.to_string().contains("timed out after"));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_every_pipeline_stage() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("survived");
        let command = format!(
            "sleep 5 | sh -c 'sleep 1 && touch {}'",
            marker.display()
        );
        let request = ExecutionRequest::new("test", command, Duration::from_millis(200));

        let err = executor().run(&request).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Timeout);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "a pipeline stage outlived the timeout");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_execution_error() {
        let err = executor()
            .run(&request("sh -c 'echo broken >&2; exit 3'"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::Execution);
        assert_eq!(err.exit_code(), Some(3));
        assert_eq!(err.stderr(), Some("broken\n"));
        assert_eq!(err.to_string(), "broken");
    }

    #[tokio::test]
    async fn test_empty_stderr_gets_generic_message() {
        let err = executor().run(&request("sh -c 'exit 4'")).await.unwrap_err();
        assert_eq!(err.to_string(), "Command failed with exit code 4");
        assert_eq!(err.stderr(), None);
    }

    #[tokio::test]
    async fn test_auth_failure_classified() {
        let tools = vec![
            CliToolDescriptor::new("test", "sh", "sh -c true").with_auth_hint("Log in first."),
        ];
        let executor = ProcessExecutor::new(ContextInjector::default(), 1000, "sh", tools);
        let err = executor
            .run(&request("sh -c 'echo error: Unauthorized >&2; exit 1'"))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::Authentication);
        assert!(err.to_string().contains("Unauthorized"));
        assert!(err.to_string().contains("Hint: Log in first."));
    }

    #[tokio::test]
    async fn test_output_truncated() {
        let executor = ProcessExecutor::new(ContextInjector::default(), 5, "sh", Vec::new());
        let output = executor.run(&request("echo 0123456789")).await.unwrap();
        assert!(output.output.starts_with("01234\n"));
        assert!(output.output.contains("output truncated"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_internal_error() {
        let err = executor()
            .run(&request("kubegate-no-such-binary get pods"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Internal);
    }

    #[tokio::test]
    async fn test_credentials_exported() {
        let mut credentials = ToolCredentials::new("KUBEGATE_TEST_URL", "KUBEGATE_TEST_TOKEN");
        credentials.url = Some("https://rancher.example.com".to_string());
        credentials.token = Some("token-123".to_string());

        let tools = vec![CliToolDescriptor::new("test", "sh", "sh -c true").with_credentials(credentials)];
        let executor = ProcessExecutor::new(ContextInjector::default(), 1000, "sh", tools);
        let output = executor
            .run(&request(r#"sh -c 'echo "$KUBEGATE_TEST_URL $KUBEGATE_TEST_TOKEN"'"#))
            .await
            .unwrap();

        assert_eq!(output.output, "https://rancher.example.com token-123\n");
    }

    #[tokio::test]
    async fn test_injected_line_reported() {
        let executor = ProcessExecutor::new(
            ContextInjector::new(Some("bar".to_string()), None),
            1000,
            "sh",
            Vec::new(),
        );
        // echo is not context aware, so nothing is injected
        let output = executor.run(&request("echo ok")).await.unwrap();
        assert_eq!(output.command, "echo ok");
    }
}
