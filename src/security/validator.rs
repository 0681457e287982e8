use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::command::{
    CommandParseError, contains_pipe, find_shell_operator, split_pipeline, tokenize,
};
use crate::config::tools::{CliToolDescriptor, default_tools};
use crate::security::is_allowed_pipe_command;
use crate::security::policy::PolicyStore;

const SHELLS: &[&str] = &["sh", "bash", "zsh", "ash", "dash", "ksh", "fish", "csh", "tcsh"];

/// awk program text that runs commands or loads extensions
const AWK_EXEC_MARKERS: &[&str] = &["system", "getline", "@load", "@include"];

/// awk options that read program text from files
const AWK_SHORT_FILE_FLAGS: &[&str] = &["-f", "-E", "-i", "-l"];
const AWK_LONG_FILE_FLAGS: &[&str] = &["--file", "--exec", "--include", "--load"];

const INTERACTIVE_FLAGS: &[&str] = &[
    "-i",
    "-t",
    "-it",
    "-ti",
    "--tty",
    "--stdin",
    "--tty=true",
    "--stdin=true",
];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Empty command")]
    EmptyCommand,

    #[error(transparent)]
    Malformed(#[from] CommandParseError),

    #[error("Unsupported tool: {0}")]
    UnsupportedTool(String),

    #[error("Tool '{0}' is not installed or not available on PATH")]
    ToolNotInstalled(String),

    #[error("Missing action for {0}: a subcommand is required")]
    MissingAction(String),

    #[error(
        "Interactive shells via kubectl exec are restricted. Run a specific command \
         (kubectl exec <pod> -- sh -c '<command>') or request an interactive session with -it"
    )]
    RestrictedExec,

    #[error("{message}")]
    RegexRule { pattern: String, message: String },

    #[error("Command matches dangerous pattern '{pattern}' and no safe pattern allows it")]
    DangerousCommand { pattern: String },

    #[error("Pipe stage {stage} uses '{command}', which is not an allowed pipe command")]
    DisallowedPipeStage { stage: usize, command: String },

    #[error("Pipe stage {stage} passes '{argument}' to {command}, which could run other programs")]
    UnsafePipeArgument {
        stage: usize,
        command: String,
        argument: String,
    },

    #[error("Shell operator '{0}' is not allowed in piped commands")]
    ShellOperator(String),
}

/// Whether commands are checked at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityMode {
    #[default]
    Strict,
    Permissive,
}

impl FromStr for SecurityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(SecurityMode::Strict),
            "permissive" => Ok(SecurityMode::Permissive),
            other => Err(format!("Unknown security mode: {}", other)),
        }
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityMode::Strict => write!(f, "strict"),
            SecurityMode::Permissive => write!(f, "permissive"),
        }
    }
}

pub struct CommandValidator {
    policy: Arc<PolicyStore>,
    mode: SecurityMode,
    /// binary name -> tool name
    binaries: HashMap<String, String>,
}

impl CommandValidator {
    pub fn new(policy: Arc<PolicyStore>, mode: SecurityMode) -> Self {
        let mut validator = Self {
            policy,
            mode,
            binaries: HashMap::new(),
        };
        validator.set_tools(&default_tools());
        validator
    }

    /// Replace the set of tools whose binaries may lead a command
    pub fn with_tools(mut self, tools: &[CliToolDescriptor]) -> Self {
        self.set_tools(tools);
        self
    }

    fn set_tools(&mut self, tools: &[CliToolDescriptor]) {
        self.binaries = tools
            .iter()
            .map(|tool| (tool.binary.clone(), tool.name.clone()))
            .collect();
    }

    pub fn mode(&self) -> SecurityMode {
        self.mode
    }

    pub fn policy(&self) -> &Arc<PolicyStore> {
        &self.policy
    }

    /// Validate a command, piped or not, on behalf of `tool`
    pub fn validate(&self, tool: &str, command: &str) -> Result<(), ValidationError> {
        let command = command.trim();

        if command.is_empty() {
            return Err(ValidationError::EmptyCommand);
        }

        if self.mode == SecurityMode::Permissive {
            warn!(
                "SECURITY: permissive mode, skipping validation of command: {}",
                command
            );
            return Ok(());
        }

        if contains_pipe(command) {
            self.validate_pipeline(tool, command)
        } else {
            self.validate_single(tool, command)
        }
    }

    fn validate_pipeline(&self, tool: &str, command: &str) -> Result<(), ValidationError> {
        // Pipelines go through a shell, so nothing but pipes may be interpreted there
        if let Some(operator) = find_shell_operator(command) {
            return Err(ValidationError::ShellOperator(operator.to_string()));
        }

        // The shell reads the whole line, so its quoting must balance as one unit
        tokenize(command)?;

        let stages = split_pipeline(command);
        self.validate_single(tool, &stages[0])?;

        for (idx, stage) in stages.iter().enumerate().skip(1) {
            let tokens = tokenize(stage)?;
            let leading = tokens.first().map(String::as_str).unwrap_or("");

            if !is_allowed_pipe_command(leading) {
                return Err(ValidationError::DisallowedPipeStage {
                    stage: idx + 1,
                    command: leading.to_string(),
                });
            }

            check_pipe_arguments(idx + 1, &tokens)?;
        }

        debug!("Pipeline with {} stages validated", stages.len());
        Ok(())
    }

    fn validate_single(&self, tool: &str, command: &str) -> Result<(), ValidationError> {
        let tokens = tokenize(command)?;

        let Some(binary) = tokens.first() else {
            return Err(ValidationError::EmptyCommand);
        };

        let policy_tool = self
            .resolve_tool(tool, binary)
            .ok_or_else(|| ValidationError::UnsupportedTool(binary.clone()))?;

        if tokens.len() < 2 {
            return Err(ValidationError::MissingAction(binary.clone()));
        }

        if policy_tool == "kubectl" && tokens.iter().any(|t| t == "exec") {
            check_exec(&tokens)?;
        }

        let snapshot = self.policy.snapshot();
        let Some(rules) = snapshot.tool(&policy_tool) else {
            return Ok(());
        };

        // Regex rules cannot be overridden by safe patterns
        if let Some(rule) = rules.regex.iter().find(|rule| rule.matches(command)) {
            return Err(ValidationError::RegexRule {
                pattern: rule.matcher.as_str().to_string(),
                message: rule.rejection_message(),
            });
        }

        for dangerous in &rules.dangerous {
            if !dangerous.matches(command) {
                continue;
            }

            if rules.safe.iter().any(|safe| safe.matches(command)) {
                debug!(
                    "Command matched dangerous pattern '{}' but a safe pattern allows it",
                    dangerous.matcher.as_str()
                );
                continue;
            }

            return Err(ValidationError::DangerousCommand {
                pattern: dangerous.matcher.as_str().to_string(),
            });
        }

        Ok(())
    }

    /// Map the leading binary to the tool whose rules apply
    fn resolve_tool(&self, tool: &str, binary: &str) -> Option<String> {
        if let Some(name) = self.binaries.get(binary) {
            return Some(name.clone());
        }
        // A tool the validator was not told about may still invoke itself
        (binary == tool).then(|| tool.to_string())
    }
}

/// Reject arguments that turn an allowed pipe utility into a program launcher
fn check_pipe_arguments(stage: usize, tokens: &[String]) -> Result<(), ValidationError> {
    let Some((command, args)) = tokens.split_first() else {
        return Ok(());
    };
    if command != "awk" {
        return Ok(());
    }

    let unsafe_arg = args.iter().find(|arg| {
        let file_flag = if arg.starts_with("--") {
            AWK_LONG_FILE_FLAGS
                .iter()
                .any(|flag| *arg == flag || arg.starts_with(&format!("{}=", flag)))
        } else {
            AWK_SHORT_FILE_FLAGS.iter().any(|flag| arg.starts_with(flag))
        };
        file_flag || AWK_EXEC_MARKERS.iter().any(|m| arg.contains(m)) || has_lone_pipe(arg)
    });

    match unsafe_arg {
        Some(arg) => Err(ValidationError::UnsafePipeArgument {
            stage,
            command: command.to_string(),
            argument: arg.to_string(),
        }),
        None => Ok(()),
    }
}

/// A `|` that is not half of `||`, as used by awk's `print | "cmd"`
fn has_lone_pipe(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.iter().enumerate().any(|(idx, &b)| {
        b == b'|'
            && bytes.get(idx + 1) != Some(&b'|')
            && (idx == 0 || bytes[idx - 1] != b'|')
    })
}

/// Reject `kubectl exec` invocations that open a bare shell
fn check_exec(tokens: &[String]) -> Result<(), ValidationError> {
    let (flags, remote) = match tokens.iter().position(|t| t == "--") {
        Some(idx) => (&tokens[..idx], &tokens[idx + 1..]),
        None => (tokens, tokens),
    };

    if flags
        .iter()
        .any(|t| t == "--help" || t == "-h" || t == "version")
    {
        return Ok(());
    }

    let Some(shell_idx) = remote.iter().position(|t| is_shell(t)) else {
        return Ok(());
    };

    if remote[shell_idx + 1..].iter().any(|t| t == "-c") {
        return Ok(());
    }

    if flags.iter().any(|t| INTERACTIVE_FLAGS.contains(&t.as_str())) {
        debug!("Interactive kubectl exec explicitly requested");
        return Ok(());
    }

    Err(ValidationError::RestrictedExec)
}

fn is_shell(token: &str) -> bool {
    let name = token.rsplit('/').next().unwrap_or(token);
    SHELLS.contains(&name)
}
