use std::collections::HashMap;
use tracing::debug;

use crate::command::{contains_pipe, first_word, join_tokens, split_pipeline, tokenize};
use crate::config::{CliToolDescriptor, KubernetesConfig};
use crate::injection::classifier::{
    ContextAwareTool, NamespaceScope, classify, context_aware_tool, tool_tokens,
};

/// Adds default `--context` / `--namespace` flags to context-aware commands
#[derive(Debug, Clone, Default)]
pub struct ContextInjector {
    context: Option<String>,
    namespace: Option<String>,
    /// binary -> tool name, for tools configured with a non-default binary
    binaries: HashMap<String, String>,
}

impl ContextInjector {
    pub fn new(context: Option<String>, namespace: Option<String>) -> Self {
        Self {
            context,
            namespace,
            binaries: HashMap::new(),
        }
    }

    /// Recognize commands by the binaries of the configured tools
    pub fn with_tools(mut self, tools: &[CliToolDescriptor]) -> Self {
        self.binaries = tools
            .iter()
            .map(|tool| (tool.binary.clone(), tool.name.clone()))
            .collect();
        self
    }

    pub fn from_config(config: &KubernetesConfig) -> Self {
        Self::new(config.context.clone(), config.namespace.clone())
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Inject into a command, handling each pipe stage separately
    pub fn inject(&self, command: &str) -> String {
        if self.context.is_none() && self.namespace.is_none() {
            return command.to_string();
        }

        if !contains_pipe(command) {
            return self.inject_single(command);
        }

        split_pipeline(command)
            .iter()
            .map(|stage| self.inject_single(stage))
            .collect::<Vec<_>>()
            .join(" | ")
    }

    /// Inject into one non-piped command
    ///
    /// Never fails: commands that are not for a context-aware tool, that do
    /// not tokenize, or that need no flags come back unchanged.
    pub fn inject_single(&self, command: &str) -> String {
        let Some(tool) = first_word(command).and_then(|binary| self.resolve(binary)) else {
            return command.to_string();
        };

        let tokens = match tokenize(command) {
            Ok(tokens) => tokens,
            Err(e) => {
                debug!("Skipping context injection: {}", e);
                return command.to_string();
            }
        };

        let flags = self.flags_for(tool, &tokens);
        if flags.is_empty() {
            return command.to_string();
        }

        debug!("Injecting {:?} into {} command", flags, tool.name);

        let mut rebuilt = Vec::with_capacity(tokens.len() + flags.len());
        rebuilt.push(tokens[0].clone());
        rebuilt.extend(flags);
        rebuilt.extend(tokens.into_iter().skip(1));

        join_tokens(&rebuilt)
    }

    fn resolve(&self, binary: &str) -> Option<&'static ContextAwareTool> {
        let name = self.binaries.get(binary).map(String::as_str).unwrap_or(binary);
        context_aware_tool(name)
    }

    fn flags_for(&self, tool: &ContextAwareTool, tokens: &[String]) -> Vec<String> {
        let own = tool_tokens(tokens);
        let mut flags = Vec::new();

        if let Some(context) = &self.context {
            if !own.iter().any(|t| t.starts_with(tool.context_flag)) {
                flags.push(format!("{}={}", tool.context_flag, context));
            }
        }

        if let Some(namespace) = &self.namespace {
            if needs_namespace(tool, tokens) {
                flags.push(format!("--namespace={}", namespace));
            }
        }

        flags
    }
}

fn needs_namespace(tool: &ContextAwareTool, tokens: &[String]) -> bool {
    let own = tool_tokens(tokens);

    let has_namespace = own
        .iter()
        .any(|t| t.starts_with("--namespace") || t.starts_with("-n"));
    let all_namespaces = own
        .iter()
        .any(|t| t == "-A" || t.starts_with("--all-namespaces"));

    !has_namespace && !all_namespaces && classify(tool, tokens) == NamespaceScope::Namespaced
}
