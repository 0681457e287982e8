use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::security::defaults::{
    DEFAULT_DANGEROUS_COMMANDS, DEFAULT_REGEX_RULES, DEFAULT_SAFE_PATTERNS,
};

#[derive(Debug, Error)]
pub enum PolicyLoadError {
    #[error("Failed to read policy file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse policy file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid regex rule '{pattern}' for {tool}: {source}")]
    InvalidRegex {
        tool: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    DangerousPrefix,
    SafePattern,
    RegexPattern,
}

/// How a rule is matched against the raw command text
#[derive(Debug, Clone)]
pub enum Matcher {
    Prefix(String),
    Regex(Regex),
}

impl Matcher {
    pub fn matches(&self, command: &str) -> bool {
        match self {
            Matcher::Prefix(prefix) => command.starts_with(prefix.as_str()),
            Matcher::Regex(regex) => regex.is_match(command),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Matcher::Prefix(prefix) => prefix,
            Matcher::Regex(regex) => regex.as_str(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PolicyRule {
    pub kind: RuleKind,
    pub matcher: Matcher,
    /// Rejection message, set for regex rules
    pub message: Option<String>,
}

impl PolicyRule {
    pub fn dangerous(prefix: impl Into<String>) -> Self {
        Self {
            kind: RuleKind::DangerousPrefix,
            matcher: Matcher::Prefix(prefix.into()),
            message: None,
        }
    }

    pub fn safe(prefix: impl Into<String>) -> Self {
        Self {
            kind: RuleKind::SafePattern,
            matcher: Matcher::Prefix(prefix.into()),
            message: None,
        }
    }

    pub fn regex(tool: &str, pattern: &str, message: impl Into<String>) -> Result<Self, PolicyLoadError> {
        let regex = Regex::new(pattern).map_err(|source| PolicyLoadError::InvalidRegex {
            tool: tool.to_string(),
            pattern: pattern.to_string(),
            source,
        })?;

        Ok(Self {
            kind: RuleKind::RegexPattern,
            matcher: Matcher::Regex(regex),
            message: Some(message.into()),
        })
    }

    pub fn matches(&self, command: &str) -> bool {
        self.matcher.matches(command)
    }

    /// Message reported when this rule rejects a command
    pub fn rejection_message(&self) -> String {
        match &self.message {
            Some(message) => message.clone(),
            None => format!("Command matches restricted pattern '{}'", self.matcher.as_str()),
        }
    }
}

/// The three rule collections bound to one tool
#[derive(Debug, Clone, Default)]
pub struct ToolPolicy {
    pub dangerous: Vec<PolicyRule>,
    pub safe: Vec<PolicyRule>,
    pub regex: Vec<PolicyRule>,
}

/// Built-in rules as plain data, before regex compilation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyDefinition {
    #[serde(default)]
    pub dangerous_commands: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub safe_patterns: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub regex_rules: HashMap<String, Vec<RegexRuleDefinition>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegexRuleDefinition {
    pub pattern: String,
    pub description: String,
}

impl PolicyDefinition {
    /// The rule set shipped with the crate
    pub fn builtin() -> Self {
        let dangerous_commands = DEFAULT_DANGEROUS_COMMANDS
            .iter()
            .map(|(tool, prefixes)| {
                (tool.to_string(), prefixes.iter().map(|p| p.to_string()).collect())
            })
            .collect();

        let safe_patterns = DEFAULT_SAFE_PATTERNS
            .iter()
            .map(|(tool, prefixes)| {
                (tool.to_string(), prefixes.iter().map(|p| p.to_string()).collect())
            })
            .collect();

        let regex_rules = DEFAULT_REGEX_RULES
            .iter()
            .map(|(tool, rules)| {
                let rules = rules
                    .iter()
                    .map(|(pattern, description)| RegexRuleDefinition {
                        pattern: pattern.to_string(),
                        description: description.to_string(),
                    })
                    .collect();
                (tool.to_string(), rules)
            })
            .collect();

        Self {
            dangerous_commands,
            safe_patterns,
            regex_rules,
        }
    }

    /// Parse an override file
    pub fn from_file(path: &Path) -> Result<Self, PolicyLoadError> {
        let contents = fs::read_to_string(path).map_err(|source| PolicyLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| PolicyLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Replace whole per-tool entries with the ones present in `other`
    ///
    /// Each section is handled on its own: a tool named only under
    /// `dangerous_commands` keeps its default safe patterns and regex rules.
    pub fn apply_override(&mut self, other: PolicyDefinition) {
        self.dangerous_commands.extend(other.dangerous_commands);
        self.safe_patterns.extend(other.safe_patterns);
        self.regex_rules.extend(other.regex_rules);
    }
}

/// An immutable, versioned view of the compiled rules
#[derive(Debug, Default)]
pub struct PolicySnapshot {
    version: u64,
    tools: HashMap<String, ToolPolicy>,
    warnings: Vec<String>,
}

impl PolicySnapshot {
    /// Compile a definition; invalid regex rules are skipped with a warning
    pub fn compile(definition: PolicyDefinition, version: u64) -> Self {
        let mut tools: HashMap<String, ToolPolicy> = HashMap::new();
        let mut warnings = Vec::new();

        for (tool, prefixes) in definition.dangerous_commands {
            tools.entry(tool).or_default().dangerous =
                prefixes.into_iter().map(PolicyRule::dangerous).collect();
        }

        for (tool, prefixes) in definition.safe_patterns {
            tools.entry(tool).or_default().safe =
                prefixes.into_iter().map(PolicyRule::safe).collect();
        }

        for (tool, rules) in definition.regex_rules {
            let mut compiled = Vec::with_capacity(rules.len());
            for rule in rules {
                match PolicyRule::regex(&tool, &rule.pattern, rule.description) {
                    Ok(rule) => compiled.push(rule),
                    Err(e) => {
                        warn!("Skipping policy rule: {}", e);
                        warnings.push(e.to_string());
                    }
                }
            }
            tools.entry(tool).or_default().regex = compiled;
        }

        Self {
            version,
            tools,
            warnings,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn tool(&self, tool: &str) -> Option<&ToolPolicy> {
        self.tools.get(tool)
    }

    /// Problems encountered while building this snapshot
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Process-wide holder of the current policy snapshot
///
/// Readers clone an `Arc` to the current snapshot and never see a partially
/// built one; `reload` builds a new snapshot off to the side and swaps the
/// pointer under a short write lock.
#[derive(Debug)]
pub struct PolicyStore {
    defaults: PolicyDefinition,
    override_path: Option<PathBuf>,
    current: RwLock<Arc<PolicySnapshot>>,
    next_version: AtomicU64,
}

impl PolicyStore {
    /// Build the store from defaults plus an optional override file
    pub fn load(defaults: PolicyDefinition, override_path: Option<PathBuf>) -> Self {
        let snapshot = Self::build(&defaults, override_path.as_deref(), 1);

        Self {
            defaults,
            override_path,
            current: RwLock::new(Arc::new(snapshot)),
            next_version: AtomicU64::new(2),
        }
    }

    /// Store with the built-in rules and no override file
    pub fn with_defaults() -> Self {
        Self::load(PolicyDefinition::builtin(), None)
    }

    /// Re-read the override file and publish a new snapshot
    pub fn reload(&self) -> Arc<PolicySnapshot> {
        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        let snapshot = Arc::new(Self::build(
            &self.defaults,
            self.override_path.as_deref(),
            version,
        ));

        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = Arc::clone(&snapshot);
        drop(current);

        info!("Policy reloaded (version {})", version);
        snapshot
    }

    /// The snapshot currently in effect
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        let current = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&*current)
    }

    pub fn override_path(&self) -> Option<&Path> {
        self.override_path.as_deref()
    }

    fn build(defaults: &PolicyDefinition, override_path: Option<&Path>, version: u64) -> PolicySnapshot {
        let mut definition = defaults.clone();
        let mut load_warning = None;

        if let Some(path) = override_path {
            if path.exists() {
                match PolicyDefinition::from_file(path) {
                    Ok(overrides) => {
                        debug!("Applying policy overrides from {}", path.display());
                        definition.apply_override(overrides);
                    }
                    Err(e) => {
                        warn!("{}; falling back to default policy", e);
                        load_warning = Some(e.to_string());
                    }
                }
            } else {
                debug!("Policy override file {} not found, using defaults", path.display());
            }
        }

        let mut snapshot = PolicySnapshot::compile(definition, version);
        if let Some(warning) = load_warning {
            snapshot.warnings.insert(0, warning);
        }
        snapshot
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}
