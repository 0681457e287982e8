pub mod defaults;
pub mod policy;
pub mod validator;

pub use policy::{
    Matcher, PolicyDefinition, PolicyLoadError, PolicyRule, PolicySnapshot, PolicyStore,
    RuleKind, ToolPolicy,
};
pub use validator::{CommandValidator, SecurityMode, ValidationError};

/// Allowlist of generic utilities permitted after the first pipe stage
///
/// Only the first stage of a pipeline may invoke a governed CLI tool; every
/// later stage must start with one of these. Utilities that can launch other
/// programs (`env`, `sed`, `tar`, `nc`, `zip`) are left out. `awk` stays, with
/// its program-running forms rejected by the validator.
///
/// Adding a new utility requires careful security review.
pub const ALLOWED_PIPE_COMMANDS: &[&str] = &[
    // File inspection
    "cat",
    "ls",
    "file",
    "stat",
    "realpath",
    "basename",
    "dirname",
    // Text processing
    "grep",
    "egrep",
    "fgrep",
    "awk",
    "cut",
    "sort",
    "uniq",
    "wc",
    "head",
    "tail",
    "tr",
    "column",
    "paste",
    "fold",
    "nl",
    "rev",
    "jq",
    "yq",
    "base64",
    "less",
    "more",
    "diff",
    // System information
    "date",
    "uname",
    "whoami",
    "hostname",
    "id",
    "df",
    "du",
    "free",
    "ps",
    "echo",
    "printf",
    // Networking
    "ping",
    "dig",
    "nslookup",
    "host",
    "curl",
    "wget",
    "netstat",
    // Archives
    "gzip",
    "gunzip",
    "zcat",
    "unzip",
    "bzip2",
    "xz",
];

/// Whether a pipe stage may start with `command`
pub fn is_allowed_pipe_command(command: &str) -> bool {
    ALLOWED_PIPE_COMMANDS.contains(&command)
}
