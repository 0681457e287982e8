//! Best-effort detection of authentication failures from stderr text.
//!
//! CLI tools phrase these differently across versions and locales, so a miss
//! simply falls through to a plain execution error.

/// Lowercase substrings that mark a failure as auth related
pub const AUTH_ERROR_PATTERNS: &[&str] = &[
    "unauthorized",
    "forbidden",
    "unable to connect to the server",
    "connection refused",
    "no configuration has been provided",
    "invalid configuration",
    "error loading config file",
    "kubeconfig",
    "you must be logged in",
    "not logged in",
    "authentication required",
    "authentication failed",
    "token has expired",
    "invalid bearer token",
    "certificate signed by unknown authority",
    "credentials",
];

/// Whether stderr looks like an authentication or connectivity failure
pub fn is_auth_error(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    AUTH_ERROR_PATTERNS.iter().any(|pattern| lower.contains(pattern))
}

/// Build the message returned for an auth failure
pub fn auth_error_message(tool: &str, stderr: &str, hint: Option<&str>) -> String {
    let mut message = format!("Authentication error running {}: {}", tool, stderr.trim());
    if let Some(hint) = hint {
        message.push_str("\n\nHint: ");
        message.push_str(hint);
    }
    message
}
