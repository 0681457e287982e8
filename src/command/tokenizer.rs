use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandParseError {
    #[error("Malformed command (unbalanced quotes or dangling escape): {0}")]
    MalformedCommand(String),
}

/// Split a command line into shell words.
///
/// Quotes are consumed and their content kept literally, so
/// `kubectl logs pod --since "1|2"` yields the token `1|2`.
pub fn tokenize(command: &str) -> Result<Vec<String>, CommandParseError> {
    shell_words::split(command)
        .map_err(|_| CommandParseError::MalformedCommand(command.to_string()))
}

/// First whitespace-delimited word of a command, without tokenizing.
pub fn first_word(command: &str) -> Option<&str> {
    command.split_whitespace().next()
}

/// Quote-aware scanner shared by the pipe helpers.
///
/// Calls `on_pipe` with the byte offset of every `|` that is neither escaped
/// nor inside single or double quotes. A backslash inside single quotes is a
/// literal character, as it is for `sh`.
fn scan_unquoted_pipes(command: &str, mut on_pipe: impl FnMut(usize)) {
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;

    for (idx, ch) in command.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }

        match ch {
            '\\' if !in_single => escaped = true,
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '|' if !in_single && !in_double => on_pipe(idx),
            _ => {}
        }
    }
}

/// Whether the command contains a pipe outside of quotes.
pub fn contains_pipe(command: &str) -> bool {
    let mut found = false;
    scan_unquoted_pipes(command, |_| found = true);
    found
}

/// Split a command on unquoted pipes into trimmed stage strings.
///
/// Empty input yields a single empty segment. A trailing empty segment is
/// dropped, interior empty segments (as in `a || b`) are kept so the
/// validator can reject them.
pub fn split_pipeline(command: &str) -> Vec<String> {
    if command.is_empty() {
        return vec![String::new()];
    }

    let mut stages = Vec::new();
    let mut start = 0;
    scan_unquoted_pipes(command, |idx| {
        stages.push(command[start..idx].trim().to_string());
        start = idx + 1;
    });

    let tail = command[start..].trim();
    if !tail.is_empty() {
        stages.push(tail.to_string());
    }

    stages
}

/// Find a shell control operator that a shell would interpret.
///
/// `;`, `&`, `<`, `>` and newlines only count outside quotes. Command
/// substitution (`` ` `` and `$(`) also counts inside double quotes, since
/// the shell expands it there.
pub fn find_shell_operator(command: &str) -> Option<&'static str> {
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    let mut chars = command.chars().peekable();

    while let Some(ch) = chars.next() {
        if escaped {
            escaped = false;
            continue;
        }

        match ch {
            '\\' if !in_single => escaped = true,
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            _ if in_single => {}
            '`' => return Some("`"),
            '$' if chars.peek() == Some(&'(') => return Some("$("),
            _ if in_double => {}
            ';' => return Some(";"),
            '&' => return Some("&"),
            '<' => return Some("<"),
            '>' => return Some(">"),
            '\n' => return Some("newline"),
            _ => {}
        }
    }

    None
}

/// Rebuild a command line from tokens.
///
/// Plain words stay bare; anything with whitespace, quotes or shell
/// metacharacters is quoted so the result splits back into the same tokens.
pub fn join_tokens<S: AsRef<str>>(tokens: &[S]) -> String {
    tokens
        .iter()
        .map(|token| {
            let token = token.as_ref();
            if needs_quoting(token) {
                shell_words::quote(token).into_owned()
            } else {
                token.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn needs_quoting(token: &str) -> bool {
    token.is_empty()
        || !token.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | ',' | '@' | '%' | '+')
        })
}
