use tracing::info;

/// Decode process output, replacing invalid UTF-8 sequences
pub fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Cap output at `max_chars` characters, appending a marker when cut
pub fn truncate_output(output: String, max_chars: usize) -> String {
    let total = output.chars().count();
    if total <= max_chars {
        return output;
    }

    info!("Output truncated from {} to {} characters", total, max_chars);

    let cut = output
        .char_indices()
        .nth(max_chars)
        .map(|(idx, _)| idx)
        .unwrap_or(output.len());

    let mut truncated = output[..cut].to_string();
    truncated.push_str(&format!(
        "\n... (output truncated, {} of {} characters shown)",
        max_chars, total
    ));
    truncated
}
