//! Reading git's output.

use std::process::Output;

/// Human-readable reason a git invocation failed.
///
/// stderr comes first, then stdout; whichever is empty is left out. With no
/// output at all the exit status is described instead.
pub fn failure_message(output: &Output) -> String {
    let streams: Vec<String> = [&output.stderr, &output.stdout]
        .into_iter()
        .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
        .filter(|text| !text.is_empty())
        .collect();

    if !streams.is_empty() {
        return streams.join("\n");
    }
    match output.status.code() {
        Some(code) => format!("git exited with code {}", code),
        None => "git was terminated by a signal".to_string(),
    }
}

/// First line of stdout, trimmed. Used for single-value plumbing commands.
pub fn first_line(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}
