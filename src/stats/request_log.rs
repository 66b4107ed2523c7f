//! Request logging formatter

use crate::backends::BackendId;
use crate::config::ServeMode;

/// Format a request log message in compact format
pub fn format_request_log(
    mode: ServeMode,
    preferred: BackendId,
    prompt: &str,
    instruction: Option<&str>,
) -> String {
    let mut parts = vec![format!("mode={}", mode), format!("api={}", preferred)];

    if let Some(instruction) = instruction.filter(|i| !i.trim().is_empty()) {
        parts.push(format!("instr={}ch", instruction.chars().count()));
    }

    parts.push(format!("\"{}\"", truncate_message(&normalize_whitespace(prompt))));

    format!("→ {}", parts.join(" "))
}

/// Format the completion line for a finished generation
pub fn format_completion_log(backend: BackendId, chars: usize, elapsed_ms: u128) -> String {
    format!("← api={} chars={} {}ms", backend, chars, elapsed_ms)
}

/// Convert newlines and tabs to single spaces, collapse multiple spaces
fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate message according to rules:
/// - If <= 100 chars: show all
/// - If > 100 chars: first 25 + " ... " + last 75
fn truncate_message(s: &str) -> String {
    const MAX_TOTAL: usize = 100;
    const PREFIX_LEN: usize = 25;
    const SUFFIX_LEN: usize = 75;
    const ELLIPSIS: &str = " ... ";

    let total = s.chars().count();
    if total <= MAX_TOTAL {
        return s.to_string();
    }

    let prefix: String = s.chars().take(PREFIX_LEN).collect();
    let suffix: String = s.chars().skip(total - SUFFIX_LEN).collect();

    format!("{}{}{}", prefix, ELLIPSIS, suffix)
}
