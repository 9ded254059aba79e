//! Parsing of the `DECISION:` / `REASON:` / `MEMORY:` response contract.
//!
//! Small local models drift from the requested format, so the decision is a
//! token test over the whole response rather than a prefix match: `USEFUL`
//! must appear and `DISCARD` must not (both case-insensitive). A response with
//! neither token is a discard.

/// Fields recovered from one backend response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub useful: bool,
    pub reason: String,
    /// Trimmed `MEMORY:` line content, when present and non-empty.
    pub memory: Option<String>,
}

pub fn parse_response(content: &str) -> ParsedResponse {
    let upper = content.to_ascii_uppercase();
    let useful = upper.contains("USEFUL") && !upper.contains("DISCARD");

    let reason = marker_line(content, &upper, "REASON:")
        .or_else(|| marker_line(content, &upper, "DECISION:"))
        .unwrap_or_default();

    let memory = marker_line(content, &upper, "MEMORY:").filter(|m| !m.is_empty());

    ParsedResponse {
        useful,
        reason,
        memory,
    }
}

/// Text following the first occurrence of `marker` up to the end of its line.
///
/// `upper` is `content.to_ascii_uppercase()`; ASCII case mapping keeps byte
/// offsets identical, so indexes found in `upper` are valid in `content`.
fn marker_line(content: &str, upper: &str, marker: &str) -> Option<String> {
    let start = upper.find(marker)? + marker.len();
    let rest = &content[start..];
    let line = rest.lines().next().unwrap_or("");
    Some(line.trim().to_string())
}
