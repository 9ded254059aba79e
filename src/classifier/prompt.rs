//! System instructions sent to the classification backend.

use crate::backend::ChatMessage;

/// Which response contract the backend is asked to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStyle {
    /// `DECISION:` + `REASON:` lines.
    Reason,
    /// `DECISION:` + `REASON:` + `MEMORY:` (the extracted fact).
    Extract,
}

impl PromptStyle {
    pub fn from_config_str(s: &str) -> Option<Self> {
        match s {
            "reason" => Some(Self::Reason),
            "extract" => Some(Self::Extract),
            _ => None,
        }
    }
}

const CATEGORIES: &str = "USEFUL memories include:
- User preferences, goals, personal details
- Tasks, reminders, deadlines, action items
- Durable context worth recalling later
- Key decisions and insights

NOT useful (respond DISCARD):
- Greetings, small talk, \"hello\", \"thanks\"
- Transient text such as loading messages or \"please wait\"
- Incomplete thoughts or fragments
- Obvious or generic statements";

const REASON_FORMAT: &str = "Respond ONLY in this format:
DECISION: USEFUL or DISCARD
REASON: one line explanation";

const EXTRACT_FORMAT: &str = "Respond ONLY in this format:
DECISION: USEFUL or DISCARD
REASON: one line explanation
MEMORY: if USEFUL, the concise fact to store on one line";

/// Full system instruction for the given style.
pub fn system_prompt(style: PromptStyle) -> String {
    let format = match style {
        PromptStyle::Reason => REASON_FORMAT,
        PromptStyle::Extract => EXTRACT_FORMAT,
    };
    format!(
        "You are a memory classifier. Decide if the given text contains useful information worth remembering.\n\n{CATEGORIES}\n\n{format}"
    )
}

/// The two-message conversation for one classification call.
/// `text` must already be truncated to the input cap.
pub fn build_messages(style: PromptStyle, text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_prompt(style)),
        ChatMessage::user(format!("Classify this text:\n{text}")),
    ]
}
