//! Request and decision types for the classification gate.

use serde::{Deserialize, Serialize};

/// One role-tagged turn of captured conversation or screen text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

fn default_role() -> String {
    "user".into()
}

impl Turn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Raw input to the gate. Turns are evaluated as one concatenated blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRequest {
    turns: Vec<Turn>,
}

impl ClassificationRequest {
    pub fn new(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    /// A request holding a single user turn.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(vec![Turn::new("user", text)])
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Turn contents joined by single spaces; empty contents are skipped.
    pub fn text(&self) -> String {
        self.turns
            .iter()
            .map(|t| t.content.as_str())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What the gate decided about a request.
///
/// Construct through [`ClassificationDecision::useful`] and
/// [`ClassificationDecision::discard`] so `extracted_text` is non-empty exactly
/// when `useful` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationDecision {
    pub useful: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub extracted_text: String,
}

impl ClassificationDecision {
    /// A positive decision. `extracted_text` must already be non-empty.
    pub(crate) fn useful(reason: impl Into<String>, extracted_text: String) -> Self {
        debug_assert!(!extracted_text.is_empty());
        Self {
            useful: true,
            reason: reason.into(),
            extracted_text,
        }
    }

    pub(crate) fn discard(reason: impl Into<String>) -> Self {
        Self {
            useful: false,
            reason: reason.into(),
            extracted_text: String::new(),
        }
    }
}
