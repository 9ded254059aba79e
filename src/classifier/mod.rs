//! The usefulness classification gate.
//!
//! Decides whether captured text is worth remembering before anything is
//! embedded or stored. See [`ClassificationGate::classify`].

pub mod gate;
pub mod parse;
pub mod prompt;
pub mod types;

pub use gate::{truncate_chars, ClassificationGate, GateConfig, CLASSIFIER_ERROR_REASON};
pub use prompt::PromptStyle;
pub use types::{ClassificationDecision, ClassificationRequest, Turn};
