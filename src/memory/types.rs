//! Record types for the memory store.

use serde::{Deserialize, Serialize};

/// A stored memory, matching the `memories` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// UUID v7 (time-sortable) primary key.
    pub id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub content: String,
    /// Arbitrary JSON object attached by the caller and the gate.
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// ISO 8601 last-modification timestamp (bumped on dedup).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Input to [`add_memory`](super::store::add_memory).
#[derive(Debug, Clone, Default)]
pub struct NewMemory {
    pub user_id: String,
    pub agent_id: Option<String>,
    pub content: String,
    /// Must be a JSON object or null.
    pub metadata: serde_json::Value,
    /// Preserved id for imports; a UUID v7 is generated when absent.
    pub id: Option<String>,
    /// Preserved creation time for imports; now when absent.
    pub created_at: Option<String>,
}

/// Outcome of an add.
#[derive(Debug, Clone, Serialize)]
pub struct AddResult {
    /// `true` if an existing near-duplicate was touched instead of inserting.
    pub deduplicated: bool,
    /// The new record, or the existing one on dedup.
    pub record: MemoryRecord,
}

/// A vector search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub record: MemoryRecord,
    /// Cosine similarity in `[-1, 1]`; higher is closer.
    pub score: f64,
    /// Raw L2 distance from the vector index.
    pub distance: f64,
}
