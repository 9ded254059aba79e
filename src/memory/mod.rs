//! Memory storage on top of the SQLite + sqlite-vec schema.
//!
//! All functions here are synchronous and take a `rusqlite::Connection`;
//! async callers run them on the blocking pool.

pub mod forget;
pub mod search;
pub mod shape;
pub mod stats;
pub mod store;
pub mod types;

pub use types::{AddResult, MemoryRecord, NewMemory, SearchHit};

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            embedding.len() * std::mem::size_of::<f32>(),
        )
    }
}

/// Cosine similarity of two unit vectors from their L2 distance.
pub fn l2_to_cosine(distance: f64) -> f64 {
    1.0 - (distance * distance) / 2.0
}

/// Largest L2 distance between unit vectors whose cosine similarity is at
/// least `threshold`.
pub fn cosine_threshold_to_l2(threshold: f64) -> f64 {
    (2.0 * (1.0 - threshold)).max(0.0).sqrt()
}
