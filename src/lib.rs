//! Local memory server with a usefulness gate in front of a SQLite vector store.
//!
//! Captured conversation and screen text is noisy. Before anything is written,
//! memgate asks a small local LLM whether the text is worth remembering:
//!
//! | Backend says | Outcome |
//! |---|---|
//! | `USEFUL` (and no `DISCARD`) | embedded and stored, optionally as the extracted `MEMORY:` line |
//! | `DISCARD`, or neither token | dropped, reason reported to the caller |
//! | nothing (unreachable, timeout, bad response) | stored anyway, reason `classifier_error` |
//!
//! # Architecture
//!
//! - **Gate**: any OpenAI-compatible chat endpoint (llama.cpp, Ollama,
//!   LM Studio, Cerebras), selected by a backend profile
//! - **Embeddings**: the same kind of endpoint's `/embeddings` route, or a local
//!   ONNX model
//! - **Storage**: SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec)
//!   for cosine search, plus an add/update/delete history
//! - **Transport**: HTTP (axum) on localhost for the capture app and browser
//!   extension
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`backend`] — Text-generation backends behind the [`backend::TextBackend`] trait
//! - [`classifier`] — The classification gate
//! - [`embedding`] — Text-to-vector embedding providers
//! - [`db`] — SQLite database initialization, schema, migrations, and health checks
//! - [`memory`] — Store, search, delete, stats, and record-shape normalization
//! - [`service`] — Gate → embed → store, shared by the HTTP API and the CLI
//! - [`api`] — axum router and handlers
//! - [`cli`] — Terminal commands

pub mod api;
pub mod backend;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod memory;
pub mod service;
