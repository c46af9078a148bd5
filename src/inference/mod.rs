//! Inference Client — streaming comment generation against a local Ollama server.
//!
//! This module handles all communication with the inference server:
//! - Model listing (`GET /api/tags`)
//! - Streaming generation (`POST /api/generate`) as a `Stream` or via callbacks
//! - NDJSON stream parsing, independent of network chunk boundaries
//! - Caller-driven cancellation through a `CancellationToken`
//! - Connection config from the environment or `.codeglass/config.yaml`
//!
//! No retry or fallback happens here: failures are logged and
//! returned to the caller.

pub mod client;
pub mod config;
pub mod errors;
pub mod provider;
pub mod streaming;
pub mod types;

#[cfg(test)]
mod test_server;

// Re-exports for convenience
pub use client::InferenceClient;
pub use config::{find_config_path, load_client_config, ClientConfig};
pub use errors::InferenceError;
pub use provider::CommentProvider;
pub use types::CommentChunk;
