//! Wire types for the Ollama HTTP API and the events the client emits.

use serde::{Deserialize, Serialize};

// ─── Request Types ───────────────────────────────────────────────────────────

/// Request body for `POST /api/generate`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub stream: bool,
}

// ─── Response Types ──────────────────────────────────────────────────────────

/// Response body of `GET /api/tags`.
///
/// Only `name` is read from each entry; size, digest and details are ignored.
#[derive(Debug, Deserialize)]
pub struct TagsResponse {
    pub models: Vec<TagModel>,
}

/// One installed model as reported by `/api/tags`.
#[derive(Debug, Deserialize)]
pub struct TagModel {
    pub name: String,
}

/// One JSON object from the `/api/generate` NDJSON stream.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateChunk {
    /// Text fragment produced since the previous object.
    #[serde(default)]
    pub response: Option<String>,
    /// Set on the final object of a generation.
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<String>,
    /// Number of tokens generated, reported on the final object.
    #[serde(default)]
    pub eval_count: Option<u64>,
    /// Server-side failure reported in-band.
    #[serde(default)]
    pub error: Option<String>,
}

// ─── Emitted Events ──────────────────────────────────────────────────────────

/// A decoded text fragment delivered to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentChunk {
    pub text: String,
    /// Character count of `text`. This is the size of this fragment only,
    /// not a running total.
    pub progress: usize,
}

impl CommentChunk {
    pub fn new(text: String) -> Self {
        let progress = text.chars().count();
        Self { text, progress }
    }
}
