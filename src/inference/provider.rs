//! Backend-agnostic interface for comment generation.
//!
//! The editor integration holds a `Box<dyn CommentProvider>` so the Ollama
//! client can be swapped for another backend without touching callers.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::errors::InferenceError;

/// A source of streamed code comments.
#[async_trait]
pub trait CommentProvider: Send + Sync {
    /// Names of the models the backend can serve, in the backend's order.
    async fn list_models(&self) -> Result<Vec<String>, InferenceError>;

    /// Stream a completion for `prompt`.
    ///
    /// `on_chunk` receives each text fragment as soon as it is decoded and
    /// `on_progress` is called right after it with that fragment's character
    /// count. Returns `Err(InferenceError::Cancelled)` if `cancel` fires first.
    async fn generate_comment_stream(
        &self,
        code: &str,
        prompt: &str,
        on_chunk: &mut (dyn for<'s> FnMut(&'s str) + Send),
        on_progress: &mut (dyn FnMut(usize) + Send),
        cancel: &CancellationToken,
    ) -> Result<(), InferenceError>;
}
