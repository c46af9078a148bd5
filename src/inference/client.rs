//! Ollama inference client.
//!
//! Lists installed models and streams `/api/generate` completions back to the
//! caller, either as a `Stream` of [`CommentChunk`]s or through per-chunk
//! callbacks. No retries: every failure goes straight back to the caller.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client as HttpClient;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::config::ClientConfig;
use super::errors::InferenceError;
use super::provider::CommentProvider;
use super::streaming::parse_ndjson_stream;
use super::types::{CommentChunk, GenerateRequest, TagsResponse};

// ─── InferenceClient ─────────────────────────────────────────────────────────

/// Client for a local Ollama server.
///
/// Holds only the HTTP connection pool and a read-only [`ClientConfig`], so a
/// single instance can serve any number of concurrent requests.
pub struct InferenceClient {
    http: HttpClient,
    config: ClientConfig,
}

impl InferenceClient {
    /// Create a client for the given configuration.
    ///
    /// Validates the base URL but does NOT touch the network.
    pub fn new(config: ClientConfig) -> Result<Self, InferenceError> {
        config.validate()?;

        let http = HttpClient::builder()
            .user_agent(concat!("codeglass/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| InferenceError::ConfigError {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { http, config })
    }

    /// Create a client from `CODEGLASS_BASE_URL_KEY` and the editor's model
    /// setting.
    pub fn from_env(model_setting: Option<&str>) -> Result<Self, InferenceError> {
        Self::new(ClientConfig::from_env(model_setting))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// The model name sent with every generate request.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    // ─── Model listing ───────────────────────────────────────────────────

    /// List the models installed on the server via `GET /api/tags`.
    ///
    /// Names are returned in the order the server reports them.
    pub async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        self.fetch_model_names().await.inspect_err(|e| {
            tracing::error!(base_url = %self.config.base_url, error = %e, "failed to list models");
        })
    }

    async fn fetch_model_names(&self) -> Result<Vec<String>, InferenceError> {
        let url = self.config.endpoint("/api/tags");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let body_text = response.text().await.map_err(|e| InferenceError::ConnectionFailed {
            endpoint: url.clone(),
            reason: format!("failed to read response body: {e}"),
        })?;

        let tags: TagsResponse =
            serde_json::from_str(&body_text).map_err(|e| InferenceError::InvalidResponse {
                endpoint: url.clone(),
                reason: e.to_string(),
            })?;

        let names: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
        tracing::debug!(url = %url, count = names.len(), "listed models");
        Ok(names)
    }

    // ─── Generation (stream) ─────────────────────────────────────────────

    /// Send a streaming generate request.
    ///
    /// Returns once the response headers arrive. The stream then yields one
    /// [`CommentChunk`] per non-empty `response` fragment, in delivery order.
    /// If `cancel` fires, either while waiting for headers or mid-stream, the
    /// connection is dropped and the caller sees `InferenceError::Cancelled`.
    pub async fn generate_stream(
        &self,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<impl Stream<Item = Result<CommentChunk, InferenceError>> + Send, InferenceError>
    {
        let url = self.config.endpoint("/api/generate");
        let body = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: true,
        };

        tracing::info!(
            url = %url,
            model = %body.model,
            prompt_len = prompt.len(),
            stream = body.stream,
            "=== GENERATE REQUEST ==="
        );

        let request = self.http.post(&url).json(&body).send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(InferenceError::Cancelled),
            result = request => result.map_err(|e| InferenceError::ConnectionFailed {
                endpoint: url.clone(),
                reason: e.to_string(),
            })?,
        };

        let status = response.status();
        if !status.is_success() {
            let body_text = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(InferenceError::Cancelled),
                text = response.text() => text.unwrap_or_default(),
            };
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: body_text,
            });
        }

        Ok(parse_ndjson_stream(response, cancel))
    }

    // ─── Generation (callbacks) ──────────────────────────────────────────

    /// Stream a comment for `prompt`, invoking callbacks per fragment.
    ///
    /// `code` is the source the prompt was built from; it is not sent. For
    /// each fragment `on_chunk(text)` runs, then `on_progress(chars)` with the
    /// fragment's own character count. Resolves once: `Ok(())` at end of
    /// stream, or the first error. No callback runs after cancellation.
    pub async fn generate_comment_stream<C, P>(
        &self,
        code: &str,
        prompt: &str,
        mut on_chunk: C,
        mut on_progress: P,
        cancel: &CancellationToken,
    ) -> Result<(), InferenceError>
    where
        C: FnMut(&str),
        P: FnMut(usize),
    {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("generate", %request_id, code_len = code.len());

        async move {
            let result = self
                .drive_callbacks(prompt, &mut on_chunk, &mut on_progress, cancel)
                .await;

            match &result {
                Ok(delivered) => {
                    tracing::info!(chunks = *delivered, "generation complete");
                }
                Err(e) if e.is_cancelled() => {
                    tracing::info!("generation cancelled by caller");
                }
                Err(e) => {
                    tracing::error!(error = %e, "error in generate_comment_stream");
                }
            }

            result.map(|_| ())
        }
        .instrument(span)
        .await
    }

    /// Pump the chunk stream into the callbacks. Returns the number of
    /// fragments delivered.
    async fn drive_callbacks<C, P>(
        &self,
        prompt: &str,
        on_chunk: &mut C,
        on_progress: &mut P,
        cancel: &CancellationToken,
    ) -> Result<usize, InferenceError>
    where
        C: FnMut(&str),
        P: FnMut(usize),
    {
        let stream = self.generate_stream(prompt, cancel.clone()).await?;
        futures::pin_mut!(stream);

        let mut delivered = 0;
        while let Some(item) = stream.next().await {
            let chunk = item?;
            on_chunk(&chunk.text);
            on_progress(chunk.progress);
            delivered += 1;
        }

        Ok(delivered)
    }
}

#[async_trait]
impl CommentProvider for InferenceClient {
    async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        InferenceClient::list_models(self).await
    }

    async fn generate_comment_stream(
        &self,
        code: &str,
        prompt: &str,
        on_chunk: &mut (dyn for<'s> FnMut(&'s str) + Send),
        on_progress: &mut (dyn FnMut(usize) + Send),
        cancel: &CancellationToken,
    ) -> Result<(), InferenceError> {
        InferenceClient::generate_comment_stream(self, code, prompt, on_chunk, on_progress, cancel)
            .await
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
