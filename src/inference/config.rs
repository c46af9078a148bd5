//! Client configuration loading and validation.
//!
//! The client itself never reads ambient state: it receives a [`ClientConfig`]
//! at construction. This module resolves that value from the environment, the
//! editor's model setting, or an optional `.codeglass/config.yaml` file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::errors::InferenceError;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Base URL of a default local Ollama install.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Model used when the editor setting is absent.
pub const DEFAULT_MODEL: &str = "codeglass:latest";

/// Environment variable that overrides the base URL.
pub const BASE_URL_ENV_KEY: &str = "CODEGLASS_BASE_URL_KEY";

/// Environment variable pointing at an explicit config file.
pub const CONFIG_PATH_ENV_KEY: &str = "CODEGLASS_CONFIG";

/// Config file location relative to a project directory.
const CONFIG_RELATIVE_PATH: &str = ".codeglass/config.yaml";

// ─── Public Types ────────────────────────────────────────────────────────────

/// Connection settings for one [`InferenceClient`](super::InferenceClient).
///
/// Immutable once the client is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl ClientConfig {
    /// Build a config from explicit values, applying defaults and normalization.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let model = model.into();
        Self::resolve(Some(&base_url), Some(&model))
    }

    /// Resolve a config from optional overrides.
    ///
    /// Empty or whitespace-only values count as unset, so the editor returning
    /// `""` for an unconfigured setting still yields the default.
    pub fn resolve(base_url: Option<&str>, model: Option<&str>) -> Self {
        let base_url = non_empty(base_url).unwrap_or(DEFAULT_BASE_URL);
        let model = non_empty(model).unwrap_or(DEFAULT_MODEL);

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// Resolve the base URL from `CODEGLASS_BASE_URL_KEY` and the model from
    /// the editor's `model` setting.
    pub fn from_env(model_setting: Option<&str>) -> Self {
        let base_url = std::env::var(BASE_URL_ENV_KEY).ok();
        Self::resolve(base_url.as_deref(), model_setting)
    }

    /// Check that the base URL is an absolute `http` or `https` URL.
    pub fn validate(&self) -> Result<(), InferenceError> {
        let url = reqwest::Url::parse(&self.base_url).map_err(|e| InferenceError::ConfigError {
            reason: format!("invalid base URL '{}': {e}", self.base_url),
        })?;

        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(InferenceError::ConfigError {
                reason: format!("unsupported URL scheme '{other}' in '{}'", self.base_url),
            }),
        }
    }

    /// Full URL for an API path such as `/api/tags`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// On-disk shape of `.codeglass/config.yaml`. Both keys are optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    model: Option<String>,
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Locate the config file.
///
/// Uses `CODEGLASS_CONFIG` if it names an existing file, otherwise searches
/// upward from `start` for `.codeglass/config.yaml`.
pub fn find_config_path(start: &Path) -> Result<PathBuf, InferenceError> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV_KEY) {
        let candidate = PathBuf::from(path);
        if candidate.is_file() {
            return Ok(candidate);
        }
        tracing::warn!(
            path = %candidate.display(),
            "{CONFIG_PATH_ENV_KEY} does not point at a file, searching upward instead"
        );
    }

    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_RELATIVE_PATH);
        if candidate.is_file() {
            return Ok(candidate);
        }
        if !dir.pop() {
            break;
        }
    }

    Err(InferenceError::ConfigError {
        reason: format!("could not find {CONFIG_RELATIVE_PATH}"),
    })
}

/// Load and parse a client config file.
///
/// Performs environment-variable interpolation on `${VAR_NAME}` and
/// `${VAR_NAME:-default}` before parsing. Missing keys take the defaults.
pub fn load_client_config(path: &Path) -> Result<ClientConfig, InferenceError> {
    let raw = std::fs::read_to_string(path).map_err(|e| InferenceError::ConfigError {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;

    let interpolated = interpolate_env_vars(&raw);

    // An empty file deserializes to `null`, which serde_yaml rejects for a struct.
    let file: ConfigFile = if interpolated.trim().is_empty() {
        ConfigFile::default()
    } else {
        serde_yaml::from_str(&interpolated).map_err(|e| InferenceError::ConfigError {
            reason: format!("failed to parse {}: {e}", path.display()),
        })?
    };

    let config = ClientConfig::resolve(file.base_url.as_deref(), file.model.as_deref());
    config.validate()?;

    tracing::debug!(
        path = %path.display(),
        base_url = %config.base_url,
        model = %config.model,
        "loaded client config"
    );

    Ok(config)
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve `VAR` or `VAR:-default`. Unset and empty both take the default.
fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((var_name, default)) => std::env::var(var_name)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string()),
        None => std::env::var(expr).unwrap_or_default(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
