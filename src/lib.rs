//! CodeGlass — streaming AI code comments from a local Ollama server.
//!
//! The editor host builds an [`InferenceClient`] from a [`ClientConfig`],
//! lists models, and streams comment text back through a `Stream` or
//! callbacks, cancelling with a [`CancellationToken`] when the user aborts.

pub mod inference;

pub use inference::{
    ClientConfig, CommentChunk, CommentProvider, InferenceClient, InferenceError,
};
pub use tokio_util::sync::CancellationToken;

/// Log file name inside the log directory.
const LOG_FILE_NAME: &str = "codeglass.log";

/// Rotated log files kept next to the current one.
const LOG_FILES_KEPT: u32 = 3;

/// Output format for [`init_tracing_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Return the platform-standard data directory for CodeGlass.
///
/// - macOS: `~/Library/Application Support/codeglass/`
/// - Windows: `{FOLDERID_RoamingAppData}\codeglass\`
/// - Linux: `$XDG_DATA_HOME/codeglass/` (fallback `~/.local/share/...`)
///
/// Falls back to `~/.codeglass/` only if none of the above can be resolved.
pub fn data_dir() -> std::path::PathBuf {
    if let Some(dir) = dirs::data_dir() {
        return dir.join("codeglass");
    }
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".codeglass")
}

/// Initialize the tracing subscriber, writing text logs under [`data_dir`].
///
/// Returns the log file path. The host calls this once at startup; later
/// calls fail because a global subscriber is already installed.
pub fn init_tracing() -> std::io::Result<std::path::PathBuf> {
    init_tracing_with(&data_dir(), LogFormat::Text)
}

/// Initialize the tracing subscriber in `log_dir`.
///
/// On each call:
/// 1. Rotates existing logs (codeglass.log → .1 → .2 → .3, keeps last 3).
/// 2. Opens a fresh log with a line-flushing writer for crash resilience.
/// 3. Logs a startup banner with the log path.
///
/// The filter comes from `RUST_LOG`, defaulting to `codeglass=info,warn`.
pub fn init_tracing_with(
    log_dir: &std::path::Path,
    format: LogFormat,
) -> std::io::Result<std::path::PathBuf> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    std::fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join(LOG_FILE_NAME);

    rotate_log_file(&log_path, LOG_FILES_KEPT);

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let flushing_writer = FlushingWriter::new(log_file);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("codeglass=info,warn"));

    let builder = fmt::fmt()
        .with_env_filter(filter)
        .with_writer(flushing_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false);

    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| std::io::Error::other(format!("tracing already initialized: {e}")))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_file = %log_path.display(),
        pid = std::process::id(),
        "=== CodeGlass starting ==="
    );

    Ok(log_path)
}

/// Rotate log files: `codeglass.log` → `codeglass.log.1` → `.2` → … → `.{keep}`.
///
/// Oldest file beyond `keep` is deleted. Missing files in the chain are skipped.
fn rotate_log_file(base_path: &std::path::Path, keep: u32) {
    let oldest = format!("{}.{keep}", base_path.display());
    let _ = std::fs::remove_file(&oldest);

    // Shift: .{n-1} → .{n}
    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base_path.display());
        let to = format!("{}.{}", base_path.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    if base_path.exists() {
        let to = format!("{}.1", base_path.display());
        let _ = std::fs::rename(base_path, &to);
    }
}

/// A writer that wraps `std::fs::File` and flushes after every write.
#[derive(Clone)]
struct FlushingWriter {
    file: std::sync::Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: std::sync::Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

impl std::io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self.file.lock().map_err(|e| {
            std::io::Error::other(format!("lock poisoned: {e}"))
        })?;
        let n = std::io::Write::write(&mut *f, buf)?;
        std::io::Write::flush(&mut *f)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self.file.lock().map_err(|e| {
            std::io::Error::other(format!("lock poisoned: {e}"))
        })?;
        std::io::Write::flush(&mut *f)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
