use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result, anyhow};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "ollama_chat=info";

pub fn default_log_path() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .ok_or_else(|| anyhow!("Could not determine cache directory"))?;

    Ok(cache_dir.join("ollama-chat").join("ollama-chat.log"))
}

/// Send tracing output to `path`. The terminal belongs to the UI, so nothing
/// is written to stdout or stderr. Keep the guard alive until exit.
pub fn init(path: &Path) -> Result<WorkerGuard> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("log path {} has no file name", path.display()))?;

    fs::create_dir_all(dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(guard)
}
