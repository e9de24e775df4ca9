// src/logger.rs
use crate::config::LoggingCfg;
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::time::SystemTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

// keep the file guard alive so the appender background thread doesn't exit
static GUARD: OnceCell<WorkerGuard> = OnceCell::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

pub fn init_logger(cfg: &LoggingCfg) -> Result<()> {
    // Bridge `log` macros into `tracing` (hyper and friends still use `log`)
    let _ = LogTracer::init();

    let json = cfg.format.eq_ignore_ascii_case("json");
    let mut layers: Vec<BoxedLayer> = Vec::new();

    if let Some(path) = cfg.path.as_deref() {
        layers.push(file_layer(Path::new(path), json)?);
    }

    // stdout is on by default, and forced when there is no file sink
    if cfg.also_stdout.unwrap_or(true) || layers.is_empty() {
        layers.push(fmt_layer(std::io::stdout, json));
    }

    let subscriber = Registry::default()
        .with(layers)
        .with(env_filter(&cfg.level));
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("failed to set global tracing subscriber: {}", e))?;

    tracing::info!(
        file = cfg.path.as_deref().unwrap_or("-"),
        format = %cfg.format,
        "logging initialized"
    );
    Ok(())
}

/// Non-blocking writer to `path`, creating its directory first.
fn file_layer(path: &Path, json: bool) -> Result<BoxedLayer> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;
    let file_name = path
        .file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new("threadbench.log"));

    let (nb_file, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    let _ = GUARD.set(guard);
    Ok(fmt_layer(nb_file, json))
}

/// RUST_LOG wins; otherwise the configured level, with unknown levels read as "info".
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(normalize_level(level)))
}

fn normalize_level(level: &str) -> &'static str {
    match level.to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    }
}

fn fmt_layer<W>(writer: W, json: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_writer(writer).with_timer(SystemTime);
    if json {
        layer.json().boxed()
    } else {
        layer.compact().boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_levels_fall_back_to_info() {
        assert_eq!(normalize_level("DEBUG"), "debug");
        assert_eq!(normalize_level("Warn"), "warn");
        assert_eq!(normalize_level("verbose"), "info");
        assert_eq!(normalize_level(""), "info");
    }

    #[test]
    fn file_sink_creates_directory_and_keeps_guard() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("logs").join("bench.log");

        let layer = file_layer(&path, false).unwrap();
        assert!(path.parent().unwrap().is_dir());
        assert!(GUARD.get().is_some());

        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target = "logger_test", "written through the file sink");
        });
    }
}
