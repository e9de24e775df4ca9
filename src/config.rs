// src/config.rs
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::Path};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerCfg,
    #[serde(default)]
    pub runtime: RuntimeCfg,
    #[serde(default)]
    pub workload: WorkloadCfg,
    #[serde(default)]
    pub diagnostic: DiagnosticCfg,
    #[serde(default)]
    pub logging: LoggingCfg,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        Self::from_yaml(&s)
    }

    pub fn from_yaml(s: &str) -> Result<Self> {
        let cfg: AppConfig = serde_yaml::from_str(s).context("parsing YAML config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let w = &self.workload;
        if w.min_delay_ms > w.max_delay_ms {
            bail!(
                "workload.min_delay_ms ({}) exceeds workload.max_delay_ms ({})",
                w.min_delay_ms,
                w.max_delay_ms
            );
        }
        if w.max_delay_ms.checked_add(w.penalty_ms).is_none() {
            bail!(
                "workload.max_delay_ms ({}) + workload.penalty_ms ({}) overflows",
                w.max_delay_ms,
                w.penalty_ms
            );
        }
        if w.penalty_every == 0 {
            bail!("workload.penalty_every must be at least 1");
        }
        if self.runtime.max_blocking_threads == 0 {
            bail!("runtime.max_blocking_threads must be at least 1");
        }
        if self.runtime.worker_threads == Some(0) {
            bail!("runtime.worker_threads must be at least 1 when set");
        }
        Ok(())
    }
}

/* ===== http server ===== */

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerCfg {
    pub bind: String, // "0.0.0.0:8080"
    /// How long shutdown waits for open connections to answer.
    pub shutdown_grace_ms: u64,
}

impl ServerCfg {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for ServerCfg {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            shutdown_grace_ms: 5000,
        }
    }
}

/* ===== tokio runtime ===== */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeCfg {
    /// None = one worker per core
    #[serde(default)]
    pub worker_threads: Option<usize>,
    #[serde(default = "default_max_blocking_threads")]
    pub max_blocking_threads: usize,
    #[serde(default = "default_thread_name")]
    pub thread_name: String, // prefix; threads become "<prefix>-<n>"
}

fn default_max_blocking_threads() -> usize {
    500
}

fn default_thread_name() -> String {
    "platform".to_string()
}

impl Default for RuntimeCfg {
    fn default() -> Self {
        Self {
            worker_threads: None,
            max_blocking_threads: default_max_blocking_threads(),
            thread_name: default_thread_name(),
        }
    }
}

/* ===== simulated workload ===== */

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadCfg {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub penalty_ms: u64,
    pub penalty_every: u64,
}

impl Default for WorkloadCfg {
    fn default() -> Self {
        Self {
            min_delay_ms: 50,
            max_delay_ms: 200,
            penalty_ms: 10,
            penalty_every: 10,
        }
    }
}

/* ===== diagnostics ===== */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticCfg {
    /// Case-insensitive substrings that mark a component as relevant.
    #[serde(default = "default_keywords")]
    pub relevant_keywords: Vec<String>,
}

fn default_keywords() -> Vec<String> {
    vec!["threads".into(), "tasks".into(), "threadbench".into()]
}

impl Default for DiagnosticCfg {
    fn default() -> Self {
        Self {
            relevant_keywords: default_keywords(),
        }
    }
}

/* ===== logging ===== */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingCfg {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_level")]
    pub level: String, // "debug" while testing
    #[serde(default = "default_format")]
    pub format: String, // "text" | "json"
    #[serde(default)]
    pub also_stdout: Option<bool>,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

impl Default for LoggingCfg {
    fn default() -> Self {
        Self {
            path: None,
            level: default_level(),
            format: default_format(),
            also_stdout: Some(true),
        }
    }
}
