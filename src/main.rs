// main.rs
mod api; // routes + controllers
mod config;
mod counter;
mod delay;
mod error;
mod executor; // runs a call under one execution model
mod logger;
mod registry;
mod report; // ab result analysis
mod server;
mod shutdown;
mod simulator;
mod sleeper;
mod types;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpListener;

use crate::api::App;
use crate::config::{AppConfig, RuntimeCfg};
use crate::delay::DelaySpec;
use crate::logger::init_logger;
use crate::report::Analyzer;
use crate::shutdown::{Interrupt, graceful_shutdown};

#[derive(Parser, Debug)]
#[command(name = "threadbench")]
struct Cli {
    /// Path to YAML config
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Summarize ApacheBench result files
    Analyse {
        /// Directory holding `<test>_results.txt` files
        #[arg(short, long, default_value = "performance_results")]
        dir: PathBuf,
        /// Skip the CSV and JSON exports
        #[arg(long)]
        no_export: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) Load config
    let cfg = AppConfig::load(&cli.config)?;

    // 2) Logger
    init_logger(&cfg.logging)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            // 3) Runtime sized from config, then serve until ctrl-c
            let runtime = build_runtime(&cfg.runtime)?;
            runtime.block_on(run_server(cfg))
        }
        Command::Analyse { dir, no_export } => Analyzer::new(dir).run(!no_export),
    }
}

fn build_runtime(cfg: &RuntimeCfg) -> Result<tokio::runtime::Runtime> {
    let prefix = cfg.thread_name.clone();
    let next_id = AtomicUsize::new(1);

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder
        .enable_all()
        .max_blocking_threads(cfg.max_blocking_threads)
        .thread_name_fn(move || {
            let id = next_id.fetch_add(1, Ordering::Relaxed);
            format!("{prefix}-{id}")
        });
    if let Some(n) = cfg.worker_threads {
        builder.worker_threads(n);
    }
    builder.build().context("building tokio runtime")
}

async fn run_server(cfg: AppConfig) -> Result<()> {
    let interrupt = Interrupt::new();
    let app = Arc::new(App::new(&cfg, interrupt.clone()));

    let delays = DelaySpec::from(&cfg.workload);
    tracing::info!(
        min_ms = delays.min_ms,
        max_ms = delays.max_ms,
        upper_bound_ms = delays.upper_bound().as_millis() as u64,
        penalty_every = delays.penalty_every,
        components = app.registry().len(),
        "workload configured"
    );

    let listener = TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("binding {}", cfg.server.bind))?;

    tokio::spawn(graceful_shutdown(interrupt.clone()));

    // Run until ctrl-c fires the interrupt, then let open requests answer
    server::serve(listener, app, interrupt, cfg.server.shutdown_grace()).await?;
    tracing::info!("server stopped");
    Ok(())
}
