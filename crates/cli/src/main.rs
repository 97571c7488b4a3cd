//! `flowctl` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate` — check a graph JSON file edge by edge and print its execution order.
//! - `run`      — preview-run a graph with simulated node effects.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use engine::{EngineConfig, Graph, InMemorySink, LogEntry, RunController};
use nodes::SimulatedExecutor;

#[derive(Parser)]
#[command(
    name = "flowctl",
    about = "Validate and preview-run automation graphs",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a graph definition JSON file.
    Validate {
        /// Path to the graph JSON file.
        path: PathBuf,
    },
    /// Run a graph with simulated effects and print the final state.
    Run {
        /// Path to the graph JSON file.
        path: PathBuf,
        /// Engine configuration (TOML).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Pause between steps in milliseconds; overrides the config.
        #[arg(long)]
        speed: Option<u64>,
        /// Seed for the simulated success rolls; overrides the config.
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("engine=info,nodes=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { path } => validate(&path),
        Command::Run {
            path,
            config,
            speed,
            seed,
        } => run(&path, config.as_deref(), speed, seed).await,
    }
}

fn load_graph(path: &Path) -> anyhow::Result<Graph> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    serde_json::from_str(&content).context("invalid graph JSON")
}

/// Replays every edge through the connection validator so the file gets
/// the same checks as interactive editing.
fn validate(path: &Path) -> anyhow::Result<()> {
    let loaded = load_graph(path)?;

    let mut rebuilt = Graph::new();
    let mut rejected = 0usize;
    for node in loaded.nodes.iter().cloned() {
        if let Err(e) = rebuilt.add_node(node) {
            eprintln!("❌ {e}");
            rejected += 1;
        }
    }
    for edge in loaded.edges.iter().cloned() {
        let label = format!("{} -> {}", edge.source, edge.target);
        if let Err(reason) = rebuilt.connect(edge) {
            eprintln!("❌ Edge {label} rejected: {reason}");
            rejected += 1;
        }
    }

    match engine::validate_graph(&loaded) {
        Ok(order) if rejected == 0 => {
            println!("✅ Graph is valid. Execution order: {order:?}");
            Ok(())
        }
        Ok(_) => bail!("{rejected} node(s) or edge(s) rejected"),
        Err(e) => bail!("validation failed: {e}"),
    }
}

/// Feed every log entry to `emit` until the sink goes away.  Entries lost
/// to a slow reader are reported and skipped.
async fn drain_logs(mut logs: broadcast::Receiver<LogEntry>, mut emit: impl FnMut(&LogEntry)) {
    loop {
        match logs.recv().await {
            Ok(entry) => emit(&entry),
            Err(RecvError::Lagged(missed)) => warn!(missed, "log output fell behind, entries dropped"),
            Err(RecvError::Closed) => break,
        }
    }
}

async fn run(
    path: &Path,
    config_path: Option<&Path>,
    speed: Option<u64>,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    let graph = load_graph(path)?;
    let mut config = match config_path {
        Some(p) => EngineConfig::load(p)?,
        None => EngineConfig::default(),
    };
    if let Some(ms) = speed {
        config.controller.execution_speed_ms = ms;
    }
    if seed.is_some() {
        config.simulation.seed = seed;
    }

    let sink = Arc::new(InMemorySink::new(Duration::from_millis(
        config.controller.execution_speed_ms,
    )));
    let executor = Arc::new(SimulatedExecutor::new(config.simulation.clone()));
    let controller = Arc::new(RunController::new(
        graph.into_shared(),
        executor,
        sink.clone(),
        config.controller.clone(),
    ));

    let printer = tokio::spawn(drain_logs(sink.subscribe(), |entry| {
        println!("[{}] {} ({}): {}", entry.status, entry.node_name, entry.node_id, entry.message);
    }));

    let interrupt = tokio::spawn({
        let controller = controller.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping run");
                controller.stop().await;
            }
        }
    });

    info!(path = %path.display(), "starting run");
    controller.start().await?;
    interrupt.abort();
    let _ = interrupt.await;

    let state = sink.snapshot();
    // Dropping the sink's sender ends the printer once it drained the backlog.
    drop(controller);
    drop(sink);
    let _ = printer.await;

    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::NodeStatus;

    #[tokio::test]
    async fn log_drain_survives_falling_behind() {
        let (tx, rx) = broadcast::channel(2);
        for i in 0..5 {
            tx.send(LogEntry::new(format!("n{i}"), "node", NodeStatus::Success, "done"))
                .unwrap();
        }
        drop(tx);

        let mut seen = Vec::new();
        drain_logs(rx, |entry| seen.push(entry.node_id.clone())).await;
        assert_eq!(seen, vec!["n3", "n4"]);
    }
}
