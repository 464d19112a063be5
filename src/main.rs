//! Keystroke Heatmap - record key usage and render it as a heatmap

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use keystroke_heatmap::{
    config::{Backend, Config},
    heatmap::{HeatmapMapper, Metric},
    keyboard::KeyCodeResolver,
    persistence,
    render::TerminalRenderer,
    session::{open_backend, Recorder},
    AggregationStore,
};

#[derive(Parser)]
#[command(name = "keystroke-heatmap")]
#[command(version)]
#[command(about = "Record per-key press counts and hold times, then show them as a heatmap", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record key events until Ctrl-C, then save one snapshot
    Record {
        /// Snapshot directory (overrides the config file)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Input backend
        #[arg(short, long, value_enum)]
        backend: Option<Backend>,
    },
    /// Show a snapshot as a heatmap
    Show {
        /// Snapshot file (latest in the snapshot directory when omitted)
        file: Option<PathBuf>,

        /// Statistic used for coloring
        #[arg(short, long, value_enum)]
        metric: Option<Metric>,

        /// Print hex colors per key instead of a colored keyboard
        #[arg(long)]
        hex: bool,
    },
    /// List saved snapshots, oldest first
    List,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::load().unwrap_or_else(|e| {
        warn!("Ignoring unreadable config: {}", e);
        Config::default()
    });

    match cli.command {
        Commands::Record { out, backend } => record(&config, out, backend),
        Commands::Show { file, metric, hex } => show(&config, file, metric, hex),
        Commands::List => list(&config),
    }
}

fn snapshot_dir(config: &Config, out: Option<PathBuf>) -> Result<PathBuf> {
    match out {
        Some(dir) => Ok(dir),
        None => config
            .snapshot_dir()
            .context("no snapshot directory configured"),
    }
}

fn record(config: &Config, out: Option<PathBuf>, backend: Option<Backend>) -> Result<()> {
    let dir = snapshot_dir(config, out)?;
    let backend = backend.unwrap_or(config.recording.backend);

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))
            .context("failed to install Ctrl-C handler")?;
    }

    let store = Arc::new(AggregationStore::new());
    let handle = Recorder::new(store)
        .poll_interval(config.poll_interval())
        .spawn(move |tx| open_backend(backend, tx))
        .context("failed to start key listener")?;

    info!("Recording, press Ctrl-C to stop and save to {}", dir.display());
    let status_interval = config.status_interval();
    let mut last_status = Instant::now();

    while !shutdown.load(Ordering::SeqCst) {
        if !handle.is_running() {
            warn!("Key listener exited unexpectedly");
            break;
        }
        thread::sleep(Duration::from_millis(100));

        if let Some(interval) = status_interval {
            if last_status.elapsed() >= interval {
                let snapshot = handle.snapshot();
                info!(
                    "{} presses across {} keys so far",
                    snapshot.total_presses(),
                    snapshot.records.len()
                );
                last_status = Instant::now();
            }
        }
    }

    match handle.finish(&dir) {
        Ok(summary) => {
            println!("\nKeystroke Heatmap session complete.");
            println!("Snapshot: {}", summary.path.display());
            println!("Keys used: {}", summary.snapshot.records.len());
            println!("Presses: {}", summary.snapshot.total_presses());
            for (key, presses) in summary.snapshot.most_pressed(5) {
                let average = summary
                    .snapshot
                    .get(key)
                    .and_then(|r| r.average_hold())
                    .map(|d| format!("{:.1}ms avg hold", d.as_secs_f64() * 1000.0))
                    .unwrap_or_default();
                println!("  {:<14} {:>6}  {}", key.name(), presses, average);
            }
            println!(
                "Events: {} ({} repeats, {} unmapped)",
                summary.stats.events, summary.stats.repeats, summary.stats.unresolved
            );
            Ok(())
        }
        Err(err) => {
            error!("{}", err);
            let fallback = std::env::temp_dir().join("keystroke-heatmap");
            let path = err
                .retry(&fallback)
                .map_err(|e| anyhow!("snapshot lost, fallback save failed too: {}", e))?;
            warn!("Snapshot saved to fallback location {}", path.display());
            Ok(())
        }
    }
}

fn show(config: &Config, file: Option<PathBuf>, metric: Option<Metric>, hex: bool) -> Result<()> {
    let path = match file {
        Some(path) => path,
        None => {
            let dir = snapshot_dir(config, None)?;
            persistence::latest_snapshot(&dir)?
                .ok_or_else(|| anyhow!("no snapshots in {}", dir.display()))?
        }
    };

    let snapshot = persistence::load(&path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    let mapper = HeatmapMapper::new(metric.unwrap_or(config.heatmap.metric));

    let mut renderer = TerminalRenderer::new();
    mapper.apply(&snapshot, KeyCodeResolver::new().keys(), &mut renderer);

    println!(
        "{} ({}, by {})",
        path.display(),
        snapshot.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        mapper.metric().name()
    );
    if hex || config.heatmap.show_hex {
        print!("{}", renderer.render_table(&snapshot));
    } else {
        print!("{}", renderer.render_keyboard());
    }
    Ok(())
}

fn list(config: &Config) -> Result<()> {
    let dir = snapshot_dir(config, None)?;
    let files = persistence::list_snapshots(&dir)?;
    if files.is_empty() {
        println!("No snapshots in {}", dir.display());
        return Ok(());
    }

    for path in files {
        match persistence::load(&path) {
            Ok(snapshot) => println!(
                "{}  {} presses, {} keys",
                path.display(),
                snapshot.total_presses(),
                snapshot.records.len()
            ),
            Err(e) => println!("{}  unreadable: {}", path.display(), e),
        }
    }
    Ok(())
}
