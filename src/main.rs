use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use tablechime_lib::commands::{self, Command};
use tablechime_lib::library::ClipScanner;
use tablechime_lib::{parse_snapshot, CpalSink, NotificationEngine, Order, Settings, TableKey};

#[derive(Parser)]
#[command(name = "tablechime", version, about = "Play a per-table alert when new orders arrive")]
struct Cli {
    /// Settings file (JSON); defaults are used if it does not exist
    #[arg(long, global = true, default_value = "tablechime.json")]
    settings: PathBuf,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll an orders file and alert on new arrivals; reads operator commands from stdin
    Watch {
        /// JSON array of live orders, rewritten by the order source
        #[arg(long)]
        orders: PathBuf,

        /// Poll interval in seconds (overrides settings)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Play one table's alert and wait for it to finish
    Play { table: String },
    /// List tables that have a clip in the clip directory
    Scan,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match Settings::load(&cli.settings) {
        Ok(settings) => match cli.command {
            Commands::Watch { orders, interval } => {
                let secs = interval.unwrap_or(settings.polling.interval_secs).max(1);
                watch(&settings, &orders, Duration::from_secs(secs), cli.json).await
            }
            Commands::Play { table } => play(&settings, &table, cli.json).await,
            Commands::Scan => scan(&settings, cli.json),
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn print<T: Serialize + std::fmt::Display>(value: &T, json: bool) {
    if json {
        match serde_json::to_string(value) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!("failed to serialize output: {}", e),
        }
    } else {
        println!("{}", value);
    }
}

fn preload_keys(settings: &Settings) -> Result<Vec<TableKey>> {
    if settings.clips.auto_preload {
        let locator = settings.locator()?;
        match ClipScanner::scan(&locator) {
            Ok(keys) => return Ok(keys),
            Err(e) => tracing::warn!("clip scan failed, using configured tables: {:#}", e),
        }
    }
    Ok(settings.preload_keys())
}

fn build_engine(settings: &Settings, preload: &[TableKey]) -> Result<NotificationEngine<CpalSink>> {
    let sink = CpalSink::new(settings.playback.volume).context("failed to open audio output")?;
    let engine = NotificationEngine::new(Arc::new(sink), settings.locator()?, preload)?;
    tracing::info!(preloaded = engine.cache().len(), "notification engine ready");
    Ok(engine)
}

async fn read_orders(path: &Path) -> Result<Vec<Order>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_snapshot(&content).with_context(|| format!("failed to parse {}", path.display()))
}

async fn watch(settings: &Settings, orders: &Path, every: Duration, json: bool) -> Result<()> {
    let preload = preload_keys(settings)?;
    let engine = build_engine(settings, &preload)?;

    let mut ticker = tokio::time::interval(every);
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // A missing or half-written file skips this tick; the baseline is untouched
                match read_orders(orders).await {
                    Ok(snapshot) => {
                        let report = engine.on_snapshot(snapshot);
                        if json && (report.baseline || !report.arrivals.is_empty()) {
                            if let Ok(line) = serde_json::to_string(&report) {
                                println!("{}", line);
                            }
                        }
                    }
                    Err(e) => tracing::warn!("{:#}", e),
                }
            }
            line = stdin.next_line(), if stdin_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) | Err(_) => {
                        stdin_open = false;
                        continue;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(Command::Quit) => break,
                    Ok(command) => match commands::execute(&engine, &command) {
                        Ok(response) => print(&response, json),
                        Err(e) => eprintln!("{}", e),
                    },
                    Err(e) => eprintln!("{}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    engine.shutdown();
    Ok(())
}

async fn play(settings: &Settings, table: &str, json: bool) -> Result<()> {
    let engine = build_engine(settings, &[])?;
    let mut changes = engine.subscribe();

    let outcome = engine.manual_trigger(table)?;
    print(&commands::Response::Request(outcome), json);

    while engine.state().is_playing {
        if changes.changed().await.is_err() {
            break;
        }
    }
    engine.shutdown();
    Ok(())
}

fn scan(settings: &Settings, json: bool) -> Result<()> {
    let locator = settings.locator()?;
    let keys = ClipScanner::scan(&locator)?;
    if json {
        println!("{}", serde_json::to_string(&keys)?);
    } else {
        for key in &keys {
            println!("{}", locator.path_for(key).display());
        }
    }
    Ok(())
}
