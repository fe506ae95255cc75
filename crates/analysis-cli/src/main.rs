//! Chess Analysis - Stockfish analysis from the command line.
//!
//! Starts one engine, runs a single command against it and prints the result
//! as JSON on stdout. Logs go to stderr and are controlled by `RUST_LOG`.

use anyhow::Context;
use chess_analysis::{AnalysisConfig, AnalysisResult, AnalysisService, HintKind};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chess-analysis")]
#[command(about = "Analyze chess positions and games with Stockfish")]
struct Cli {
    /// Config file (defaults to analysis.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Engine executable, overriding the config file
    #[arg(long, global = true)]
    engine: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the best move for a position
    Evaluate {
        fen: String,
        /// Search depth (0 uses the configured default)
        #[arg(short, long, default_value = "0")]
        depth: u32,
    },
    /// Full analysis of a position
    Analyze {
        fen: String,
        #[arg(short, long, default_value = "0")]
        depth: u32,
    },
    /// Analyze every position in a file (one FEN per line)
    Game {
        file: PathBuf,
        #[arg(short, long, default_value = "0")]
        depth: u32,
    },
    /// Find inaccuracies, mistakes and blunders in a played game
    Tactics {
        /// Positions before each move, plus the final position
        file: PathBuf,
        /// Played moves in UCI notation, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        moves: Vec<String>,
        #[arg(short, long, default_value = "0")]
        depth: u32,
    },
    /// Get a hint: best-move, piece, strategic, tactical or all
    Hint {
        kind: HintKind,
        fen: String,
        #[arg(short, long, default_value = "0")]
        depth: u32,
    },
    /// Check that the engine responds
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AnalysisConfig::load_from(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => AnalysisConfig::load()?,
    };
    if let Some(engine) = cli.engine {
        config.engine_path = engine;
    }
    tracing::info!("Engine: {}", config.engine_path);

    let service = tokio::task::spawn_blocking(move || AnalysisService::new(config))
        .await?
        .context("Failed to start engine")?;
    let service = Arc::new(service);
    service.start_cache_sweeper();

    let worker = Arc::clone(&service);
    let command = cli.command;
    let outcome = tokio::select! {
        result = tokio::task::spawn_blocking(move || run(&worker, command)) => Some(result),
        _ = signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            None
        }
    };

    // Blocks until any in-flight search releases the session.
    let closing = Arc::clone(&service);
    tokio::task::spawn_blocking(move || closing.shutdown()).await?;

    if let Some(result) = outcome {
        let value = result??;
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}

fn run(service: &Arc<AnalysisService>, command: Commands) -> anyhow::Result<Value> {
    let value = match command {
        Commands::Evaluate { fen, depth } => {
            let best_move = service.evaluate_position(&fen, depth)?;
            json!({ "fen": fen, "bestMove": best_move })
        }
        Commands::Analyze { fen, depth } => {
            let analysis = service.analyze_position(&fen, depth)?;
            serde_json::to_value(&*analysis)?
        }
        Commands::Game { file, depth } => {
            let fens = read_fens(&file)?;
            let results = service
                .spawn_game_analysis(fens, depth)?
                .join()
                .map_err(|_| anyhow::anyhow!("Game analysis thread panicked"))??;
            let results: Vec<&AnalysisResult> = results.iter().map(|r| &**r).collect();
            json!({ "positions": results })
        }
        Commands::Tactics { file, moves, depth } => {
            let fens = read_fens(&file)?;
            let report = service.find_tactical_opportunities(&fens, &moves, depth)?;
            serde_json::to_value(&report)?
        }
        Commands::Hint { kind, fen, depth } => {
            serde_json::to_value(service.hint(kind, &fen, depth))?
        }
        Commands::Status => json!({
            "ready": service.check_engine_status(),
            "enginePath": service.engine_path(),
            "engineVersion": service.engine_version(),
            "cachedResults": service.cache().len(),
        }),
    };
    Ok(value)
}

/// One FEN per line; blank lines and `#` comments are skipped.
fn read_fens(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(parse_fens(&content))
}

fn parse_fens(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
