//! Chess position analysis with Stockfish integration.
//!
//! This crate supervises a single UCI engine process and layers a result
//! cache, game analysis, move quality classification and player hints on top
//! of it.
//!
//! # Overview
//!
//! - [`EngineSession`] - Handshake, searches and crash recovery for one engine
//! - [`ResultCache`] - Time-limited cache of analysis results
//! - [`GameAnalyzer`] - Analyzes position sequences and classifies played moves
//! - [`Hint`] - Player hints derived from an analysis
//! - [`AnalysisService`] - Thread-safe facade tying the pieces together
//!
//! # Example
//!
//! ```ignore
//! use chess_analysis::{AnalysisConfig, AnalysisService};
//!
//! let service = AnalysisService::new(AnalysisConfig::default())?;
//! let analysis = service.analyze_position(fen, 15)?;
//! println!("{} ({:+.2})", analysis.best_move, analysis.score);
//! ```

pub mod analyzer;
pub mod cache;
pub mod channel;
pub mod config;
pub mod engine;
pub mod evaluation;
pub mod hints;
pub mod quality;
pub mod service;

#[cfg(test)]
mod testing;

pub use analyzer::{AnalysisLimits, AnalyzerError, GameAnalyzer, PositionAnalyzer};
pub use cache::{CacheKey, CacheSweeper, ResultCache};
pub use channel::{ChannelError, Launcher, LineChannel, ProcessLauncher};
pub use config::{AnalysisConfig, ConfigError};
pub use engine::{EngineError, EngineSession, EngineState, SessionTimeouts};
pub use evaluation::{AnalysisResult, SearchRequest};
pub use hints::{Hint, HintKind, ScoreBand};
pub use quality::{MoveAssessment, MoveQuality, TacticalReport};
pub use service::AnalysisService;
