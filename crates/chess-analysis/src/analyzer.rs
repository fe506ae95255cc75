//! Game analysis with move quality classification.
//!
//! This module provides the [`GameAnalyzer`] for analyzing sequences of
//! positions and classifying the moves played between them.

use std::sync::Arc;
use thiserror::Error;

use crate::engine::EngineError;
use crate::evaluation::AnalysisResult;
use crate::quality::{MoveAssessment, MoveQuality, TacticalReport};

/// Default cap on positions analyzed per game request.
pub const MAX_GAME_POSITIONS: usize = 30;
/// Default cap on moves assessed per tactics request.
pub const MAX_TACTICAL_MOVES: usize = 20;

/// Errors that can occur during game analysis.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// Error from the analysis engine.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
    /// Invalid game data was provided.
    #[error("Invalid game data: {0}")]
    InvalidGame(String),
}

/// Source of engine results for the analyzer.
pub trait PositionAnalyzer {
    /// Full analysis of a position; may be served from a cache.
    fn analyze(&self, fen: &str, depth: u32) -> Result<Arc<AnalysisResult>, EngineError>;

    /// Score of `fen` when the search is restricted to `mv`, in pawns.
    fn score_move(&self, fen: &str, mv: &str, depth: u32) -> Result<f64, EngineError>;
}

/// Request size limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisLimits {
    /// Positions beyond this count are dropped from game analysis.
    pub max_positions: usize,
    /// Moves beyond this count are dropped from tactics analysis.
    pub max_moves: usize,
}

impl Default for AnalysisLimits {
    fn default() -> Self {
        Self {
            max_positions: MAX_GAME_POSITIONS,
            max_moves: MAX_TACTICAL_MOVES,
        }
    }
}

/// Reject a game request with no positions.
pub fn validate_positions(fens: &[String]) -> Result<(), AnalyzerError> {
    if fens.is_empty() {
        return Err(AnalyzerError::InvalidGame("No positions provided".to_string()));
    }
    Ok(())
}

/// Reject a tactics request unless there is exactly one more position than
/// moves.
pub fn validate_tactics(fens: &[String], moves: &[String]) -> Result<(), AnalyzerError> {
    if fens.is_empty() || moves.is_empty() {
        return Err(AnalyzerError::InvalidGame(
            "Positions or moves not provided".to_string(),
        ));
    }
    if fens.len() != moves.len() + 1 {
        return Err(AnalyzerError::InvalidGame(
            "Should have one more position than moves".to_string(),
        ));
    }
    Ok(())
}

/// Analyzes sequences of positions through a [`PositionAnalyzer`].
pub struct GameAnalyzer<'a, A: PositionAnalyzer + ?Sized> {
    analyzer: &'a A,
    limits: AnalysisLimits,
}

impl<'a, A: PositionAnalyzer + ?Sized> GameAnalyzer<'a, A> {
    pub fn new(analyzer: &'a A, limits: AnalysisLimits) -> Self {
        Self { analyzer, limits }
    }

    /// Analyzes each position in order.
    ///
    /// Positions past [`AnalysisLimits::max_positions`] are silently
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns the first engine error; earlier results are discarded.
    pub fn analyze_game(
        &self,
        positions: &[String],
        depth: u32,
    ) -> Result<Vec<Arc<AnalysisResult>>, AnalyzerError> {
        let count = positions.len().min(self.limits.max_positions);
        if count < positions.len() {
            tracing::debug!(
                submitted = positions.len(),
                analyzed = count,
                "Truncating game analysis"
            );
        }

        positions[..count]
            .iter()
            .map(|fen| self.analyzer.analyze(fen, depth).map_err(AnalyzerError::from))
            .collect()
    }

    /// Finds the played moves that lost significant ground.
    ///
    /// For each move:
    /// 1. Analyzes the position before the move to get the best move and score.
    /// 2. Scores the played move with a search restricted to it.
    /// 3. Classifies the difference and keeps it if it is at least an
    ///    inaccuracy.
    ///
    /// `positions[i]` is the position in which `moves[i]` was played. A move
    /// whose restricted search fails is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the unrestricted analysis of a position fails.
    pub fn find_tactical_opportunities(
        &self,
        positions: &[String],
        moves: &[String],
        depth: u32,
    ) -> Result<TacticalReport, AnalyzerError> {
        let count = positions
            .len()
            .saturating_sub(1)
            .min(moves.len())
            .min(self.limits.max_moves);

        let mut opportunities = Vec::new();
        for (idx, (fen, actual_move)) in positions.iter().zip(moves).take(count).enumerate() {
            let analysis = self.analyzer.analyze(fen, depth)?;

            let actual_score = match self.analyzer.score_move(fen, actual_move, depth) {
                Ok(score) => score,
                Err(e) => {
                    tracing::warn!(
                        move_number = idx + 1,
                        mv = %actual_move,
                        error = %e,
                        "Failed to score played move"
                    );
                    continue;
                }
            };

            let score_difference = analysis.score - actual_score;
            let classification = MoveQuality::from_score_diff(score_difference);
            if classification.is_reportable() {
                opportunities.push(MoveAssessment {
                    move_number: idx + 1,
                    fen: fen.clone(),
                    actual_move: actual_move.clone(),
                    best_move: analysis.best_move.clone(),
                    score_difference,
                    classification,
                });
            }
        }

        Ok(TacticalReport { opportunities })
    }
}
