//! Player hints derived from an engine analysis.
//!
//! Every hint is computed from a single [`AnalysisResult`]; nothing here
//! talks to the engine. Hints are advisory, so failures are folded into
//! [`Hint::Error`] rather than returned as errors.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::engine::EngineError;
use crate::evaluation::AnalysisResult;

/// Scores above this (in pawns) count as winning or as a likely tactic.
const DECISIVE: f64 = 3.0;
const CLEAR: f64 = 1.5;
const SLIGHT: f64 = 0.5;

/// Reasons a hint could not be produced.
#[derive(Error, Debug)]
pub enum HintError {
    /// The analysis has no usable best move.
    #[error("No usable move in analysis: {0}")]
    NoMove(String),
    /// The underlying analysis failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A move split into its squares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveSquares {
    pub from: String,
    pub to: String,
    /// Promotion piece letter, e.g. `q`.
    pub promotion: Option<String>,
}

impl MoveSquares {
    /// Split a UCI move such as `e2e4` or `e7e8q`.
    pub fn parse(mv: &str) -> Result<Self, HintError> {
        let invalid = || HintError::NoMove(mv.to_string());
        let from = mv.get(0..2).filter(|s| is_square(s)).ok_or_else(invalid)?;
        let to = mv.get(2..4).filter(|s| is_square(s)).ok_or_else(invalid)?;
        let promotion = mv.get(4..).ok_or_else(invalid)?;

        Ok(Self {
            from: from.to_string(),
            to: to.to_string(),
            promotion: (!promotion.is_empty()).then(|| promotion.to_string()),
        })
    }
}

fn is_square(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 2 && (b'a'..=b'h').contains(&bytes[0]) && (b'1'..=b'8').contains(&bytes[1])
}

/// Qualitative reading of a score from the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    Winning,
    ClearlyBetter,
    SlightlyBetter,
    Equal,
    SlightlyWorse,
    ClearlyWorse,
    Losing,
}

impl ScoreBand {
    pub fn from_score(score: f64) -> Self {
        if score > DECISIVE {
            ScoreBand::Winning
        } else if score > CLEAR {
            ScoreBand::ClearlyBetter
        } else if score > SLIGHT {
            ScoreBand::SlightlyBetter
        } else if score > -SLIGHT {
            ScoreBand::Equal
        } else if score > -CLEAR {
            ScoreBand::SlightlyWorse
        } else if score > -DECISIVE {
            ScoreBand::ClearlyWorse
        } else {
            ScoreBand::Losing
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScoreBand::Winning => "winning",
            ScoreBand::ClearlyBetter => "clearly better",
            ScoreBand::SlightlyBetter => "slightly better",
            ScoreBand::Equal => "approximately equal",
            ScoreBand::SlightlyWorse => "slightly worse",
            ScoreBand::ClearlyWorse => "clearly worse",
            ScoreBand::Losing => "losing",
        }
    }

    pub fn advice(&self) -> &'static str {
        match self {
            ScoreBand::Winning => "You have a winning position. Look for forcing moves or simplify to convert your advantage.",
            ScoreBand::ClearlyBetter => "You have a clear advantage. Consider trading pieces to simplify into a winning endgame.",
            ScoreBand::SlightlyBetter => "You have a slight advantage. Improve your piece positioning and look for tactical opportunities.",
            ScoreBand::Equal => "The position is balanced. Focus on improving your pieces and watch for tactical opportunities.",
            ScoreBand::SlightlyWorse => "You're at a slight disadvantage. Look for active counterplay and avoid further weaknesses.",
            ScoreBand::ClearlyWorse => "You're at a significant disadvantage. Seek counterplay and complicate the position.",
            ScoreBand::Losing => "You're in a difficult position. Look for tactical resources or defensive opportunities.",
        }
    }
}

impl fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for ScoreBand {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// A hint, tagged by kind when serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "hintType", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Hint {
    /// The full best move.
    BestMove {
        best_move: String,
        score: f64,
        from: String,
        to: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        promotion: Option<String>,
    },
    /// Which piece to move, without the destination.
    PieceSelection { from_square: String, message: String },
    /// General assessment and plan.
    Strategic {
        evaluation: ScoreBand,
        score: f64,
        advice: String,
    },
    /// Forcing-line alert, with the move that starts it.
    Tactical {
        message: String,
        best_move: String,
        from: String,
        to: String,
    },
    /// Every hint kind, from least to most revealing.
    All { hints: Vec<Hint> },
    /// The hint could not be produced. Serialized as a bare `{"error": ...}`.
    #[serde(untagged)]
    Error { error: String },
}

/// Selects which hint to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintKind {
    BestMove,
    PieceSelection,
    Strategic,
    Tactical,
    All,
}

impl HintKind {
    fn error_context(&self) -> &'static str {
        match self {
            HintKind::BestMove => "Failed to generate hint",
            HintKind::PieceSelection => "Failed to generate piece hint",
            HintKind::Strategic => "Failed to generate strategic hint",
            HintKind::Tactical => "Failed to generate tactical hint",
            HintKind::All => "Failed to generate hints",
        }
    }

    /// Fold a failed hint into [`Hint::Error`].
    pub fn settle(&self, hint: Result<Hint, HintError>) -> Hint {
        hint.unwrap_or_else(|e| Hint::Error {
            error: format!("{}: {}", self.error_context(), e),
        })
    }

    /// Produce this kind of hint from an analysis.
    pub fn derive(&self, analysis: &AnalysisResult) -> Hint {
        match self {
            HintKind::BestMove => self.settle(best_move_hint(analysis)),
            HintKind::PieceSelection => self.settle(piece_selection_hint(analysis)),
            HintKind::Strategic => strategic_hint(analysis),
            HintKind::Tactical => self.settle(tactical_hint(analysis)),
            HintKind::All => all_hints(analysis),
        }
    }
}

impl FromStr for HintKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best-move" | "bestMove" => Ok(HintKind::BestMove),
            "piece" | "pieceSelection" => Ok(HintKind::PieceSelection),
            "strategic" => Ok(HintKind::Strategic),
            "tactical" => Ok(HintKind::Tactical),
            "all" => Ok(HintKind::All),
            other => Err(format!("Unknown hint kind: {}", other)),
        }
    }
}

fn squares_of(analysis: &AnalysisResult) -> Result<MoveSquares, HintError> {
    if !analysis.has_move() {
        return Err(HintError::NoMove(analysis.best_move.clone()));
    }
    MoveSquares::parse(&analysis.best_move)
}

/// Reveal the best move, split into squares.
pub fn best_move_hint(analysis: &AnalysisResult) -> Result<Hint, HintError> {
    let squares = squares_of(analysis)?;
    Ok(Hint::BestMove {
        best_move: analysis.best_move.clone(),
        score: analysis.score,
        from: squares.from,
        to: squares.to,
        promotion: squares.promotion,
    })
}

/// Point at the piece to move without saying where it goes.
pub fn piece_selection_hint(analysis: &AnalysisResult) -> Result<Hint, HintError> {
    let squares = squares_of(analysis)?;
    Ok(Hint::PieceSelection {
        message: format!("Consider moving the piece at {}", squares.from),
        from_square: squares.from,
    })
}

/// Describe the position and suggest a plan.
pub fn strategic_hint(analysis: &AnalysisResult) -> Hint {
    let band = ScoreBand::from_score(analysis.score);
    Hint::Strategic {
        evaluation: band,
        score: analysis.score,
        advice: band.advice().to_string(),
    }
}

/// Flag a forced mate or a large advantage, else nudge towards the best move.
pub fn tactical_hint(analysis: &AnalysisResult) -> Result<Hint, HintError> {
    let squares = squares_of(analysis)?;
    let message = match analysis.forced_mate() {
        Some(n) => format!("There is a checkmate in {} moves!", n),
        None if analysis.score > DECISIVE => {
            "There's a strong tactical opportunity available!".to_string()
        }
        None => "Look for the best move in this position.".to_string(),
    };

    Ok(Hint::Tactical {
        message,
        best_move: analysis.best_move.clone(),
        from: squares.from,
        to: squares.to,
    })
}

/// All hints, from least to most revealing.
pub fn all_hints(analysis: &AnalysisResult) -> Hint {
    Hint::All {
        hints: [
            HintKind::Strategic,
            HintKind::PieceSelection,
            HintKind::Tactical,
            HintKind::BestMove,
        ]
        .iter()
        .map(|kind| kind.derive(analysis))
        .collect(),
    }
}
