//! Move quality classification.

use serde::Serialize;
use std::fmt;

/// Smallest score loss, in pawns, worth reporting as an opportunity.
pub const REPORT_THRESHOLD: f64 = 0.7;

/// Classification of move quality based on evaluation loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MoveQuality {
    /// The best move in the position
    Best,
    /// Excellent move (minimal loss)
    Excellent,
    /// Good move (small loss)
    Good,
    /// Inaccuracy (noticeable loss)
    Inaccuracy,
    /// Mistake (significant loss)
    Mistake,
    /// Blunder (major loss)
    Blunder,
}

impl MoveQuality {
    /// Classify by the gap between the best move's score and the played
    /// move's score, in pawns. Only the magnitude matters.
    pub fn from_score_diff(diff: f64) -> Self {
        let loss = diff.abs();
        if loss < 0.1 {
            MoveQuality::Best
        } else if loss < 0.3 {
            MoveQuality::Excellent
        } else if loss < REPORT_THRESHOLD {
            MoveQuality::Good
        } else if loss < 1.5 {
            MoveQuality::Inaccuracy
        } else if loss < 3.0 {
            MoveQuality::Mistake
        } else {
            MoveQuality::Blunder
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            MoveQuality::Best => "Best Move",
            MoveQuality::Excellent => "Excellent Move",
            MoveQuality::Good => "Good Move",
            MoveQuality::Inaccuracy => "Inaccuracy",
            MoveQuality::Mistake => "Mistake",
            MoveQuality::Blunder => "Blunder",
        }
    }

    /// Whether a move of this quality is surfaced as an opportunity.
    pub fn is_reportable(&self) -> bool {
        *self >= MoveQuality::Inaccuracy
    }
}

impl fmt::Display for MoveQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for MoveQuality {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Assessment of one played move against the engine's choice.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveAssessment {
    /// 1-based index of the move in the submitted sequence.
    pub move_number: usize,
    /// Position before the move.
    pub fen: String,
    /// The move that was played (in UCI notation).
    pub actual_move: String,
    /// The best move according to the engine.
    pub best_move: String,
    /// Best score minus the played move's score, in pawns.
    pub score_difference: f64,
    /// Quality classification.
    pub classification: MoveQuality,
}

/// Moves worth the player's attention, in game order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TacticalReport {
    pub opportunities: Vec<MoveAssessment>,
}
