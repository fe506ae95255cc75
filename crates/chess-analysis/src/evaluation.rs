//! Search requests and their results.

use serde::Serialize;
use uci::{GoOptions, InfoEvent};

/// Returned in place of a move when the engine never reported `bestmove`.
pub const NO_MOVE: &str = "no move";

/// One fixed-depth search of a FEN position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Position in FEN notation, passed to the engine verbatim.
    pub fen: String,
    /// Search depth in plies.
    pub depth: u32,
    /// Restrict the search to this move.
    pub searchmoves: Option<String>,
}

impl SearchRequest {
    pub fn new(fen: impl Into<String>, depth: u32) -> Self {
        Self {
            fen: fen.into(),
            depth,
            searchmoves: None,
        }
    }

    /// Search only `mv`, to score a move that was actually played.
    pub fn restricted_to(mut self, mv: impl Into<String>) -> Self {
        self.searchmoves = Some(mv.into());
        self
    }

    pub(crate) fn go_options(&self) -> GoOptions {
        let opts = GoOptions::depth(self.depth);
        match &self.searchmoves {
            Some(mv) => opts.restricted_to(mv.clone()),
            None => opts,
        }
    }
}

/// Result of one completed search.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Best move in UCI notation, `"none"` or [`NO_MOVE`].
    pub best_move: String,
    /// Last reported score in pawns, from the side to move; ±999 for mate.
    pub score: f64,
    /// Every scored info line, in arrival order.
    pub lines: Vec<InfoEvent>,
    /// The analyzed position.
    pub fen: String,
    /// The requested depth.
    pub depth: u32,
}

impl AnalysisResult {
    /// Whether the engine produced a playable move.
    pub fn has_move(&self) -> bool {
        self.best_move != NO_MOVE && self.best_move != uci::NONE_MOVE
    }

    /// First mate-for-us distance reported during the search.
    pub fn forced_mate(&self) -> Option<i32> {
        self.lines.iter().filter_map(InfoEvent::mate).find(|&n| n > 0)
    }
}
