//! UCI info line types.

use serde::{Deserialize, Serialize};

/// Score value the engine reports for a forced mate, in pawns.
pub const MATE_SCORE: f64 = 999.0;

/// Score in centipawns or mate distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Score {
    /// Centipawn score (100 = 1 pawn advantage).
    Cp(i32),
    /// Mate in N moves (positive = side to move mates, otherwise it is mated).
    Mate(i32),
}

impl Score {
    /// Converts the score to pawns.
    ///
    /// Centipawns are divided by 100. A mate score collapses to
    /// [`MATE_SCORE`], negated unless the side to move is the one mating.
    pub fn pawns(&self) -> f64 {
        match *self {
            Score::Cp(cp) => f64::from(cp) / 100.0,
            Score::Mate(n) if n > 0 => MATE_SCORE,
            Score::Mate(_) => -MATE_SCORE,
        }
    }

    /// Mate distance, if this is a mate score.
    pub fn mate(&self) -> Option<i32> {
        match *self {
            Score::Mate(n) => Some(n),
            Score::Cp(_) => None,
        }
    }
}

/// One parsed engine progress line.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InfoEvent {
    /// Search depth in plies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    /// Score evaluation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<Score>,
    /// Principal variation (best line found).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pv: Vec<String>,
}

impl InfoEvent {
    /// Create a new empty info event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Score in pawns, if the line carried one.
    pub fn pawns(&self) -> Option<f64> {
        self.score.as_ref().map(Score::pawns)
    }

    /// Mate distance, if the line carried a mate score.
    pub fn mate(&self) -> Option<i32> {
        self.score.as_ref().and_then(Score::mate)
    }

    /// Format as UCI info string.
    pub fn to_uci(&self) -> String {
        let mut parts = vec!["info".to_string()];

        if let Some(d) = self.depth {
            parts.push(format!("depth {}", d));
        }
        match self.score {
            Some(Score::Cp(cp)) => parts.push(format!("score cp {}", cp)),
            Some(Score::Mate(m)) => parts.push(format!("score mate {}", m)),
            None => {}
        }
        if !self.pv.is_empty() {
            parts.push(format!("pv {}", self.pv.join(" ")));
        }

        parts.join(" ")
    }

    /// Parse a UCI info line.
    ///
    /// Returns `None` unless the line starts with `info`. Fields that are
    /// missing or malformed are left empty; nothing here fails.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.first() != Some(&"info") {
            return None;
        }

        let mut info = InfoEvent::new();
        let mut i = 1; // Skip "info"

        while i < parts.len() {
            match parts[i] {
                "depth" => {
                    i += 1;
                    if i < parts.len() {
                        info.depth = parts[i].parse().ok();
                    }
                }
                "score" => {
                    i += 1;
                    if i + 1 < parts.len() {
                        let value = parts[i + 1].parse().ok();
                        match (parts[i], value) {
                            ("cp", Some(cp)) => info.score = Some(Score::Cp(cp)),
                            ("mate", Some(m)) => info.score = Some(Score::Mate(m)),
                            _ => {}
                        }
                        i += 1;
                    }
                }
                "pv" => {
                    i += 1;
                    while i < parts.len() && !is_info_keyword(parts[i]) {
                        info.pv.push(parts[i].to_string());
                        i += 1;
                    }
                    continue;
                }
                // Free text runs to the end of the line.
                "string" => break,
                _ => {}
            }
            i += 1;
        }

        Some(info)
    }
}

fn is_info_keyword(s: &str) -> bool {
    matches!(
        s,
        "depth"
            | "seldepth"
            | "multipv"
            | "score"
            | "nodes"
            | "nps"
            | "time"
            | "pv"
            | "currmove"
            | "currmovenumber"
            | "hashfull"
            | "tbhits"
            | "string"
    )
}

/// Builder for constructing InfoEvent.
#[derive(Default)]
pub struct InfoBuilder {
    info: InfoEvent,
}

impl InfoBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(mut self, d: u32) -> Self {
        self.info.depth = Some(d);
        self
    }

    pub fn score_cp(mut self, cp: i32) -> Self {
        self.info.score = Some(Score::Cp(cp));
        self
    }

    pub fn score_mate(mut self, moves: i32) -> Self {
        self.info.score = Some(Score::Mate(moves));
        self
    }

    pub fn pv<S: AsRef<str>>(mut self, moves: &[S]) -> Self {
        self.info.pv = moves.iter().map(|m| m.as_ref().to_string()).collect();
        self
    }

    pub fn build(self) -> InfoEvent {
        self.info
    }
}
