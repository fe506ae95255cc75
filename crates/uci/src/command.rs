//! Commands sent from the analysis host to the engine.

use std::fmt;

/// Commands sent from GUI to engine.
#[derive(Debug, Clone, PartialEq)]
pub enum GuiCommand {
    /// Initialize UCI mode.
    Uci,
    /// Check if engine is ready.
    IsReady,
    /// Set up a position from FEN.
    Position { fen: String },
    /// Start calculating.
    Go(GoOptions),
    /// Quit the engine.
    Quit,
    /// Unknown command (for forward compatibility).
    Unknown(String),
}

/// Options for the `go` command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GoOptions {
    /// Search to this depth.
    pub depth: Option<u32>,
    /// Restrict the search to these moves.
    pub searchmoves: Vec<String>,
}

impl GoOptions {
    /// Fixed-depth search over all moves.
    pub fn depth(depth: u32) -> Self {
        Self {
            depth: Some(depth),
            searchmoves: Vec::new(),
        }
    }

    /// Restrict the search to a single candidate move.
    pub fn restricted_to(mut self, mv: impl Into<String>) -> Self {
        self.searchmoves.push(mv.into());
        self
    }
}

impl GuiCommand {
    /// Format as a UCI command line (without newline).
    pub fn to_uci(&self) -> String {
        self.to_string()
    }

    /// Parse a UCI command string.
    ///
    /// Only the subset this crate emits is understood; anything else comes
    /// back as [`GuiCommand::Unknown`].
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let mut parts = input.split_whitespace();

        match parts.next().unwrap_or("") {
            "uci" => GuiCommand::Uci,
            "isready" => GuiCommand::IsReady,
            "quit" => GuiCommand::Quit,
            "position" => match parts.next() {
                Some("fen") => GuiCommand::Position {
                    fen: parts.collect::<Vec<_>>().join(" "),
                },
                _ => GuiCommand::Unknown(input.to_string()),
            },
            "go" => GuiCommand::Go(Self::parse_go(parts)),
            _ => GuiCommand::Unknown(input.to_string()),
        }
    }

    fn parse_go<'a>(mut parts: impl Iterator<Item = &'a str>) -> GoOptions {
        let mut opts = GoOptions::default();
        let mut in_searchmoves = false;

        while let Some(token) = parts.next() {
            match token {
                "depth" => {
                    in_searchmoves = false;
                    opts.depth = parts.next().and_then(|s| s.parse().ok());
                }
                "searchmoves" => in_searchmoves = true,
                mv if in_searchmoves => opts.searchmoves.push(mv.to_string()),
                _ => {}
            }
        }

        opts
    }
}

impl fmt::Display for GuiCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuiCommand::Uci => write!(f, "uci"),
            GuiCommand::IsReady => write!(f, "isready"),
            GuiCommand::Position { fen } => write!(f, "position fen {}", fen),
            GuiCommand::Go(opts) => {
                write!(f, "go")?;
                if let Some(depth) = opts.depth {
                    write!(f, " depth {}", depth)?;
                }
                if !opts.searchmoves.is_empty() {
                    write!(f, " searchmoves {}", opts.searchmoves.join(" "))?;
                }
                Ok(())
            }
            GuiCommand::Quit => write!(f, "quit"),
            GuiCommand::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}
