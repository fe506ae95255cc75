//! UCI (Universal Chess Interface) protocol library for driving analysis engines.
//!
//! This crate covers the host side of the protocol: formatting the commands
//! sent to an engine and turning the engine's output lines into typed events.
//! Parsing is pure and never fails; lines or fields that cannot be understood
//! are dropped.
//!
//! # Commands sent
//!
//! - `uci` - Initialize engine, get id and options
//! - `isready` / `readyok` - Synchronization
//! - `position fen <fen>` - Set position
//! - `go depth <d> [searchmoves <move>...]` - Start search
//! - `quit` - Exit engine
//!
//! # Lines understood
//!
//! - `Stockfish ...` version banner
//! - `uciok`, `readyok`
//! - `info ... score cp|mate <n> ... depth <d> ... pv <moves>`
//! - `bestmove <move> [ponder <move>]`

mod command;
mod info;

pub use command::{GoOptions, GuiCommand};
pub use info::{InfoBuilder, InfoEvent, Score, MATE_SCORE};

/// Move reported by `bestmove` when the engine has nothing to play.
pub const NONE_MOVE: &str = "none";

/// Prefix of the version banner Stockfish prints on startup.
pub const BANNER_PREFIX: &str = "Stockfish";

/// Events that matter while handshaking or probing liveness.
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeEvent {
    Banner(String),
    UciOk,
    ReadyOk,
}

/// Events that matter while a search is running.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    Info(InfoEvent),
    BestMove { mv: String, ponder: Option<String> },
}

/// Recognize a startup line: version banner, `uciok` or `readyok`.
pub fn parse_handshake_line(line: &str) -> Option<HandshakeEvent> {
    let line = line.trim();
    match line {
        "uciok" => Some(HandshakeEvent::UciOk),
        "readyok" => Some(HandshakeEvent::ReadyOk),
        _ if line.starts_with(BANNER_PREFIX) => Some(HandshakeEvent::Banner(line.to_string())),
        _ => None,
    }
}

/// Recognize a search line: `bestmove`, or an `info` line with a score.
///
/// Info lines without a score (currmove updates, strings) are ignored.
pub fn parse_search_line(line: &str) -> Option<SearchEvent> {
    let line = line.trim();
    if line.starts_with("bestmove") {
        return Some(parse_bestmove(line));
    }
    InfoEvent::parse(line)
        .filter(|info| info.score.is_some())
        .map(SearchEvent::Info)
}

fn parse_bestmove(line: &str) -> SearchEvent {
    let mut parts = line.split_whitespace().skip(1);
    let mv = match parts.next() {
        Some(mv) if mv != "ponder" => mv.to_string(),
        _ => NONE_MOVE.to_string(),
    };
    let ponder = match (parts.next(), parts.next()) {
        (Some("ponder"), Some(p)) => Some(p.to_string()),
        _ => None,
    };
    SearchEvent::BestMove { mv, ponder }
}
