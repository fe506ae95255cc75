//! Stockfish session: handshake, searches and recovery.
//!
//! An [`EngineSession`] owns at most one engine channel at a time and walks
//! it through the UCI exchange. UCI is strictly request/response, so callers
//! that share a session must serialize access to it; the session itself takes
//! `&mut self` for every exchange.

use std::time::{Duration, Instant};
use thiserror::Error;
use uci::{parse_handshake_line, parse_search_line, GuiCommand, HandshakeEvent, SearchEvent};

use crate::channel::{ChannelError, Launcher, LineChannel, ProcessLauncher, Received};
use crate::evaluation::{AnalysisResult, SearchRequest, NO_MOVE};

/// Maximum number of lines to read before giving up on a handshake response.
pub const MAX_UCI_LINES: usize = 1000;

/// Reported when the engine never printed a version banner.
pub const UNKNOWN_VERSION: &str = "Unknown";

/// Errors that can occur when working with the engine session.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine could not be started at all.
    #[error("Failed to start engine: {0}")]
    Launch(#[source] ChannelError),
    /// Engine failed to complete the UCI handshake.
    #[error("Engine initialization failed: {0}")]
    Handshake(String),
    /// Communication failed mid-session. The session has already been
    /// restarted (if possible) by the time the caller sees this.
    #[error("Error communicating with engine: {0}")]
    Communication(#[source] ChannelError),
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Handshaking,
    Ready,
    Searching,
    Faulted,
}

/// Timeouts applied to the receive loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    /// Limit for each of the `uciok` and `readyok` waits during startup.
    pub handshake: Option<Duration>,
    /// Limit for a whole search; `None` waits for `bestmove` indefinitely.
    pub search: Option<Duration>,
    /// Limit for the `isready` liveness check.
    pub status: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            handshake: Some(Duration::from_secs(10)),
            search: None,
            status: Duration::from_secs(2),
        }
    }
}

/// A supervised UCI engine.
pub struct EngineSession<L: Launcher = ProcessLauncher> {
    launcher: L,
    channel: Option<L::Channel>,
    state: EngineState,
    version: String,
    timeouts: SessionTimeouts,
}

impl EngineSession<ProcessLauncher> {
    /// Start the engine at `path` and complete the handshake.
    ///
    /// # Errors
    ///
    /// - `EngineError::Launch` if the executable is missing or cannot start
    /// - `EngineError::Handshake` if UCI initialization fails
    pub fn start(path: &str, timeouts: SessionTimeouts) -> Result<Self, EngineError> {
        let mut session = Self::new(ProcessLauncher::new(path), timeouts);
        session.initialize()?;
        Ok(session)
    }
}

impl<L: Launcher> EngineSession<L> {
    /// Create a session without launching anything yet.
    pub fn new(launcher: L, timeouts: SessionTimeouts) -> Self {
        Self {
            launcher,
            channel: None,
            state: EngineState::Uninitialized,
            version: UNKNOWN_VERSION.to_string(),
            timeouts,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Version banner captured during the last handshake.
    pub fn engine_version(&self) -> &str {
        &self.version
    }

    pub fn engine_path(&self) -> &str {
        self.launcher.path()
    }

    /// (Re)start the engine and run the `uci`/`isready` handshake.
    ///
    /// Any previous process is terminated first.
    pub fn initialize(&mut self) -> Result<(), EngineError> {
        self.close();
        self.state = EngineState::Handshaking;

        let channel = match self.launcher.launch() {
            Ok(channel) => channel,
            Err(e) => {
                self.state = EngineState::Faulted;
                return Err(EngineError::Launch(e));
            }
        };
        self.channel = Some(channel);

        match self.handshake() {
            Ok(()) => {
                self.state = EngineState::Ready;
                tracing::info!(
                    path = self.launcher.path(),
                    version = %self.version,
                    "Engine ready"
                );
                Ok(())
            }
            Err(e) => {
                self.close();
                self.state = EngineState::Faulted;
                Err(e)
            }
        }
    }

    fn handshake(&mut self) -> Result<(), EngineError> {
        let handshake_error = |e: ChannelError| EngineError::Handshake(e.to_string());

        self.send(&GuiCommand::Uci).map_err(handshake_error)?;
        let mut banner = None;
        self.await_handshake(HandshakeEvent::UciOk, &mut banner)?;
        if let Some(banner) = banner {
            self.version = banner;
        }

        self.send(&GuiCommand::IsReady).map_err(handshake_error)?;
        self.await_handshake(HandshakeEvent::ReadyOk, &mut None)
    }

    fn await_handshake(
        &mut self,
        target: HandshakeEvent,
        banner: &mut Option<String>,
    ) -> Result<(), EngineError> {
        let deadline = self.timeouts.handshake.map(|t| Instant::now() + t);

        for _ in 0..MAX_UCI_LINES {
            let line = match self.receive(deadline) {
                Ok(Received::Line(line)) => line,
                Ok(Received::EndOfStream) => {
                    return Err(EngineError::Handshake(
                        "Engine closed unexpectedly".to_string(),
                    ))
                }
                Err(e) => return Err(EngineError::Handshake(e.to_string())),
            };
            match parse_handshake_line(&line) {
                Some(HandshakeEvent::Banner(text)) => *banner = Some(text),
                Some(event) if event == target => return Ok(()),
                _ => {}
            }
        }

        Err(EngineError::Handshake(format!(
            "No {:?} within {} lines",
            target, MAX_UCI_LINES
        )))
    }

    /// Search a position and return only the best move.
    ///
    /// Returns [`NO_MOVE`] if the engine output ends without `bestmove`. The
    /// engine has already been restarted when that happens.
    pub fn evaluate(&mut self, request: &SearchRequest) -> Result<String, EngineError> {
        let outcome = self.search(request, |_| {})?;
        Ok(outcome.best_move.unwrap_or_else(|| NO_MOVE.to_string()))
    }

    /// Search a position, collecting every scored info line.
    ///
    /// An engine that exits before `bestmove` is reported as
    /// `EngineError::Communication`, after the session has been restarted.
    pub fn analyze_with_detail(
        &mut self,
        request: &SearchRequest,
    ) -> Result<AnalysisResult, EngineError> {
        let mut lines = Vec::new();
        let outcome = self.search(request, |info| lines.push(info))?;
        let best_move = outcome
            .best_move
            .ok_or(EngineError::Communication(ChannelError::Closed))?;

        Ok(AnalysisResult {
            best_move,
            score: outcome.score.unwrap_or(0.0),
            lines,
            fen: request.fen.clone(),
            depth: request.depth,
        })
    }

    /// Drive one `position`/`go` exchange, recovering the engine on failure.
    fn search<F>(&mut self, request: &SearchRequest, on_info: F) -> Result<SearchOutcome, EngineError>
    where
        F: FnMut(uci::InfoEvent),
    {
        self.ensure_ready()?;
        self.state = EngineState::Searching;

        match self.drive_search(request, on_info) {
            Ok(outcome) if outcome.best_move.is_none() => {
                tracing::warn!(fen = %request.fen, "Engine output ended before bestmove, restarting");
                self.recover();
                Ok(outcome)
            }
            Ok(outcome) => {
                self.state = EngineState::Ready;
                Ok(outcome)
            }
            Err(fault) => {
                tracing::warn!(fen = %request.fen, error = %fault, "Engine communication failed, restarting");
                self.recover();
                Err(EngineError::Communication(fault))
            }
        }
    }

    /// Drop the current process and run the handshake again.
    ///
    /// Leaves the session `Faulted` if the restart fails; the next search
    /// retries the launch.
    fn recover(&mut self) {
        self.state = EngineState::Faulted;
        if let Err(reinit) = self.initialize() {
            tracing::error!(error = %reinit, "Failed to reinitialize engine");
        }
    }

    fn drive_search<F>(
        &mut self,
        request: &SearchRequest,
        mut on_info: F,
    ) -> Result<SearchOutcome, ChannelError>
    where
        F: FnMut(uci::InfoEvent),
    {
        self.send(&GuiCommand::Position {
            fen: request.fen.clone(),
        })?;
        self.send(&GuiCommand::Go(request.go_options()))?;

        let deadline = self.timeouts.search.map(|t| Instant::now() + t);
        let mut score = None;

        loop {
            let line = match self.receive(deadline)? {
                Received::Line(line) => line,
                Received::EndOfStream => {
                    return Ok(SearchOutcome {
                        best_move: None,
                        score,
                    })
                }
            };
            match parse_search_line(&line) {
                Some(SearchEvent::BestMove { mv, .. }) => {
                    return Ok(SearchOutcome {
                        best_move: Some(mv),
                        score,
                    })
                }
                Some(SearchEvent::Info(info)) => {
                    score = info.pawns().or(score);
                    on_info(info);
                }
                None => {}
            }
        }
    }

    /// Check liveness with `isready`, waiting at most the status timeout.
    ///
    /// Never fails and never restarts the engine.
    pub fn check_status(&mut self) -> bool {
        let timeout = self.timeouts.status;
        let channel = match self.channel.as_mut() {
            Some(channel) => channel,
            None => return false,
        };
        if !channel.is_alive() {
            return false;
        }

        if channel.send_line(&GuiCommand::IsReady.to_uci()).is_err() {
            return false;
        }

        let deadline = Instant::now() + timeout;
        loop {
            match channel.receive_line(Some(deadline)) {
                Ok(Received::Line(line)) => {
                    if parse_handshake_line(&line) == Some(HandshakeEvent::ReadyOk) {
                        return true;
                    }
                    if Instant::now() > deadline {
                        return false;
                    }
                }
                Ok(Received::EndOfStream) | Err(_) => return false,
            }
        }
    }

    /// Ask the engine to quit and release the process. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(channel) = self.channel.as_mut() {
            let _ = channel.send_line(&GuiCommand::Quit.to_uci());
            tracing::info!(path = self.launcher.path(), "Engine shut down");
        }
        self.close();
        self.state = EngineState::Uninitialized;
    }

    fn ensure_ready(&mut self) -> Result<(), EngineError> {
        match self.state {
            EngineState::Ready => Ok(()),
            _ => self.initialize(),
        }
    }

    fn close(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.terminate();
        }
    }

    fn send(&mut self, command: &GuiCommand) -> Result<(), ChannelError> {
        let channel = self.channel.as_mut().ok_or(ChannelError::Closed)?;
        let text = command.to_uci();
        tracing::debug!(command = %text, "-> engine");
        channel.send_line(&text)
    }

    fn receive(&mut self, deadline: Option<Instant>) -> Result<Received, ChannelError> {
        let channel = self.channel.as_mut().ok_or(ChannelError::Closed)?;
        let received = channel.receive_line(deadline)?;
        if let Received::Line(line) = &received {
            tracing::trace!(line = %line, "<- engine");
        }
        Ok(received)
    }
}

impl<L: Launcher> Drop for EngineSession<L> {
    fn drop(&mut self) {
        self.close();
    }
}

struct SearchOutcome {
    /// `None` when the output ended before `bestmove`.
    best_move: Option<String>,
    score: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedEngine, ScriptedLauncher};

    const FEN: &str = "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3";

    fn ready_session(engine: &ScriptedEngine) -> EngineSession<ScriptedLauncher> {
        let mut session = EngineSession::new(engine.launcher(), SessionTimeouts::default());
        session.initialize().expect("scripted handshake succeeds");
        session
    }

    #[test]
    fn test_initialize_captures_banner() {
        let engine = ScriptedEngine::new();
        let session = ready_session(&engine);

        assert_eq!(session.state(), EngineState::Ready);
        assert_eq!(session.engine_version(), "Stockfish 16.1 by the Stockfish developers");
        assert_eq!(engine.sent(), vec!["uci", "isready"]);
    }

    #[test]
    fn test_initialize_without_banner_keeps_unknown_version() {
        let engine = ScriptedEngine::new().without_banner();
        let session = ready_session(&engine);
        assert_eq!(session.engine_version(), UNKNOWN_VERSION);
    }

    #[test]
    fn test_launch_failure_is_reported() {
        let engine = ScriptedEngine::new().failing_launch();
        let mut session = EngineSession::new(engine.launcher(), SessionTimeouts::default());

        match session.initialize() {
            Err(EngineError::Launch(ChannelError::NotFound(path))) => {
                assert_eq!(path, "scripted-engine");
            }
            other => panic!("Expected Launch error, got {:?}", other),
        }
        assert_eq!(session.state(), EngineState::Faulted);
    }

    #[test]
    fn test_handshake_fails_when_engine_exits() {
        let engine = ScriptedEngine::new().exit_on_uci();
        let mut session = EngineSession::new(engine.launcher(), SessionTimeouts::default());

        assert!(matches!(
            session.initialize(),
            Err(EngineError::Handshake(_))
        ));
        assert_eq!(session.state(), EngineState::Faulted);
    }

    #[test]
    fn test_evaluate_returns_bestmove() {
        let engine = ScriptedEngine::new().with_score("e2e4", 35);
        let mut session = ready_session(&engine);

        let mv = session.evaluate(&SearchRequest::new(FEN, 12)).unwrap();

        assert_eq!(mv, "e2e4");
        assert_eq!(
            engine.sent()[2..],
            [format!("position fen {}", FEN), "go depth 12".to_string()]
        );
        assert_eq!(session.state(), EngineState::Ready);
    }

    #[test]
    fn test_evaluate_without_bestmove_returns_no_move() {
        let engine = ScriptedEngine::new().with_score("d2d4", 15).exit_on_next_go();
        let mut session = ready_session(&engine);

        let mv = session.evaluate(&SearchRequest::new(FEN, 5)).unwrap();
        assert_eq!(mv, NO_MOVE);
        // The dead process is replaced before the call returns.
        assert_eq!(engine.launches(), 2);
        assert_eq!(engine.terminations(), 1);
        assert_eq!(session.state(), EngineState::Ready);

        assert_eq!(session.evaluate(&SearchRequest::new(FEN, 5)).unwrap(), "d2d4");
        assert_eq!(engine.launches(), 2);
    }

    #[test]
    fn test_analyze_reports_engine_exit_mid_search() {
        let engine = ScriptedEngine::new().with_score("d2d4", 15).exit_on_next_go();
        let mut session = ready_session(&engine);

        match session.analyze_with_detail(&SearchRequest::new(FEN, 5)) {
            Err(EngineError::Communication(ChannelError::Closed)) => {}
            other => panic!("Expected Communication(Closed), got {:?}", other),
        }
        assert_eq!(engine.launches(), 2);
        assert_eq!(session.state(), EngineState::Ready);
        assert!(session.check_status());

        let result = session
            .analyze_with_detail(&SearchRequest::new(FEN, 5))
            .unwrap();
        assert_eq!(result.best_move, "d2d4");
    }

    #[test]
    fn test_engine_exit_with_failed_restart_leaves_session_faulted() {
        let engine = ScriptedEngine::new().exit_on_go();
        let mut session = ready_session(&engine);
        engine.set_launch_failure(true);

        assert_eq!(session.evaluate(&SearchRequest::new(FEN, 5)).unwrap(), NO_MOVE);
        assert_eq!(session.state(), EngineState::Faulted);
        assert!(!session.check_status());
    }

    #[test]
    fn test_analyze_collects_info_lines_and_keeps_last_score() {
        let engine = ScriptedEngine::new().with_score("g1f3", -42);
        let mut session = ready_session(&engine);

        let result = session
            .analyze_with_detail(&SearchRequest::new(FEN, 3))
            .unwrap();

        assert_eq!(result.best_move, "g1f3");
        assert_eq!(result.score, -0.42);
        assert_eq!(result.depth, 3);
        assert_eq!(result.fen, FEN);
        // One scored line per depth; currmove chatter is dropped.
        assert_eq!(result.lines.len(), 3);
        assert_eq!(result.lines[2].depth, Some(3));
        assert_eq!(result.lines[2].pv, vec!["g1f3"]);
    }

    #[test]
    fn test_analyze_mate_score() {
        let engine = ScriptedEngine::new().with_mate("h5f7", 1);
        let mut session = ready_session(&engine);

        let result = session
            .analyze_with_detail(&SearchRequest::new(FEN, 2))
            .unwrap();

        assert_eq!(result.score, 999.0);
        assert_eq!(result.forced_mate(), Some(1));
    }

    #[test]
    fn test_searchmoves_are_forwarded() {
        let engine = ScriptedEngine::new()
            .with_score("e2e4", 50)
            .with_move_score("a2a3", -20);
        let mut session = ready_session(&engine);

        let result = session
            .analyze_with_detail(&SearchRequest::new(FEN, 4).restricted_to("a2a3"))
            .unwrap();

        assert_eq!(result.best_move, "a2a3");
        assert_eq!(result.score, -0.2);
        assert!(engine
            .sent()
            .contains(&"go depth 4 searchmoves a2a3".to_string()));
    }

    #[test]
    fn test_fault_restarts_engine_then_reports() {
        let engine = ScriptedEngine::new().with_score("e2e4", 10).fail_next_go();
        let mut session = ready_session(&engine);
        assert_eq!(engine.launches(), 1);

        let err = session
            .analyze_with_detail(&SearchRequest::new(FEN, 8))
            .unwrap_err();

        assert!(matches!(err, EngineError::Communication(_)));
        assert_eq!(engine.launches(), 2);
        assert_eq!(session.state(), EngineState::Ready);

        // The caller retries and the recovered session answers normally.
        let result = session
            .analyze_with_detail(&SearchRequest::new(FEN, 8))
            .unwrap();
        assert_eq!(result.best_move, "e2e4");
        assert_eq!(engine.launches(), 2);
    }

    #[test]
    fn test_failed_recovery_leaves_session_faulted_until_next_call() {
        let engine = ScriptedEngine::new().with_score("e2e4", 10).fail_next_go();
        let mut session = ready_session(&engine);
        engine.set_launch_failure(true);

        assert!(session.evaluate(&SearchRequest::new(FEN, 8)).is_err());
        assert_eq!(session.state(), EngineState::Faulted);

        engine.set_launch_failure(false);
        assert_eq!(session.evaluate(&SearchRequest::new(FEN, 8)).unwrap(), "e2e4");
        assert_eq!(session.state(), EngineState::Ready);
    }

    #[test]
    fn test_search_timeout_counts_as_fault() {
        let engine = ScriptedEngine::new().silent_on_go();
        let timeouts = SessionTimeouts {
            search: Some(Duration::from_millis(20)),
            ..SessionTimeouts::default()
        };
        let mut session = EngineSession::new(engine.launcher(), timeouts);
        session.initialize().unwrap();

        let err = session.evaluate(&SearchRequest::new(FEN, 30)).unwrap_err();
        match err {
            EngineError::Communication(ChannelError::Timeout) => {}
            other => panic!("Expected timeout fault, got {:?}", other),
        }
        assert_eq!(engine.launches(), 2);
    }

    #[test]
    fn test_check_status() {
        let engine = ScriptedEngine::new();
        let mut session = EngineSession::new(engine.launcher(), SessionTimeouts::default());
        assert!(!session.check_status(), "no process yet");

        session.initialize().unwrap();
        assert!(session.check_status());

        engine.kill();
        assert!(!session.check_status());
        assert_eq!(engine.launches(), 1, "status checks never restart");
    }

    #[test]
    fn test_check_status_after_exit_reports_not_ready() {
        let engine = ScriptedEngine::new();
        let mut session = ready_session(&engine);

        engine.kill();
        assert!(!session.check_status());
        assert_eq!(engine.sent(), vec!["uci", "isready"], "nothing sent to a dead process");
    }

    #[test]
    fn test_check_status_times_out_when_engine_stops_answering() {
        let engine = ScriptedEngine::new();
        let timeouts = SessionTimeouts {
            status: Duration::from_millis(30),
            ..SessionTimeouts::default()
        };
        let mut session = EngineSession::new(engine.launcher(), timeouts);
        session.initialize().unwrap();

        engine.set_unresponsive(true);
        let started = Instant::now();
        assert!(!session.check_status());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let engine = ScriptedEngine::new();
        let mut session = ready_session(&engine);

        session.shutdown();
        session.shutdown();

        assert_eq!(session.state(), EngineState::Uninitialized);
        assert_eq!(engine.sent().last().map(String::as_str), Some("quit"));
        assert_eq!(engine.terminations(), 1);
        assert!(!session.check_status());
    }

    #[test]
    fn test_engine_error_display() {
        let launch = EngineError::Launch(ChannelError::NotFound("/opt/sf".to_string()));
        assert!(launch.to_string().contains("Failed to start engine"));

        let handshake = EngineError::Handshake("no uciok".to_string());
        assert_eq!(handshake.to_string(), "Engine initialization failed: no uciok");

        let comm = EngineError::Communication(ChannelError::Closed);
        assert_eq!(
            comm.to_string(),
            "Error communicating with engine: Engine process has exited"
        );
    }

    #[test]
    fn test_max_uci_lines_constant() {
        assert!(MAX_UCI_LINES >= 1000);
    }
}
