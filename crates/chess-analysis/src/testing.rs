//! In-memory engine used by unit tests.
//!
//! [`ScriptedEngine`] answers the UCI subset the session speaks with canned
//! lines, and can be told to misbehave: exit mid-search, go silent, fail a
//! write, or refuse to launch.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use uci::{GuiCommand, InfoEvent, Score};

use crate::channel::{ChannelError, Launcher, LineChannel, Received};

pub const SCRIPTED_PATH: &str = "scripted-engine";
pub const SCRIPTED_BANNER: &str = "Stockfish 16.1 by the Stockfish developers";

/// Deepest search the script will spell out line by line.
const MAX_SCRIPTED_DEPTH: u32 = 40;

struct Script {
    banner: bool,
    launch_failure: bool,
    exit_on_uci: bool,
    exit_on_go: bool,
    exit_on_next_go: bool,
    silent_on_go: bool,
    fail_next_go: bool,
    unresponsive: bool,
    best: (String, Score),
    move_scores: HashMap<String, Score>,
    position_scores: HashMap<String, (String, Score)>,
    current_fen: Option<String>,
    sent: Vec<String>,
    launches: usize,
    terminations: usize,
    searches: usize,
    generation: usize,
    killed_generation: Option<usize>,
}

/// Handle to a scripted engine's shared state.
#[derive(Clone)]
pub struct ScriptedEngine {
    script: Arc<Mutex<Script>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                banner: true,
                launch_failure: false,
                exit_on_uci: false,
                exit_on_go: false,
                exit_on_next_go: false,
                silent_on_go: false,
                fail_next_go: false,
                unresponsive: false,
                best: ("e2e4".to_string(), Score::Cp(20)),
                move_scores: HashMap::new(),
                position_scores: HashMap::new(),
                current_fen: None,
                sent: Vec::new(),
                launches: 0,
                terminations: 0,
                searches: 0,
                generation: 0,
                killed_generation: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    fn configure(self, f: impl FnOnce(&mut Script)) -> Self {
        f(&mut self.lock());
        self
    }

    pub fn without_banner(self) -> Self {
        self.configure(|s| s.banner = false)
    }

    pub fn failing_launch(self) -> Self {
        self.configure(|s| s.launch_failure = true)
    }

    pub fn exit_on_uci(self) -> Self {
        self.configure(|s| s.exit_on_uci = true)
    }

    pub fn exit_on_go(self) -> Self {
        self.configure(|s| s.exit_on_go = true)
    }

    /// Exit on the first `go` only; relaunched processes search normally.
    pub fn exit_on_next_go(self) -> Self {
        self.configure(|s| s.exit_on_next_go = true)
    }

    pub fn silent_on_go(self) -> Self {
        self.configure(|s| s.silent_on_go = true)
    }

    pub fn fail_next_go(self) -> Self {
        self.configure(|s| s.fail_next_go = true)
    }

    /// Best move and its centipawn score for every position.
    pub fn with_score(self, mv: &str, cp: i32) -> Self {
        self.configure(|s| s.best = (mv.to_string(), Score::Cp(cp)))
    }

    pub fn with_mate(self, mv: &str, moves: i32) -> Self {
        self.configure(|s| s.best = (mv.to_string(), Score::Mate(moves)))
    }

    /// Best move and score for one specific FEN.
    pub fn with_position(self, fen: &str, mv: &str, cp: i32) -> Self {
        self.configure(|s| {
            s.position_scores
                .insert(fen.to_string(), (mv.to_string(), Score::Cp(cp)));
        })
    }

    /// Score reported when the search is restricted to `mv`.
    pub fn with_move_score(self, mv: &str, cp: i32) -> Self {
        self.configure(|s| {
            s.move_scores.insert(mv.to_string(), Score::Cp(cp));
        })
    }

    pub fn launcher(&self) -> ScriptedLauncher {
        ScriptedLauncher {
            script: Arc::clone(&self.script),
        }
    }

    pub fn set_launch_failure(&self, fail: bool) {
        self.lock().launch_failure = fail;
    }

    pub fn set_unresponsive(&self, unresponsive: bool) {
        self.lock().unresponsive = unresponsive;
    }

    pub fn arm_fault(&self) {
        self.lock().fail_next_go = true;
    }

    /// Make the current process die.
    pub fn kill(&self) {
        let mut script = self.lock();
        script.killed_generation = Some(script.generation);
    }

    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    pub fn launches(&self) -> usize {
        self.lock().launches
    }

    pub fn terminations(&self) -> usize {
        self.lock().terminations
    }

    /// Number of `go` commands received.
    pub fn searches(&self) -> usize {
        self.lock().searches
    }
}

pub struct ScriptedLauncher {
    script: Arc<Mutex<Script>>,
}

impl Launcher for ScriptedLauncher {
    type Channel = ScriptedChannel;

    fn launch(&self) -> Result<ScriptedChannel, ChannelError> {
        let mut script = self.script.lock().unwrap();
        if script.launch_failure {
            return Err(ChannelError::NotFound(SCRIPTED_PATH.to_string()));
        }
        script.launches += 1;
        script.generation += 1;
        Ok(ScriptedChannel {
            script: Arc::clone(&self.script),
            generation: script.generation,
            outbox: VecDeque::new(),
            exited: false,
            terminated: false,
        })
    }

    fn path(&self) -> &str {
        SCRIPTED_PATH
    }
}

pub struct ScriptedChannel {
    script: Arc<Mutex<Script>>,
    generation: usize,
    outbox: VecDeque<String>,
    exited: bool,
    terminated: bool,
}

impl ScriptedChannel {
    fn respond_to_go(&mut self, script: &mut Script, depth: u32, searchmoves: &[String]) {
        let (mv, score) = match searchmoves.first() {
            Some(mv) => {
                let fallback = script.best.1;
                (mv.clone(), *script.move_scores.get(mv).unwrap_or(&fallback))
            }
            None => script
                .current_fen
                .as_ref()
                .and_then(|fen| script.position_scores.get(fen))
                .cloned()
                .unwrap_or_else(|| script.best.clone()),
        };

        for d in 1..=depth.min(MAX_SCRIPTED_DEPTH) {
            let info = InfoEvent {
                depth: Some(d),
                score: Some(score),
                pv: vec![mv.clone()],
            };
            self.outbox.push_back(info.to_uci());
            self.outbox
                .push_back(format!("info depth {} currmove {} currmovenumber 1", d, mv));
        }
        self.outbox.push_back(format!("bestmove {}", mv));
    }
}

impl LineChannel for ScriptedChannel {
    fn send_line(&mut self, text: &str) -> Result<(), ChannelError> {
        if !self.is_alive() {
            return Err(ChannelError::Closed);
        }
        let script_handle = Arc::clone(&self.script);
        let mut script = script_handle.lock().unwrap();
        script.sent.push(text.to_string());

        match GuiCommand::parse(text) {
            GuiCommand::Uci => {
                if script.exit_on_uci {
                    self.exited = true;
                    return Ok(());
                }
                if script.banner {
                    self.outbox.push_back(SCRIPTED_BANNER.to_string());
                }
                self.outbox.push_back("id name Stockfish 16.1".to_string());
                self.outbox
                    .push_back("option name Hash type spin default 16 min 1 max 33554432".to_string());
                self.outbox.push_back("uciok".to_string());
            }
            GuiCommand::IsReady => {
                if !script.unresponsive {
                    self.outbox.push_back("readyok".to_string());
                }
            }
            GuiCommand::Position { fen } => script.current_fen = Some(fen),
            GuiCommand::Go(opts) => {
                script.searches += 1;
                if script.fail_next_go {
                    script.fail_next_go = false;
                    self.exited = true;
                    return Err(ChannelError::Io(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "scripted crash",
                    )));
                }
                if script.exit_on_next_go {
                    script.exit_on_next_go = false;
                    self.exited = true;
                } else if script.exit_on_go {
                    self.exited = true;
                } else if !script.silent_on_go {
                    let depth = opts.depth.unwrap_or(1);
                    self.respond_to_go(&mut script, depth, &opts.searchmoves);
                }
            }
            GuiCommand::Quit => self.exited = true,
            GuiCommand::Unknown(_) => {}
        }
        Ok(())
    }

    fn receive_line(&mut self, _deadline: Option<Instant>) -> Result<Received, ChannelError> {
        if self.terminated {
            return Ok(Received::EndOfStream);
        }
        if let Some(line) = self.outbox.pop_front() {
            return Ok(Received::Line(line));
        }
        if self.is_alive() {
            // A silent process would block; report it as the deadline passing.
            Err(ChannelError::Timeout)
        } else {
            Ok(Received::EndOfStream)
        }
    }

    fn is_alive(&mut self) -> bool {
        let killed = self.script.lock().unwrap().killed_generation == Some(self.generation);
        !self.terminated && !self.exited && !killed
    }

    fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.script.lock().unwrap().terminations += 1;
    }
}
