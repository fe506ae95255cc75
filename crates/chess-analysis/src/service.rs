//! The analysis facade shared by every caller.
//!
//! [`AnalysisService`] puts one engine session behind a mutex and a result
//! cache in front of it. It is `Sync`; wrap it in an `Arc` to share it across
//! threads.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crate::analyzer::{
    validate_positions, validate_tactics, AnalyzerError, GameAnalyzer, PositionAnalyzer,
};
use crate::cache::{CacheKey, CacheSweeper, ResultCache};
use crate::channel::{Launcher, ProcessLauncher};
use crate::config::AnalysisConfig;
use crate::engine::{EngineError, EngineSession};
use crate::evaluation::{AnalysisResult, SearchRequest};
use crate::hints::{Hint, HintKind};
use crate::quality::TacticalReport;

/// Cached, serialized access to a single engine.
pub struct AnalysisService<L: Launcher = ProcessLauncher> {
    session: Mutex<EngineSession<L>>,
    cache: Arc<ResultCache>,
    sweeper: Mutex<Option<CacheSweeper>>,
    config: AnalysisConfig,
}

impl AnalysisService<ProcessLauncher> {
    /// Start the configured engine.
    ///
    /// # Errors
    ///
    /// Fails if the engine cannot be launched or does not complete the UCI
    /// handshake.
    pub fn new(config: AnalysisConfig) -> Result<Self, EngineError> {
        let launcher = ProcessLauncher::new(config.engine_path.clone());
        Self::with_launcher(launcher, config)
    }
}

impl<L: Launcher> AnalysisService<L> {
    /// Start an engine through a custom launcher.
    pub fn with_launcher(launcher: L, config: AnalysisConfig) -> Result<Self, EngineError> {
        let mut session = EngineSession::new(launcher, config.session_timeouts());
        session.initialize()?;

        Ok(Self {
            session: Mutex::new(session),
            cache: Arc::new(ResultCache::new(config.cache_capacity, config.cache_ttl())),
            sweeper: Mutex::new(None),
            config,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    // A session poisoned mid-exchange is re-initialized by its next call.
    fn session(&self) -> MutexGuard<'_, EngineSession<L>> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Best move for a position. Never cached.
    pub fn evaluate_position(&self, fen: &str, depth: u32) -> Result<String, AnalyzerError> {
        let request = SearchRequest::new(fen, self.config.effective_depth(depth));
        Ok(self.session().evaluate(&request)?)
    }

    /// Full analysis of a position, served from the cache when fresh.
    pub fn analyze_position(
        &self,
        fen: &str,
        depth: u32,
    ) -> Result<Arc<AnalysisResult>, AnalyzerError> {
        Ok(self.analyze(fen, self.config.effective_depth(depth))?)
    }

    /// Analyze up to `max_game_positions` positions in order.
    pub fn analyze_game(
        &self,
        fens: &[String],
        depth: u32,
    ) -> Result<Vec<Arc<AnalysisResult>>, AnalyzerError> {
        validate_positions(fens)?;
        GameAnalyzer::new(self, self.config.limits())
            .analyze_game(fens, self.config.effective_depth(depth))
    }

    /// Run [`Self::analyze_game`] on a background thread.
    pub fn spawn_game_analysis(
        self: &Arc<Self>,
        fens: Vec<String>,
        depth: u32,
    ) -> io::Result<JoinHandle<Result<Vec<Arc<AnalysisResult>>, AnalyzerError>>>
    where
        L: 'static,
    {
        let service = Arc::clone(self);
        thread::Builder::new()
            .name("game-analysis".to_string())
            .spawn(move || service.analyze_game(&fens, depth))
    }

    /// Report played moves that gave up at least an inaccuracy's worth.
    pub fn find_tactical_opportunities(
        &self,
        fens: &[String],
        moves: &[String],
        depth: u32,
    ) -> Result<TacticalReport, AnalyzerError> {
        validate_tactics(fens, moves)?;
        GameAnalyzer::new(self, self.config.limits()).find_tactical_opportunities(
            fens,
            moves,
            self.config.effective_depth(depth),
        )
    }

    /// Produce a hint of the given kind. Failures become [`Hint::Error`].
    pub fn hint(&self, kind: HintKind, fen: &str, depth: u32) -> Hint {
        match self.analyze(fen, self.config.effective_depth(depth)) {
            Ok(analysis) => kind.derive(&analysis),
            Err(e) => kind.settle(Err(e.into())),
        }
    }

    pub fn best_move_hint(&self, fen: &str, depth: u32) -> Hint {
        self.hint(HintKind::BestMove, fen, depth)
    }

    pub fn piece_selection_hint(&self, fen: &str, depth: u32) -> Hint {
        self.hint(HintKind::PieceSelection, fen, depth)
    }

    pub fn strategic_hint(&self, fen: &str, depth: u32) -> Hint {
        self.hint(HintKind::Strategic, fen, depth)
    }

    pub fn tactical_hint(&self, fen: &str, depth: u32) -> Hint {
        self.hint(HintKind::Tactical, fen, depth)
    }

    pub fn all_hints(&self, fen: &str, depth: u32) -> Hint {
        self.hint(HintKind::All, fen, depth)
    }

    /// Whether the engine answers `isready` in time. Never restarts it.
    pub fn check_engine_status(&self) -> bool {
        self.session().check_status()
    }

    pub fn engine_path(&self) -> String {
        self.session().engine_path().to_string()
    }

    pub fn engine_version(&self) -> String {
        self.session().engine_version().to_string()
    }

    /// Drop expired cache entries now.
    pub fn sweep_cache(&self) -> usize {
        self.cache.sweep_expired()
    }

    /// Start the periodic cache sweeper. Returns `false` if it was already
    /// running.
    pub fn start_cache_sweeper(&self) -> bool {
        let mut sweeper = self.sweeper.lock().unwrap_or_else(|e| e.into_inner());
        if sweeper.as_ref().is_some_and(CacheSweeper::is_running) {
            return false;
        }
        *sweeper = Some(CacheSweeper::start(
            Arc::clone(&self.cache),
            self.config.sweep_interval(),
        ));
        true
    }

    /// Stop the sweeper and the engine. Idempotent.
    pub fn shutdown(&self) {
        let sweeper = self.sweeper.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(mut sweeper) = sweeper {
            sweeper.stop();
        }
        self.session().shutdown();
    }
}

impl<L: Launcher> PositionAnalyzer for AnalysisService<L> {
    fn analyze(&self, fen: &str, depth: u32) -> Result<Arc<AnalysisResult>, EngineError> {
        let key = CacheKey::new(fen, depth);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let request = SearchRequest::new(fen, depth);
        let result = Arc::new(self.session().analyze_with_detail(&request)?);
        self.cache.put(key, Arc::clone(&result));
        Ok(result)
    }

    fn score_move(&self, fen: &str, mv: &str, depth: u32) -> Result<f64, EngineError> {
        let request = SearchRequest::new(fen, depth).restricted_to(mv);
        Ok(self.session().analyze_with_detail(&request)?.score)
    }
}

impl<L: Launcher> Drop for AnalysisService<L> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
