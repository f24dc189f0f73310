//! Engine controller.
//!
//! Owns the current position, the options, the shared transposition
//! table, and the lifecycle of one search at a time. The UCI front end
//! calls into this API and never touches the search internals.

pub mod options;

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use crate::board::{Board, FenError, MoveParseError};
use crate::search::{run_search, InfoCallback, SearchLimits, SearchResult, SearchShared};
use crate::tt::TranspositionTable;

pub use options::EngineOptions;

/// Stack size of the controller's search thread.
const SEARCH_STACK_SIZE: usize = 32 * 1024 * 1024;

/// Errors surfaced to the protocol layer.
#[derive(Debug)]
pub enum EngineError {
    /// Bad FEN in a position command
    InvalidFen(FenError),
    /// Bad move in a position command's move list
    InvalidMove { move_str: String, error: MoveParseError },
    /// Search thread could not be created
    Thread(std::io::Error),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidFen(e) => write!(f, "invalid FEN: {e}"),
            EngineError::InvalidMove { move_str, error } => {
                write!(f, "invalid move '{move_str}': {error}")
            }
            EngineError::Thread(e) => write!(f, "failed to start search: {e}"),
        }
    }
}

impl Error for EngineError {}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum SearchState {
    Searching,
    Finished,
}

/// Handle to the in-flight search.
struct ActiveSearch {
    shared: Arc<SearchShared>,
    state: Arc<(Mutex<SearchState>, Condvar)>,
    handle: JoinHandle<()>,
}

impl ActiveSearch {
    /// Block until the search thread reports completion.
    fn wait_finished(&self) {
        let (lock, condvar) = &*self.state;
        let mut state = lock.lock();
        while *state != SearchState::Finished {
            condvar.wait(&mut state);
        }
    }
}

pub struct Engine {
    board: Board,
    options: EngineOptions,
    tt: Arc<TranspositionTable>,
    active: Option<ActiveSearch>,
}

impl Engine {
    /// Create an engine and build every startup table (attacks, Zobrist,
    /// piece-square, KPK, endgames).
    #[must_use]
    pub fn new() -> Self {
        crate::board::attack_tables::init();
        crate::eval::init();

        let options = EngineOptions::default();
        Engine {
            board: Board::startpos(),
            tt: Arc::new(TranspositionTable::new(options.hash_mb)),
            options,
            active: None,
        }
    }

    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Set the position from a FEN (or the start position) plus a list of
    /// UCI moves. On error the previous position is kept.
    pub fn set_position(&mut self, fen: &str, moves: &[&str]) -> Result<(), EngineError> {
        let mut board = Board::from_fen_960(fen, self.options.chess960)
            .map_err(EngineError::InvalidFen)?;

        for move_str in moves {
            let mv = board
                .parse_uci_move(move_str)
                .map_err(|error| EngineError::InvalidMove {
                    move_str: (*move_str).to_string(),
                    error,
                })?;
            board.do_move(mv);
        }

        self.board = board;
        Ok(())
    }

    /// Start a search. `limits` comes from the `go` command; thread
    /// count, MultiPV, and time margins are supplied by the options.
    /// `on_complete` receives the final result on the search thread.
    pub fn start_search<F>(
        &mut self,
        mut limits: SearchLimits,
        info: Option<InfoCallback>,
        on_complete: F,
    ) -> Result<(), EngineError>
    where
        F: FnOnce(SearchResult) + Send + 'static,
    {
        self.stop_search();

        limits.threads = self.options.threads;
        limits.multi_pv = self.options.multi_pv;
        limits.move_overhead = self.options.move_overhead;
        limits.min_thinking_ms = self.options.min_thinking_ms;

        let shared = Arc::new(SearchShared::new(Arc::clone(&self.tt), limits.ponder));
        let state = Arc::new((Mutex::new(SearchState::Searching), Condvar::new()));

        let board = self.board.clone();
        let thread_shared = Arc::clone(&shared);
        let thread_state = Arc::clone(&state);

        let handle = std::thread::Builder::new()
            .name("riptide-search".to_string())
            .stack_size(SEARCH_STACK_SIZE)
            .spawn(move || {
                let result = run_search(&board, limits, thread_shared, info);
                on_complete(result);

                let (lock, condvar) = &*thread_state;
                *lock.lock() = SearchState::Finished;
                condvar.notify_all();
            })
            .map_err(EngineError::Thread)?;

        self.active = Some(ActiveSearch {
            shared,
            state,
            handle,
        });
        Ok(())
    }

    /// Stop any in-flight search and wait for its best move to be
    /// delivered.
    pub fn stop_search(&mut self) {
        if let Some(active) = self.active.take() {
            active.shared.request_stop();
            active.wait_finished();
            let _ = active.handle.join();
        }
    }

    /// Wait for a running search to finish on its own (used for
    /// depth-limited searches in tests and tools).
    pub fn wait_search(&mut self) {
        if let Some(active) = self.active.take() {
            active.wait_finished();
            let _ = active.handle.join();
        }
    }

    /// The GUI played the expected move: leave ponder mode and start
    /// spending our own clock.
    pub fn ponderhit(&mut self) {
        if let Some(active) = &self.active {
            active.shared.ponderhit();
        }
    }

    #[must_use]
    pub fn is_searching(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| *active.state.0.lock() == SearchState::Searching)
    }

    /// Reset for a new game: fresh position and a cleared table.
    pub fn new_game(&mut self) {
        self.stop_search();
        self.board = Board::startpos();
        self.tt.clear(self.options.threads);
    }

    /// Apply a `setoption` command.
    pub fn set_option(&mut self, name: &str, value: &str) {
        self.stop_search();

        match name.to_ascii_lowercase().as_str() {
            "hash" => {
                if let Ok(mb) = value.parse() {
                    self.options.set_hash(mb);
                    self.resize_tt();
                }
            }
            "threads" => {
                if let Ok(threads) = value.parse() {
                    self.options.set_threads(threads);
                }
            }
            "multipv" => {
                if let Ok(lines) = value.parse() {
                    self.options.set_multi_pv(lines);
                }
            }
            "move overhead" => {
                if let Ok(ms) = value.parse() {
                    self.options.set_move_overhead(ms);
                }
            }
            "minimum thinking time" => {
                if let Ok(ms) = value.parse() {
                    self.options.set_min_thinking(ms);
                }
            }
            "uci_chess960" => {
                self.options.chess960 = value.eq_ignore_ascii_case("true");
                self.board.set_chess960(self.options.chess960);
            }
            "clear hash" => {
                self.tt.clear(self.options.threads);
            }
            _ => log::warn!("ignoring unknown option '{name}'"),
        }
    }

    fn resize_tt(&mut self) {
        match Arc::get_mut(&mut self.tt) {
            Some(tt) => {
                tt.resize(self.options.hash_mb);
                log::debug!("transposition table resized to {} MiB", self.options.hash_mb);
            }
            None => log::warn!("cannot resize the hash table while a search holds it"),
        }
    }

    /// Shared access to the transposition table (tools and tests).
    #[must_use]
    pub fn tt(&self) -> &Arc<TranspositionTable> {
        &self.tt
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop_search();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_set_position_and_rollback() {
        let mut engine = Engine::new();
        engine
            .set_position(crate::board::START_FEN, &["e2e4", "e7e5"])
            .unwrap();
        let good_key = engine.board().key();

        // A bad move list leaves the previous position intact
        assert!(engine
            .set_position(crate::board::START_FEN, &["e2e5"])
            .is_err());
        assert_eq!(engine.board().key(), good_key);
    }

    #[test]
    fn test_search_completes_and_reports() {
        let mut engine = Engine::new();
        engine.set_position(crate::board::START_FEN, &[]).unwrap();

        let (tx, rx) = mpsc::channel();
        engine
            .start_search(
                SearchLimits {
                    depth: Some(3),
                    ..SearchLimits::default()
                },
                None,
                move |result| {
                    tx.send(result).unwrap();
                },
            )
            .unwrap();
        engine.wait_search();

        let result = rx.recv().unwrap();
        assert!(result.best_move.is_some());
    }

    #[test]
    fn test_stop_interrupts_infinite_search() {
        let mut engine = Engine::new();
        engine.set_position(crate::board::START_FEN, &[]).unwrap();

        let (tx, rx) = mpsc::channel();
        engine
            .start_search(
                SearchLimits {
                    infinite: true,
                    ..SearchLimits::default()
                },
                None,
                move |result| {
                    tx.send(result).unwrap();
                },
            )
            .unwrap();

        std::thread::sleep(std::time::Duration::from_millis(50));
        engine.stop_search();
        let result = rx.recv().unwrap();
        assert!(result.best_move.is_some());
    }

    #[test]
    fn test_clear_hash_option() {
        let mut engine = Engine::new();
        engine.set_option("hash", "8");
        assert_eq!(engine.options().hash_mb, 8);
        engine.set_option("clear hash", "");
        assert_eq!(engine.tt().hashfull(), 0);
    }
}
