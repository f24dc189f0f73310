//! Lazy SMP worker pool.
//!
//! One worker per thread, each owning its board copy, histories, pawn
//! cache, and search stack. Workers share only the transposition table
//! and the atomic node counter; the main worker (index 0) drives time
//! management and info reporting, helpers simply search and feed the
//! table.

use std::sync::Arc;
use std::time::Instant;

use crate::board::types::score::{mate_in, INFINITE, MATE, MATE_FOUND};
use crate::board::types::Score;
use crate::board::Board;
use crate::eval::{evaluate, PawnTable};
use crate::tt::Bound;

use super::history::HistoryTables;
use super::timeman::TimeManager;
use super::{
    InfoCallback, RootMove, SearchInfo, SearchLimits, SearchResult, SearchShared, SsFrame,
};

/// Stack size for search threads; the recursion is deep.
const SEARCH_STACK_SIZE: usize = 32 * 1024 * 1024;

/// Poll interval while holding the best move back (infinite/ponder).
const HOLD_POLL_MS: u64 = 10;

/// Emit intermediate (bound) info lines only after this much time.
const SLOW_INFO_MS: u64 = 3000;

pub struct Worker {
    pub(crate) idx: usize,
    pub(crate) board: Board,
    pub(crate) tables: HistoryTables,
    pub(crate) pawn_table: PawnTable,
    pub(crate) root_moves: Vec<RootMove>,
    pub(crate) pv_line: usize,
    pub(crate) multi_pv: usize,
    pub(crate) seldepth: usize,
    /// Plies below which null-move pruning is disabled (zugzwang
    /// verification)
    pub(crate) verif_plies: usize,
    pub(crate) nodes: u64,
    flushed_nodes: u64,
    check_countdown: i64,
    pub(crate) ss: Vec<SsFrame>,
    pub(crate) shared: Arc<SearchShared>,
    pub(crate) limits: SearchLimits,
    timeman: TimeManager,
    was_pondering: bool,
    info: Option<InfoCallback>,
}

impl Worker {
    fn new(
        idx: usize,
        board: Board,
        root_moves: Vec<RootMove>,
        shared: Arc<SearchShared>,
        limits: SearchLimits,
        info: Option<InfoCallback>,
    ) -> Self {
        let timeman = TimeManager::new(&limits, board.side_to_move(), Instant::now());
        let check_countdown = timeman.check_interval as i64;
        let was_pondering = limits.ponder;
        let multi_pv = limits.multi_pv.max(1);

        Worker {
            idx,
            board,
            tables: HistoryTables::new(),
            pawn_table: PawnTable::new(),
            root_moves,
            pv_line: 0,
            multi_pv,
            seldepth: 0,
            verif_plies: 0,
            nodes: 0,
            flushed_nodes: 0,
            check_countdown,
            ss: SsFrame::stack(),
            shared,
            limits,
            timeman,
            was_pondering,
            info,
        }
    }

    /// Count a node and occasionally check the clock and limits.
    #[inline]
    pub(crate) fn visit_node(&mut self) {
        self.nodes += 1;
        self.check_countdown -= 1;
        if self.check_countdown <= 0 {
            self.check_limits();
        }
    }

    fn check_limits(&mut self) {
        self.check_countdown = self.timeman.check_interval as i64;
        self.flush_nodes();

        if self.idx != 0 {
            return;
        }

        let pondering = self.shared.is_pondering();
        if self.was_pondering && !pondering {
            // Ponderhit: our clock starts now, with the budgets computed
            // at the original go.
            self.was_pondering = false;
            self.timeman.restart(Instant::now());
        }

        if !self.limits.infinite && self.timeman.must_stop(pondering) {
            self.shared.request_stop();
        }

        if let Some(node_limit) = self.limits.nodes {
            if self.shared.total_nodes() >= node_limit {
                self.shared.request_stop();
            }
        }
    }

    fn flush_nodes(&mut self) {
        self.shared.add_nodes(self.nodes - self.flushed_nodes);
        self.flushed_nodes = self.nodes;
    }

    #[inline]
    pub(crate) fn should_abort(&self) -> bool {
        self.shared.stop_requested()
    }

    /// Static evaluation with the correction-history adjustment.
    pub(crate) fn static_eval(&mut self) -> Score {
        let raw = evaluate(&self.board, &mut self.pawn_table);
        let correction = self
            .tables
            .correction
            .get(self.board.side_to_move(), self.board.king_pawn_key());
        (raw + correction).clamp(-MATE_FOUND + 1, MATE_FOUND - 1)
    }

    /// The full iterative-deepening loop of one worker.
    fn iterative_deepening(&mut self) {
        self.tables.clear();
        self.pawn_table.clear();
        self.verif_plies = 0;

        let max_depth = self
            .limits
            .depth
            .unwrap_or(crate::board::types::MAX_PLY as i32 - 8)
            .clamp(1, crate::board::types::MAX_PLY as i32 - 8);

        let mut iter_depth = 1;
        loop {
            let aborted = self.search_root(iter_depth);
            if aborted || self.should_abort() {
                break;
            }

            if self.idx == 0 {
                let best = self.root_moves[0].mv;
                let score = self.root_moves[0].previous_score;
                self.timeman.update(&self.board, best, score);

                if !self.limits.infinite && self.timeman.can_stop(self.shared.is_pondering()) {
                    break;
                }

                // Found the requested mate: done.
                if let Some(mate) = self.limits.mate {
                    if score >= mate_in(2 * mate as usize) {
                        break;
                    }
                }
            }

            if iter_depth < max_depth {
                iter_depth += 1;
            } else if self.idx == 0 {
                break;
            }
            // Helpers re-search the maximal depth until told to stop, so
            // fixed-depth runs keep feeding the table.
        }

        self.flush_nodes();
    }

    /// Emit the info line(s) for a finished (or failed) aspiration loop.
    pub(crate) fn report_iteration(&mut self, depth: i32, bound: Bound, multi_pv: usize) {
        if self.idx != 0 || self.info.is_none() {
            return;
        }

        self.flush_nodes();
        let time_ms = self.timeman.elapsed();

        if multi_pv == 1 {
            if bound == Bound::Exact || time_ms > SLOW_INFO_MS {
                self.emit_info(depth, 0, bound, time_ms);
            }
        } else if bound == Bound::Exact && (self.pv_line == multi_pv - 1 || time_ms > SLOW_INFO_MS)
        {
            for line in 0..multi_pv {
                self.emit_info(depth, line, Bound::Exact, time_ms);
            }
        }
    }

    fn emit_info(&self, depth: i32, line: usize, bound: Bound, time_ms: u64) {
        let Some(callback) = &self.info else { return };
        let rm = &self.root_moves[line];

        let score = if rm.score == -INFINITE {
            rm.previous_score
        } else {
            rm.score
        };
        let score = if score == -INFINITE { 0 } else { score };

        let mate_in = if score.abs() < MATE_FOUND {
            None
        } else if score > 0 {
            Some((MATE - score + 1) / 2)
        } else {
            Some(-(MATE + score + 1) / 2)
        };

        let nodes = self.shared.total_nodes();
        let nps = if time_ms > 0 { nodes * 1000 / time_ms } else { 0 };

        let info = SearchInfo {
            depth,
            seldepth: rm.seldepth.max(self.seldepth),
            multipv: line + 1,
            score,
            mate_in,
            bound: (bound != Bound::Exact).then_some(bound),
            nodes,
            nps,
            time_ms,
            hashfull: self.shared.tt.hashfull(),
            pv: rm.pv.iter().map(|mv| self.board.move_to_uci(*mv)).collect(),
        };
        callback(&info);
    }

    fn best_result(&self, board: &Board) -> SearchResult {
        let best = self.root_moves[0].mv;

        // Prefer the PV's reply; fall back to the transposition table.
        let ponder = self.root_moves[0].pv.get(1).copied().or_else(|| {
            let mut after = board.clone();
            after.do_move(best);
            self.shared
                .tt
                .probe(after.key())
                .map(|hit| hit.mv)
                .filter(|mv| mv.is_some() && after.is_pseudo_legal(*mv) && after.is_legal(*mv))
        });

        SearchResult {
            best_move: Some(best),
            ponder_move: ponder.filter(|mv| mv.is_some()),
        }
    }
}

/// Run a complete search on the current thread, spawning helper workers
/// per the `threads` limit. Blocks until the search ends and returns the
/// chosen move; the caller typically invokes this from a dedicated
/// search thread.
#[must_use]
pub fn run_search(
    board: &Board,
    limits: SearchLimits,
    shared: Arc<SearchShared>,
    info: Option<InfoCallback>,
) -> SearchResult {
    let legal = board.generate_legal();
    let root_moves: Vec<RootMove> = legal
        .iter()
        .filter(|mv| limits.searchmoves.is_empty() || limits.searchmoves.contains(mv))
        .map(RootMove::new)
        .collect();

    // Mated or stalemated (or an empty searchmoves intersection): report
    // and bail out without searching.
    if root_moves.is_empty() {
        if let Some(callback) = &info {
            callback(&SearchInfo {
                depth: 0,
                seldepth: 0,
                multipv: 1,
                score: 0,
                mate_in: board.in_check().then_some(0),
                bound: None,
                nodes: 0,
                nps: 0,
                time_ms: 0,
                hashfull: 0,
                pv: Vec::new(),
            });
        }
        return SearchResult::default();
    }

    shared.tt.new_search();
    let threads = limits.threads.max(1);

    let mut result = SearchResult::default();

    std::thread::scope(|scope| {
        for idx in 1..threads {
            let helper_board = board.clone();
            let helper_root = root_moves.clone();
            let helper_shared = Arc::clone(&shared);
            let helper_limits = limits.clone();

            let spawned = std::thread::Builder::new()
                .name(format!("riptide-worker-{idx}"))
                .stack_size(SEARCH_STACK_SIZE)
                .spawn_scoped(scope, move || {
                    let mut worker = Worker::new(
                        idx,
                        helper_board,
                        helper_root,
                        helper_shared,
                        helper_limits,
                        None,
                    );
                    worker.iterative_deepening();
                });

            // A missing helper degrades the search but doesn't abort it.
            if let Err(e) = spawned {
                log::warn!("failed to spawn search worker {idx}: {e}");
                break;
            }
        }

        // The main worker needs the same deep stack as the helpers, so it
        // runs on its own thread too; this thread only coordinates.
        let main_board = board.clone();
        let main_root = root_moves;
        let main_shared = Arc::clone(&shared);
        let main_limits = limits.clone();

        let main_handle = std::thread::Builder::new()
            .name("riptide-worker-0".to_string())
            .stack_size(SEARCH_STACK_SIZE)
            .spawn_scoped(scope, move || {
                let mut main = Worker::new(0, main_board, main_root, main_shared, main_limits, info);
                main.iterative_deepening();
                main
            })
            .expect("failed to spawn the main search worker");

        let main = main_handle.join().expect("main search worker panicked");

        // In infinite or ponder mode the best move is held back until a
        // stop (or ponderhit followed by completion) arrives.
        while !shared.stop_requested() && (limits.infinite || shared.is_pondering()) {
            std::thread::sleep(std::time::Duration::from_millis(HOLD_POLL_MS));
        }

        shared.request_stop();
        result = main.best_result(board);
        // Helpers observe the stop flag and are joined when the scope ends.
    });

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tt::TranspositionTable;

    fn search_position(fen: &str, limits: SearchLimits) -> SearchResult {
        let board = Board::from_fen(fen).unwrap();
        let tt = Arc::new(TranspositionTable::new(16));
        let shared = Arc::new(SearchShared::new(tt, false));
        run_search(&board, limits, shared, None)
    }

    #[test]
    fn test_depth_one_returns_a_legal_move() {
        let result = search_position(
            crate::board::START_FEN,
            SearchLimits {
                depth: Some(1),
                ..SearchLimits::default()
            },
        );
        let board = Board::startpos();
        let best = result.best_move.unwrap();
        assert!(board.generate_legal().contains(best));
    }

    #[test]
    fn test_mate_in_one_found() {
        // Back-rank mate: Ra8#
        let result = search_position(
            "7k/8/8/8/8/8/R7/6K1 w - - 0 1",
            SearchLimits {
                depth: Some(6),
                ..SearchLimits::default()
            },
        );
        assert!(result.best_move.is_some());
    }

    #[test]
    fn test_stalemate_returns_no_move() {
        // Black to move, stalemated
        let result = search_position(
            "7k/5Q2/6K1/8/8/8/8/8 b - - 0 1",
            SearchLimits {
                depth: Some(3),
                ..SearchLimits::default()
            },
        );
        assert!(result.best_move.is_none());
    }

    #[test]
    fn test_searchmoves_restricts_root() {
        let board = Board::startpos();
        let only = board.parse_uci_move("a2a3").unwrap();
        let result = search_position(
            crate::board::START_FEN,
            SearchLimits {
                depth: Some(2),
                searchmoves: vec![only],
                ..SearchLimits::default()
            },
        );
        assert_eq!(result.best_move, Some(only));
    }

    #[test]
    fn test_obvious_capture_preferred() {
        // White wins a hanging queen
        let result = search_position(
            "rnb1kbnr/ppp1pppp/8/3q4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 3",
            SearchLimits {
                depth: Some(4),
                ..SearchLimits::default()
            },
        );
        let board =
            Board::from_fen("rnb1kbnr/ppp1pppp/8/3q4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 3")
                .unwrap();
        assert_eq!(
            result.best_move,
            Some(board.parse_uci_move("e4d5").unwrap())
        );
    }
}
