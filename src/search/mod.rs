//! Iterative-deepening alpha-beta search.
//!
//! The worker pool, the PVS/quiescence core, move ordering, history
//! bookkeeping, and time management live in the submodules; this module
//! holds the shared plumbing: limits, stack frames, principal variations,
//! root moves, and the reduction table.

pub mod alphabeta;
pub mod history;
pub mod movepick;
pub mod timeman;
pub mod worker;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::board::types::score::NO_SCORE;
use crate::board::types::{Move, Score, Square, MAX_PLY};
use crate::tt::TranspositionTable;

pub use worker::run_search;

/// Everything a `go` command can constrain.
#[derive(Clone, Debug)]
pub struct SearchLimits {
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: u64,
    pub binc: u64,
    pub movestogo: Option<u32>,
    pub movetime: Option<u64>,
    pub depth: Option<i32>,
    pub nodes: Option<u64>,
    pub mate: Option<u32>,
    pub infinite: bool,
    pub ponder: bool,
    /// Restrict the root to these moves (empty = all legal moves)
    pub searchmoves: Vec<Move>,
    pub multi_pv: usize,
    pub threads: usize,
    pub move_overhead: u64,
    pub min_thinking_ms: u64,
}

impl Default for SearchLimits {
    fn default() -> Self {
        SearchLimits {
            wtime: None,
            btime: None,
            winc: 0,
            binc: 0,
            movestogo: None,
            movetime: None,
            depth: None,
            nodes: None,
            mate: None,
            infinite: false,
            ponder: false,
            searchmoves: Vec::new(),
            multi_pv: 1,
            threads: 1,
            move_overhead: 30,
            min_thinking_ms: 0,
        }
    }
}

/// State shared by every worker of one search: the transposition table,
/// the abort and ponder flags, and the global node counter.
pub struct SearchShared {
    pub tt: Arc<TranspositionTable>,
    stop: AtomicBool,
    pondering: AtomicBool,
    nodes: AtomicU64,
}

impl SearchShared {
    #[must_use]
    pub fn new(tt: Arc<TranspositionTable>, ponder: bool) -> Self {
        SearchShared {
            tt,
            stop: AtomicBool::new(false),
            pondering: AtomicBool::new(ponder),
            nodes: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    #[inline]
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Leave ponder mode (the `ponderhit` transition).
    #[inline]
    pub fn ponderhit(&self) {
        self.pondering.store(false, Ordering::Release);
    }

    #[inline]
    #[must_use]
    pub fn is_pondering(&self) -> bool {
        self.pondering.load(Ordering::Acquire)
    }

    #[inline]
    pub fn add_nodes(&self, nodes: u64) {
        self.nodes.fetch_add(nodes, Ordering::Relaxed);
    }

    #[inline]
    #[must_use]
    pub fn total_nodes(&self) -> u64 {
        self.nodes.load(Ordering::Relaxed)
    }
}

/// Per-ply search stack frame.
#[derive(Clone)]
pub struct SsFrame {
    pub killers: [Move; 2],
    pub current_move: Move,
    pub excluded: Move,
    pub static_eval: Score,
    /// Colored piece index and destination of the move played at this
    /// ply, for continuation-history lookups below it.
    pub piece_to: Option<(usize, Square)>,
}

impl SsFrame {
    fn new() -> Self {
        SsFrame {
            killers: [Move::NONE; 2],
            current_move: Move::NONE,
            excluded: Move::NONE,
            static_eval: NO_SCORE,
            piece_to: None,
        }
    }

    pub(crate) fn stack() -> Vec<SsFrame> {
        vec![SsFrame::new(); MAX_PLY + 4]
    }
}

/// A principal variation collected on the way back up the tree.
#[derive(Clone)]
pub struct PvLine {
    moves: [Move; MAX_PLY],
    len: usize,
}

impl PvLine {
    #[must_use]
    pub fn new() -> Self {
        PvLine {
            moves: [Move::NONE; MAX_PLY],
            len: 0,
        }
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Set this line to `mv` followed by `child`.
    pub fn load(&mut self, mv: Move, child: &PvLine) {
        self.moves[0] = mv;
        let take = child.len.min(MAX_PLY - 1);
        self.moves[1..=take].copy_from_slice(&child.moves[..take]);
        self.len = take + 1;
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Move] {
        &self.moves[..self.len]
    }
}

impl Default for PvLine {
    fn default() -> Self {
        PvLine::new()
    }
}

/// A root move with its running scores and its own principal variation.
#[derive(Clone)]
pub struct RootMove {
    pub mv: Move,
    pub score: Score,
    pub previous_score: Score,
    pub seldepth: usize,
    pub pv: Vec<Move>,
}

impl RootMove {
    #[must_use]
    pub fn new(mv: Move) -> Self {
        RootMove {
            mv,
            score: -crate::board::types::score::INFINITE,
            previous_score: -crate::board::types::score::INFINITE,
            seldepth: 0,
            pv: vec![mv],
        }
    }
}

/// Stable sort by current score, tie-broken by the previous iteration.
pub(crate) fn sort_root_moves(moves: &mut [RootMove]) {
    moves.sort_by(|a, b| {
        (b.score, b.previous_score).cmp(&(a.score, a.previous_score))
    });
}

/// Info emitted after each completed iteration.
#[derive(Clone, Debug)]
pub struct SearchInfo {
    pub depth: i32,
    pub seldepth: usize,
    pub multipv: usize,
    pub score: Score,
    /// Signed full-move mate distance, when the score is a mate
    pub mate_in: Option<i32>,
    /// Whether the score is a lower/upper bound (aspiration fail)
    pub bound: Option<crate::tt::Bound>,
    pub nodes: u64,
    pub nps: u64,
    pub time_ms: u64,
    pub hashfull: u32,
    pub pv: Vec<String>,
}

/// Callback for streaming info lines.
pub type InfoCallback = Arc<dyn Fn(&SearchInfo) + Send + Sync>;

/// Outcome of a search: the move to play and the expected reply.
#[derive(Clone, Debug, Default)]
pub struct SearchResult {
    pub best_move: Option<Move>,
    pub ponder_move: Option<Move>,
}

/// Late-move reduction table, indexed by depth and move count.
pub(crate) static REDUCTIONS: Lazy<[[i32; 64]; 64]> = Lazy::new(|| {
    let mut table = [[0i32; 64]; 64];
    for (depth, row) in table.iter_mut().enumerate().skip(1) {
        for (moves, cell) in row.iter_mut().enumerate().skip(1) {
            let value = -1.34 + (depth as f64).ln() * (moves as f64).ln() / 1.26;
            *cell = value.max(0.0) as i32;
        }
    }
    table
});

#[inline]
pub(crate) fn reduction(depth: i32, move_count: usize) -> i32 {
    REDUCTIONS[depth.clamp(0, 63) as usize][move_count.min(63)]
}
