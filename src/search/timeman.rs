//! Time management.
//!
//! Splits the clock into an `optimal` budget (finish the current depth
//! iteration, then stop) and a `maximal` budget (hard stop mid-search).
//! Between iterations the optimal budget is rescaled by how stable the
//! best move has been and how the score is trending.

use std::time::Instant;

use crate::board::types::score::NO_SCORE;
use crate::board::types::{Color, Move, Score};
use crate::board::Board;

use super::SearchLimits;

/// Scaling by the number of consecutive iterations the best move held.
const STABILITY_SCALE: [f64; 5] = [2.50, 1.20, 0.90, 0.80, 0.75];

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum TimeMode {
    /// No clock: infinite, ponder-only, or depth/node-limited searches
    None,
    /// Fixed time per move
    Movetime,
    /// Tournament clock with increment and moves-to-go
    Tournament,
}

pub struct TimeManager {
    start: Instant,
    mode: TimeMode,
    average_time: u64,
    maximal_time: u64,
    optimal_time: u64,
    previous_score: Score,
    previous_bestmove: Move,
    stability: usize,
    /// Nodes between clock checks
    pub check_interval: u64,
}

impl TimeManager {
    #[must_use]
    pub fn new(limits: &SearchLimits, stm: Color, start: Instant) -> Self {
        let mut tm = TimeManager {
            start,
            mode: TimeMode::None,
            average_time: 0,
            maximal_time: 0,
            optimal_time: 0,
            previous_score: NO_SCORE,
            previous_bestmove: Move::NONE,
            stability: 0,
            check_interval: 1000,
        };

        if let Some(nodes) = limits.nodes {
            tm.check_interval = 1000.min((nodes as f64).sqrt() as u64 + 1);
        }

        let remaining = match stm {
            Color::White => limits.wtime,
            Color::Black => limits.btime,
        };
        let inc = match stm {
            Color::White => limits.winc,
            Color::Black => limits.binc,
        };

        if let Some(remaining) = remaining {
            let mtg = u64::from(limits.movestogo.unwrap_or(40).clamp(1, 100));
            let time = remaining.saturating_sub(limits.move_overhead).max(1);

            tm.mode = TimeMode::Tournament;
            tm.average_time = time / mtg + inc;
            tm.maximal_time = (time as f64 / (mtg as f64).powf(0.4)) as u64 + inc;

            // Pondering runs on the opponent's clock; allow more.
            if limits.ponder {
                tm.average_time += tm.average_time / 4;
            }

            tm.average_time = tm.average_time.max(limits.min_thinking_ms);
            tm.average_time = tm.average_time.min(time.saturating_sub(1).max(1));
            tm.maximal_time = tm.maximal_time.min(time.saturating_sub(1).max(1));
            tm.optimal_time = tm.maximal_time;

            log::debug!(
                "time budget: average {} ms, maximal {} ms",
                tm.average_time,
                tm.maximal_time
            );
        } else if let Some(movetime) = limits.movetime {
            tm.mode = TimeMode::Movetime;
            tm.maximal_time = movetime.saturating_sub(limits.move_overhead).max(1);
            tm.average_time = tm.maximal_time;
            tm.optimal_time = tm.maximal_time;
        }

        tm
    }

    /// Milliseconds since the search started.
    #[must_use]
    pub fn elapsed(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Refine the optimal budget after a completed iteration.
    pub fn update(&mut self, board: &Board, bestmove: Move, score: Score) {
        if self.mode != TimeMode::Tournament {
            return;
        }

        let mut scale = 1.0f64;

        // A forced move deserves almost no thought.
        if board.generate_legal().len() == 1 {
            scale = 0.2;
        }

        if self.previous_bestmove != bestmove {
            self.previous_bestmove = bestmove;
            self.stability = 0;
        } else {
            self.stability = (self.stability + 1).min(STABILITY_SCALE.len() - 1);
        }
        scale *= STABILITY_SCALE[self.stability];

        // Allot more time when the score is dropping, less when rising:
        // 2^(-diff/100) clamped to [0.5, 2.0].
        if self.previous_score != NO_SCORE {
            let diff = score - self.previous_score;
            scale *= 2f64.powf(f64::from(-diff.clamp(-100, 100)) / 100.0);
        }
        self.previous_score = score;

        self.optimal_time = self
            .maximal_time
            .min((self.average_time as f64 * scale) as u64);

        log::debug!(
            "time refine: stability {}, optimal {} ms",
            self.stability,
            self.optimal_time
        );
    }

    /// May the search stop at an iteration boundary?
    #[must_use]
    pub fn can_stop(&self, pondering: bool) -> bool {
        if pondering {
            return false;
        }
        self.mode != TimeMode::None && self.elapsed() >= self.optimal_time
    }

    /// Must the search stop right now, mid-iteration?
    #[must_use]
    pub fn must_stop(&self, pondering: bool) -> bool {
        if pondering {
            return false;
        }
        self.mode != TimeMode::None && self.elapsed() >= self.maximal_time
    }

    /// Re-arm the clock budgets; used on ponderhit, when the search
    /// switches from free thinking to our own clock.
    pub fn restart(&mut self, start: Instant) {
        self.start = start;
    }
}
