//! Principal-variation search and quiescence.

use crate::board::types::score::{
    mate_in, mated_in, DRAW, INFINITE, MATE_FOUND, NO_SCORE, VICTORY,
};
use crate::board::types::{colored_index, Move, Score, MAX_PLY};
use crate::tt::{score_from_tt, score_to_tt, Bound};

use super::history::history_bonus;
use super::movepick::{MovePicker, PickerContext};
use super::worker::Worker;
use super::{reduction, sort_root_moves, PvLine};

/// Quiet moves remembered for the negative history update on a cutoff.
const QUIET_HISTORY_SIZE: usize = 64;

impl Worker {
    /// Negamax with alpha-beta, PVS, and the pruning/reduction heuristics
    /// steered by the transposition table and histories.
    #[allow(clippy::too_many_lines)]
    pub(crate) fn search(
        &mut self,
        depth: i32,
        mut alpha: Score,
        mut beta: Score,
        ply: usize,
        pv_node: bool,
        pv: &mut PvLine,
    ) -> Score {
        if depth <= 0 {
            return self.qsearch(alpha, beta, ply, pv_node, pv);
        }

        let root_node = ply == 0;
        self.visit_node();

        if pv_node && self.seldepth < ply + 1 {
            self.seldepth = ply + 1;
        }

        if self.should_abort() {
            return 0;
        }

        if !root_node {
            if self.board.is_draw(ply) || self.board.is_insufficient_material() {
                return DRAW;
            }

            // A reachable repetition bounds us at the draw score.
            if alpha < DRAW && self.board.upcoming_repetition(ply) {
                alpha = DRAW;
                if alpha >= beta {
                    return alpha;
                }
            }

            if ply >= MAX_PLY - 2 {
                return if self.board.in_check() {
                    DRAW
                } else {
                    self.static_eval()
                };
            }

            // Mate-distance pruning.
            alpha = alpha.max(mated_in(ply));
            beta = beta.min(mate_in(ply + 1));
            if alpha >= beta {
                return alpha;
            }
        }

        let us = self.board.side_to_move();
        let in_check = self.board.in_check();
        let excluded = self.ss[ply].excluded;

        // Singular-extension sub-searches get their own hash slot.
        let key = self.board.key() ^ (u64::from(excluded.as_u16()) << 16);

        let mut tt_move = Move::NONE;
        let mut tt_score = NO_SCORE;
        let mut tt_depth = 0;
        let mut tt_bound = Bound::None;

        let tt_hit = self.shared.tt.probe(key);
        let mut eval;

        if let Some(hit) = tt_hit {
            tt_score = score_from_tt(hit.score, ply);
            tt_bound = hit.bound;
            tt_depth = hit.depth;
            tt_move = hit.mv;

            // Cutoff on a deep-enough bound, outside the PV.
            if !pv_node
                && tt_depth >= depth
                && tt_score != NO_SCORE
                && (tt_bound == Bound::Exact
                    || (tt_bound == Bound::Lower && tt_score >= beta)
                    || (tt_bound == Bound::Upper && tt_score <= alpha))
            {
                return tt_score;
            }

            eval = if hit.eval == NO_SCORE {
                self.static_eval()
            } else {
                hit.eval
            };
            self.ss[ply].static_eval = eval;

            // The bounded search score is a better estimate when usable.
            if tt_score != NO_SCORE
                && (if tt_score > eval {
                    tt_bound.is_lower()
                } else {
                    tt_bound.is_upper()
                })
            {
                eval = tt_score;
            }
        } else {
            eval = self.static_eval();
            self.ss[ply].static_eval = eval;

            // Seed the eval so other workers skip the recomputation.
            self.shared
                .tt
                .store(key, Move::NONE, NO_SCORE, eval, 0, Bound::None);
        }

        if root_node && self.pv_line > 0 {
            tt_move = self.root_moves[self.pv_line].mv;
        }

        let static_eval = self.ss[ply].static_eval;
        self.ss[ply + 2].killers = [Move::NONE; 2];

        // Razoring: hopeless static eval at shallow depth, verified by a
        // quiescence search.
        if !pv_node && !in_check && static_eval + 150 <= alpha {
            if depth == 1 {
                let mut scratch = PvLine::new();
                let max_score = self.qsearch(alpha, beta, ply, false, &mut scratch);
                return (static_eval + 150).max(max_score);
            }
            if static_eval + 300 <= alpha && depth <= 3 {
                let mut scratch = PvLine::new();
                let max_score = self.qsearch(alpha, beta, ply, false, &mut scratch);
                if max_score < beta {
                    return (static_eval + 300).max(max_score);
                }
            }
        }

        // Reverse futility: a static eval far above beta stands.
        if !pv_node && !in_check && depth <= 8 && eval - 80 * depth >= beta && eval < VICTORY {
            return eval;
        }

        // Null-move pruning with a zugzwang verification search.
        if !pv_node
            && !in_check
            && depth >= 3
            && ply >= self.verif_plies
            && excluded == Move::NONE
            && eval >= beta
            && eval >= static_eval
            && self.board.non_pawn_material(us) > 0
        {
            let nmp_reduction = 3 + ((eval - beta) / 128).min(3) + depth / 4;

            self.ss[ply].current_move = Move::NULL;
            self.ss[ply].piece_to = None;
            self.board.do_null_move();
            let mut scratch = PvLine::new();
            let null_score = -self.search(
                depth - nmp_reduction,
                -beta,
                -beta + 1,
                ply + 1,
                false,
                &mut scratch,
            );
            self.board.undo_null_move();

            if null_score >= beta {
                // Never trust mate or decisive-win claims from a null search.
                let score = if null_score > MATE_FOUND {
                    beta
                } else {
                    null_score
                };

                if self.verif_plies > 0 || (depth <= 10 && beta.abs() < VICTORY) {
                    return score;
                }

                // Verification: disable null move near this subtree and
                // re-search at the reduced depth.
                self.verif_plies =
                    ply.saturating_add_signed(((depth - nmp_reduction) * 3 / 4) as isize);
                let verified =
                    self.search(depth - nmp_reduction, beta - 1, beta, ply, false, &mut scratch);
                self.verif_plies = 0;

                if verified >= beta {
                    return score;
                }
            }
        }

        let killers = self.ss[ply].killers;
        let counter = match ply.checked_sub(1).and_then(|p| self.ss[p].piece_to) {
            Some((piece_index, to)) => self.tables.counter_moves.get(piece_index, to),
            None => Move::NONE,
        };
        let prev1 = ply.checked_sub(1).and_then(|p| self.ss[p].piece_to);
        let prev2 = ply.checked_sub(2).and_then(|p| self.ss[p].piece_to);

        let mut picker = MovePicker::new(&self.board, tt_move, killers, counter);

        let mut best_value = -INFINITE;
        let mut best_move = Move::NONE;
        let mut move_count = 0usize;
        let mut skip_quiets = false;
        let mut quiets_tried: Vec<Move> = Vec::with_capacity(16);
        let mut child_pv = PvLine::new();

        loop {
            let mv = {
                let ctx = PickerContext {
                    butterfly: &self.tables.butterfly,
                    capture: &self.tables.capture,
                    cont1: prev1.map(|(pi, to)| self.tables.continuation.table(pi, to)),
                    cont2: prev2.map(|(pi, to)| self.tables.continuation.table(pi, to)),
                };
                picker.next(&self.board, &ctx, skip_quiets)
            };
            let Some(mv) = mv else { break };

            if root_node {
                // Only root moves of the current MultiPV tail are searched.
                if !self.root_moves[self.pv_line..].iter().any(|rm| rm.mv == mv) {
                    continue;
                }
            } else if mv == excluded || !self.board.is_legal(mv) {
                continue;
            }

            move_count += 1;
            let is_quiet = !self.board.is_tactical(mv);

            if !root_node && best_value > -MATE_FOUND {
                // Late-move pruning.
                if depth <= 3 && move_count > 8 * depth as usize {
                    skip_quiets = true;
                }

                // Futility pruning on quiets.
                if depth <= 4 && is_quiet && eval + 240 + 80 * depth <= alpha {
                    skip_quiets = true;
                }

                // SEE pruning of badly losing moves.
                if depth <= 4
                    && !self.board.see_ge(
                        mv,
                        if is_quiet {
                            -80 * depth
                        } else {
                            -25 * depth * depth
                        },
                    )
                {
                    continue;
                }
            }

            let gives_check = self.board.gives_check(mv);
            let mut extension = 0;

            if !root_node {
                // Singular extension: test whether the TT move is the
                // only move beating a lowered window.
                if depth >= 9
                    && mv == tt_move
                    && excluded == Move::NONE
                    && tt_score != NO_SCORE
                    && tt_bound.is_lower()
                    && tt_depth >= depth - 2
                {
                    let singular_beta = tt_score - depth;
                    let mut scratch = PvLine::new();

                    self.ss[ply].excluded = tt_move;
                    let singular_score = self.search(
                        depth / 2,
                        singular_beta - 1,
                        singular_beta,
                        ply,
                        false,
                        &mut scratch,
                    );
                    self.ss[ply].excluded = Move::NONE;

                    if singular_score < singular_beta {
                        extension = 1;
                    }
                }
            } else if gives_check {
                extension = 1;
            }

            let (_, piece) = self
                .board
                .piece_at(mv.from())
                .expect("picker yielded a move from an empty square");
            let hist_score = if is_quiet {
                self.tables.butterfly.get(us, mv)
            } else {
                0
            };

            self.ss[ply].current_move = mv;
            self.ss[ply].piece_to = Some((colored_index(us, piece), mv.to()));

            self.board.do_move_gc(mv, gives_check);

            // Late-move reductions on quiet moves.
            let new_depth = depth - 1;
            let mut r = 0;
            if depth >= 3 && move_count > 3 && is_quiet {
                r = reduction(depth, move_count) + i32::from(!pv_node) - hist_score / 500;
                r = r.max(0);
            }

            let mut score = -INFINITE;
            if r > 0 {
                score = -self.search(new_depth - r, -alpha - 1, -alpha, ply + 1, false, &mut child_pv);
            }

            // Zero-window search at full depth when there was no
            // reduction, or the reduced search beat alpha.
            if (r > 0 && score > alpha) || (r == 0 && !(pv_node && move_count == 1)) {
                score = -self.search(
                    new_depth + extension,
                    -alpha - 1,
                    -alpha,
                    ply + 1,
                    false,
                    &mut child_pv,
                );
            }

            // Full-window search for the PV.
            if pv_node && (move_count == 1 || score > alpha) {
                child_pv.clear();
                score = -self.search(
                    new_depth + extension,
                    -beta,
                    -alpha,
                    ply + 1,
                    true,
                    &mut child_pv,
                );
            }

            self.board.undo_move(mv);

            if self.should_abort() {
                return 0;
            }

            if root_node {
                let seldepth = self.seldepth;
                let rm = self.root_moves[self.pv_line..]
                    .iter_mut()
                    .find(|rm| rm.mv == mv)
                    .expect("searched move is a root move");

                if move_count == 1 || score > alpha {
                    rm.score = score;
                    rm.seldepth = seldepth;
                    rm.pv.clear();
                    rm.pv.push(mv);
                    rm.pv.extend_from_slice(child_pv.as_slice());
                } else {
                    rm.score = -INFINITE;
                }
            }

            if score > best_value {
                best_value = score;

                if score > alpha {
                    best_move = mv;
                    alpha = score;

                    if pv_node && !root_node {
                        pv.load(mv, &child_pv);
                    }

                    if alpha >= beta {
                        if is_quiet {
                            self.update_quiet_histories(depth, mv, &quiets_tried, ply);
                        } else {
                            self.update_capture_history(depth, mv);
                        }
                        break;
                    }
                }
            }

            if is_quiet && quiets_tried.len() < QUIET_HISTORY_SIZE {
                quiets_tried.push(mv);
            }
        }

        // Checkmate, stalemate, or a refuted singular exclusion.
        if move_count == 0 {
            best_value = if excluded != Move::NONE {
                alpha
            } else if in_check {
                mated_in(ply)
            } else {
                DRAW
            };
        }

        // Fold the observed eval error into the correction history.
        if !in_check
            && move_count > 0
            && best_value.abs() < MATE_FOUND
            && (best_move == Move::NONE || !self.board.is_tactical(best_move))
            && !(best_value >= beta && best_value <= static_eval)
            && !(best_move == Move::NONE && best_value >= static_eval)
        {
            let weight = (depth + 1).min(16);
            self.tables.correction.update(
                us,
                self.board.king_pawn_key(),
                weight,
                best_value - static_eval,
            );
        }

        if !root_node || self.pv_line == 0 {
            let bound = if best_value >= beta {
                Bound::Lower
            } else if pv_node && best_move != Move::NONE {
                Bound::Exact
            } else {
                Bound::Upper
            };

            self.shared.tt.store(
                key,
                best_move,
                score_to_tt(best_value, ply),
                static_eval,
                depth,
                bound,
            );
        }

        best_value
    }

    /// Quiescence: resolve captures (and evasions while in check) until
    /// the position is quiet enough for the static eval to stand.
    pub(crate) fn qsearch(
        &mut self,
        mut alpha: Score,
        mut beta: Score,
        ply: usize,
        pv_node: bool,
        pv: &mut PvLine,
    ) -> Score {
        self.visit_node();

        if pv_node && self.seldepth < ply + 1 {
            self.seldepth = ply + 1;
        }

        if self.should_abort() || self.board.is_draw(ply) || self.board.is_insufficient_material()
        {
            return DRAW;
        }

        let in_check = self.board.in_check();

        if ply >= MAX_PLY - 2 {
            return if in_check { DRAW } else { self.static_eval() };
        }

        alpha = alpha.max(mated_in(ply));
        beta = beta.min(mate_in(ply + 1));
        if alpha >= beta {
            return alpha;
        }

        let key = self.board.key();
        let tt_hit = self.shared.tt.probe(key);
        let mut tt_move = Move::NONE;

        if let Some(hit) = tt_hit {
            let tt_score = score_from_tt(hit.score, ply);
            tt_move = hit.mv;

            if !pv_node
                && hit.depth >= 0
                && tt_score != NO_SCORE
                && (hit.bound == Bound::Exact
                    || (hit.bound == Bound::Lower && tt_score >= beta)
                    || (hit.bound == Bound::Upper && tt_score <= alpha))
            {
                return tt_score;
            }
        }

        let mut best_value = -INFINITE;
        let static_eval;

        if in_check {
            static_eval = NO_SCORE;
        } else {
            // Stand pat on the static eval.
            static_eval = match tt_hit {
                Some(hit) if hit.eval != NO_SCORE => hit.eval,
                _ => self.static_eval(),
            };
            best_value = static_eval;

            if best_value >= beta {
                if tt_hit.is_none() {
                    self.shared
                        .tt
                        .store(key, Move::NONE, NO_SCORE, static_eval, 0, Bound::None);
                }
                return best_value;
            }
            alpha = alpha.max(best_value);
        }

        let us = self.board.side_to_move();
        let prev1 = ply.checked_sub(1).and_then(|p| self.ss[p].piece_to);
        let mut picker = MovePicker::new_qsearch(&self.board, tt_move);

        let mut best_move = Move::NONE;
        let mut move_count = 0usize;
        let mut child_pv = PvLine::new();

        loop {
            let mv = {
                let ctx = PickerContext {
                    butterfly: &self.tables.butterfly,
                    capture: &self.tables.capture,
                    cont1: prev1.map(|(pi, to)| self.tables.continuation.table(pi, to)),
                    cont2: None,
                };
                picker.next(&self.board, &ctx, false)
            };
            let Some(mv) = mv else { break };

            if !self.board.is_legal(mv) {
                continue;
            }

            // Losing captures cannot raise a stand-pat that already holds.
            if !in_check && !self.board.see_ge(mv, 0) {
                continue;
            }

            move_count += 1;

            let (_, piece) = self
                .board
                .piece_at(mv.from())
                .expect("picker yielded a move from an empty square");
            self.ss[ply].current_move = mv;
            self.ss[ply].piece_to = Some((colored_index(us, piece), mv.to()));

            self.board.do_move(mv);
            child_pv.clear();
            let score = -self.qsearch(-beta, -alpha, ply + 1, pv_node, &mut child_pv);
            self.board.undo_move(mv);

            if self.should_abort() {
                return 0;
            }

            if score > best_value {
                best_value = score;
                if score > alpha {
                    best_move = mv;
                    alpha = score;
                    if pv_node {
                        pv.load(mv, &child_pv);
                    }
                    if alpha >= beta {
                        break;
                    }
                }
            }
        }

        if in_check && move_count == 0 {
            return mated_in(ply);
        }

        let bound = if best_value >= beta {
            Bound::Lower
        } else if pv_node && best_move != Move::NONE {
            Bound::Exact
        } else {
            Bound::Upper
        };
        self.shared.tt.store(
            key,
            best_move,
            score_to_tt(best_value, ply),
            static_eval,
            0,
            bound,
        );

        best_value
    }

    /// Iterative deepening over one MultiPV line with aspiration windows.
    /// Returns true when the search was aborted mid-iteration.
    pub(crate) fn search_root(&mut self, iter_depth: i32) -> bool {
        let mut aborted = false;

        let multi_pv = self.multi_pv.min(self.root_moves.len());

        self.pv_line = 0;
        while self.pv_line < multi_pv {
            self.seldepth = 0;

            let previous = self.root_moves[self.pv_line].previous_score;
            let (mut alpha, mut beta, mut delta) = if iter_depth <= 10 {
                (-INFINITE, INFINITE, 0)
            } else {
                (
                    (previous - 15).max(-INFINITE),
                    (previous + 15).min(INFINITE),
                    15,
                )
            };

            loop {
                let mut pv = PvLine::new();
                self.search(iter_depth, alpha, beta, 0, true, &mut pv);

                aborted = self.should_abort();
                sort_root_moves(&mut self.root_moves[self.pv_line..]);

                let pv_score = self.root_moves[self.pv_line].score;
                let bound = if pv_score.abs() == INFINITE {
                    Bound::Exact
                } else if pv_score >= beta {
                    Bound::Lower
                } else if pv_score <= alpha {
                    Bound::Upper
                } else {
                    Bound::Exact
                };

                if bound == Bound::Exact {
                    sort_root_moves(&mut self.root_moves[..multi_pv]);
                }

                self.report_iteration(iter_depth, bound, multi_pv);

                if aborted {
                    break;
                }

                // Widen the aspiration window on fails, biasing alpha
                // down after a fail low.
                match bound {
                    Bound::Upper => {
                        beta = (alpha + beta) / 2;
                        alpha = (pv_score - delta).max(-INFINITE);
                        delta += delta / 4;
                    }
                    Bound::Lower => {
                        beta = (pv_score + delta).min(INFINITE);
                        delta += delta / 4;
                    }
                    _ => break,
                }
            }

            if aborted {
                break;
            }
            self.pv_line += 1;
        }

        for rm in &mut self.root_moves {
            rm.previous_score = rm.score;
            rm.score = -INFINITE;
        }

        aborted
    }

    // ------------------------------------------------------------------
    // History updates
    // ------------------------------------------------------------------

    fn update_quiet_histories(&mut self, depth: i32, best: Move, tried: &[Move], ply: usize) {
        let us = self.board.side_to_move();
        let bonus = history_bonus(depth);

        // The previous move gets `best` as its refutation.
        if let Some((piece_index, to)) = ply.checked_sub(1).and_then(|p| self.ss[p].piece_to) {
            self.tables.counter_moves.set(piece_index, to, best);
        }

        self.tables.butterfly.update(us, best, bonus);
        self.update_continuation(best, ply, bonus);

        let killers = &mut self.ss[ply].killers;
        if killers[0] == Move::NONE {
            killers[0] = best;
        } else if killers[0] != best {
            killers[1] = best;
        }

        for &quiet in tried {
            if quiet != best {
                self.tables.butterfly.update(us, quiet, -bonus);
                self.update_continuation(quiet, ply, -bonus);
            }
        }
    }

    fn update_continuation(&mut self, mv: Move, ply: usize, bonus: i32) {
        let us = self.board.side_to_move();
        let Some((_, piece)) = self.board.piece_at(mv.from()) else {
            return;
        };

        for back in [1usize, 2] {
            if let Some((prev_index, prev_to)) =
                ply.checked_sub(back).and_then(|p| self.ss[p].piece_to)
            {
                self.tables
                    .continuation
                    .table_mut(prev_index, prev_to)
                    .update(us, piece, mv.to(), bonus);
            }
        }
    }

    fn update_capture_history(&mut self, depth: i32, mv: Move) {
        let us = self.board.side_to_move();
        let bonus = history_bonus(depth);
        let Some((_, piece)) = self.board.piece_at(mv.from()) else {
            return;
        };
        let victim = if mv.is_en_passant() {
            crate::board::types::Piece::Pawn
        } else {
            match self.board.piece_at(mv.to()) {
                Some((_, p)) => p,
                None => return,
            }
        };
        self.tables.capture.update(us, piece, mv.to(), victim, bonus);
    }
}
