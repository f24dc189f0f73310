//! Staged move picker.
//!
//! Yields moves one at a time in the order the search wants to try them,
//! generating each class lazily: many nodes cut off after the first move
//! or two and never pay for full generation or sorting. Within a stage a
//! selection-sort step extracts the best remaining move.

use crate::board::movegen::GenType;
use crate::board::types::{Move, MoveList, Piece};
use crate::board::Board;
use crate::eval::psq::piece_eg;

use super::history::{ButterflyHistory, CaptureHistory, PieceToHistory};

/// History views needed to score quiet moves at generation time.
pub struct PickerContext<'a> {
    pub butterfly: &'a ButterflyHistory,
    pub capture: &'a CaptureHistory,
    pub cont1: Option<&'a PieceToHistory>,
    pub cont2: Option<&'a PieceToHistory>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Stage {
    TtMove,
    CaptureInit,
    GoodCaptures,
    Killer1,
    Killer2,
    CounterMove,
    QuietInit,
    Quiets,
    BadCaptures,
    EvasionInit,
    Evasions,
    QsearchCaptureInit,
    QsearchCaptures,
    Done,
}

pub struct MovePicker {
    stage: Stage,
    tt_move: Move,
    killers: [Move; 2],
    counter: Move,
    list: MoveList,
    bad_captures: MoveList,
    idx: usize,
    bad_idx: usize,
    qsearch_path: bool,
}

impl MovePicker {
    /// Picker for a main-search node.
    #[must_use]
    pub fn new(board: &Board, tt_move: Move, killers: [Move; 2], counter: Move) -> Self {
        let tt_usable = Self::tt_move_usable(board, tt_move);
        let mut picker = MovePicker {
            stage: Stage::TtMove,
            tt_move: if tt_usable { tt_move } else { Move::NONE },
            killers,
            counter,
            list: MoveList::new(),
            bad_captures: MoveList::new(),
            idx: 0,
            bad_idx: 0,
            qsearch_path: false,
        };
        if !tt_usable {
            picker.advance_from_tt(board);
        }
        picker
    }

    /// Picker for a quiescence node (captures only, evasions in check).
    #[must_use]
    pub fn new_qsearch(board: &Board, tt_move: Move) -> Self {
        let tt_usable = Self::tt_move_usable(board, tt_move)
            && (board.in_check() || board.is_tactical(tt_move));
        let mut picker = MovePicker {
            stage: Stage::TtMove,
            tt_move: if tt_usable { tt_move } else { Move::NONE },
            killers: [Move::NONE; 2],
            counter: Move::NONE,
            list: MoveList::new(),
            bad_captures: MoveList::new(),
            idx: 0,
            bad_idx: 0,
            qsearch_path: true,
        };
        if !tt_usable {
            picker.advance_from_tt(board);
        }
        picker
    }

    fn tt_move_usable(board: &Board, tt_move: Move) -> bool {
        tt_move.is_some() && board.is_pseudo_legal(tt_move)
    }

    fn advance_from_tt(&mut self, board: &Board) {
        self.stage = if board.in_check() {
            Stage::EvasionInit
        } else if self.qsearch_path {
            Stage::QsearchCaptureInit
        } else {
            Stage::CaptureInit
        };
    }

    /// Produce the next move, or `None` when exhausted. `skip_quiets`
    /// truncates the quiet stages (late-move pruning).
    pub fn next(&mut self, board: &Board, ctx: &PickerContext, skip_quiets: bool) -> Option<Move> {
        loop {
            match self.stage {
                Stage::TtMove => {
                    self.advance_from_tt(board);
                    if self.tt_move.is_some() {
                        return Some(self.tt_move);
                    }
                }
                Stage::CaptureInit | Stage::QsearchCaptureInit => {
                    self.list.clear();
                    board.generate(&mut self.list, GenType::Captures);
                    self.score_captures(board, ctx);
                    self.idx = 0;
                    self.stage = if self.stage == Stage::CaptureInit {
                        Stage::GoodCaptures
                    } else {
                        Stage::QsearchCaptures
                    };
                }
                Stage::GoodCaptures => match self.list.pick_best(self.idx) {
                    Some(em) => {
                        self.idx += 1;
                        if em.mv == self.tt_move {
                            continue;
                        }
                        if board.see_ge(em.mv, 0) {
                            return Some(em.mv);
                        }
                        self.bad_captures.push(em.mv);
                    }
                    None => self.stage = Stage::Killer1,
                },
                Stage::Killer1 => {
                    self.stage = Stage::Killer2;
                    let killer = self.killers[0];
                    if self.is_quiet_candidate(board, killer) {
                        return Some(killer);
                    }
                }
                Stage::Killer2 => {
                    self.stage = Stage::CounterMove;
                    let killer = self.killers[1];
                    if self.is_quiet_candidate(board, killer) {
                        return Some(killer);
                    }
                }
                Stage::CounterMove => {
                    self.stage = Stage::QuietInit;
                    let counter = self.counter;
                    if counter != self.killers[0]
                        && counter != self.killers[1]
                        && self.is_quiet_candidate(board, counter)
                    {
                        return Some(counter);
                    }
                }
                Stage::QuietInit => {
                    if skip_quiets {
                        self.stage = Stage::BadCaptures;
                        self.bad_idx = 0;
                        continue;
                    }
                    self.list.clear();
                    board.generate(&mut self.list, GenType::Quiets);
                    self.score_quiets(board, ctx);
                    self.idx = 0;
                    self.stage = Stage::Quiets;
                }
                Stage::Quiets => {
                    if skip_quiets {
                        self.stage = Stage::BadCaptures;
                        self.bad_idx = 0;
                        continue;
                    }
                    match self.list.pick_best(self.idx) {
                        Some(em) => {
                            self.idx += 1;
                            let mv = em.mv;
                            if mv == self.tt_move
                                || mv == self.killers[0]
                                || mv == self.killers[1]
                                || mv == self.counter
                            {
                                continue;
                            }
                            return Some(mv);
                        }
                        None => {
                            self.stage = Stage::BadCaptures;
                            self.bad_idx = 0;
                        }
                    }
                }
                Stage::BadCaptures => {
                    if self.bad_idx < self.bad_captures.len() {
                        let mv = self.bad_captures[self.bad_idx].mv;
                        self.bad_idx += 1;
                        return Some(mv);
                    }
                    self.stage = Stage::Done;
                }
                Stage::EvasionInit => {
                    self.list.clear();
                    board.generate(&mut self.list, GenType::Evasions);
                    self.score_evasions(board, ctx);
                    self.idx = 0;
                    self.stage = Stage::Evasions;
                }
                Stage::Evasions => match self.list.pick_best(self.idx) {
                    Some(em) => {
                        self.idx += 1;
                        if em.mv == self.tt_move {
                            continue;
                        }
                        return Some(em.mv);
                    }
                    None => self.stage = Stage::Done,
                },
                Stage::QsearchCaptures => match self.list.pick_best(self.idx) {
                    Some(em) => {
                        self.idx += 1;
                        if em.mv == self.tt_move {
                            continue;
                        }
                        return Some(em.mv);
                    }
                    None => self.stage = Stage::Done,
                },
                Stage::Done => return None,
            }
        }
    }

    fn is_quiet_candidate(&self, board: &Board, mv: Move) -> bool {
        mv.is_some()
            && mv != self.tt_move
            && board.is_pseudo_legal(mv)
            && !board.is_tactical(mv)
    }

    /// MVV-LVA plus capture history; promotions score by the piece they
    /// make.
    fn score_captures(&mut self, board: &Board, ctx: &PickerContext) {
        let us = board.side_to_move();
        for em in self.list.as_mut_slice() {
            let mv = em.mv;
            let victim = if mv.is_en_passant() {
                Piece::Pawn
            } else {
                board.piece_at(mv.to()).map_or(Piece::Pawn, |(_, p)| p)
            };
            let (_, attacker) = board.piece_at(mv.from()).expect("capture from empty square");

            em.score = if mv.is_promotion() {
                4096 + piece_eg(mv.promotion_piece())
            } else {
                2048 + (victim.index() as i32 * 8 - attacker.index() as i32)
                    + ctx.capture.get(us, attacker, mv.to(), victim)
            };
        }
    }

    /// Butterfly plus the two continuation histories.
    fn score_quiets(&mut self, board: &Board, ctx: &PickerContext) {
        let us = board.side_to_move();
        for em in self.list.as_mut_slice() {
            let mv = em.mv;
            let (_, piece) = board.piece_at(mv.from()).expect("quiet from empty square");

            let mut score = ctx.butterfly.get(us, mv);
            if let Some(cont) = ctx.cont1 {
                score += cont.get(us, piece, mv.to());
            }
            if let Some(cont) = ctx.cont2 {
                score += cont.get(us, piece, mv.to());
            }
            em.score = score;
        }
    }

    /// Captures first (by victim value), then quiets by history.
    fn score_evasions(&mut self, board: &Board, ctx: &PickerContext) {
        let us = board.side_to_move();
        for em in self.list.as_mut_slice() {
            let mv = em.mv;
            if board.is_capture(mv) {
                let victim = if mv.is_en_passant() {
                    Piece::Pawn
                } else {
                    board.piece_at(mv.to()).map_or(Piece::Pawn, |(_, p)| p)
                };
                let (_, attacker) =
                    board.piece_at(mv.from()).expect("evasion from empty square");
                em.score =
                    (1 << 20) + victim.index() as i32 * 8 - attacker.index() as i32;
            } else {
                em.score = ctx.butterfly.get(us, mv);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::history::HistoryTables;

    fn context(tables: &HistoryTables) -> PickerContext<'_> {
        PickerContext {
            butterfly: &tables.butterfly,
            capture: &tables.capture,
            cont1: None,
            cont2: None,
        }
    }

    fn drain(board: &Board, mut picker: MovePicker, ctx: &PickerContext) -> Vec<Move> {
        let mut out = Vec::new();
        while let Some(mv) = picker.next(board, ctx, false) {
            out.push(mv);
        }
        out
    }

    #[test]
    fn test_yields_every_legal_move_once() {
        let board =
            Board::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
                .unwrap();
        let tables = HistoryTables::new();
        let ctx = context(&tables);
        let picker = MovePicker::new(&board, Move::NONE, [Move::NONE; 2], Move::NONE);
        let picked = drain(&board, picker, &ctx);

        let legal = board.generate_legal();
        for mv in legal.iter() {
            assert!(
                picked.contains(&mv),
                "legal move {mv:?} missing from picker output"
            );
        }

        // No duplicates
        let mut seen = std::collections::HashSet::new();
        for mv in &picked {
            assert!(seen.insert(*mv), "move {mv:?} yielded twice");
        }
    }

    #[test]
    fn test_tt_move_comes_first() {
        let board = Board::startpos();
        let tables = HistoryTables::new();
        let ctx = context(&tables);
        let tt_move = board.parse_uci_move("d2d4").unwrap();
        let picker = MovePicker::new(&board, tt_move, [Move::NONE; 2], Move::NONE);
        let picked = drain(&board, picker, &ctx);
        assert_eq!(picked[0], tt_move);
        assert_eq!(picked.iter().filter(|m| **m == tt_move).count(), 1);
    }

    #[test]
    fn test_winning_capture_before_quiets() {
        // White can win a queen with e4xd5
        let board =
            Board::from_fen("rnb1kbnr/ppp1pppp/8/3q4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 3")
                .unwrap();
        let tables = HistoryTables::new();
        let ctx = context(&tables);
        let picker = MovePicker::new(&board, Move::NONE, [Move::NONE; 2], Move::NONE);
        let picked = drain(&board, picker, &ctx);
        assert_eq!(picked[0], board.parse_uci_move("e4d5").unwrap());
    }

    #[test]
    fn test_qsearch_picker_yields_tacticals_only() {
        let board =
            Board::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
                .unwrap();
        let tables = HistoryTables::new();
        let ctx = context(&tables);
        let picker = MovePicker::new_qsearch(&board, Move::NONE);
        let picked = drain(&board, picker, &ctx);
        assert!(!picked.is_empty());
        for mv in picked {
            assert!(board.is_tactical(mv), "{mv:?} is not tactical");
        }
    }

    #[test]
    fn test_evasion_path_when_in_check() {
        let board =
            Board::from_fen("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3")
                .unwrap();
        assert!(board.in_check());
        let tables = HistoryTables::new();
        let ctx = context(&tables);
        let picker = MovePicker::new(&board, Move::NONE, [Move::NONE; 2], Move::NONE);
        let picked = drain(&board, picker, &ctx);
        let legal = board.generate_legal();
        for mv in legal.iter() {
            assert!(picked.contains(&mv));
        }
    }
}
