//! Applying and reverting moves, legality tests, and check detection.

use super::attack_tables::{
    aligned, between, bishop_attacks, pawn_attacks, piece_attacks, rook_attacks,
};
use super::state::{Board, StateInfo};
use super::types::{Bitboard, CastlingRights, Color, Move, MoveKind, Piece, Square};
use super::zobrist::ZOBRIST;
use crate::eval::psq;

impl Board {
    /// Apply a legal move, computing whether it gives check on the fly.
    pub fn do_move(&mut self, mv: Move) {
        let gives_check = self.gives_check(mv);
        self.do_move_gc(mv, gives_check);
    }

    /// Apply a legal move with a precomputed gives-check flag.
    ///
    /// The state update order mirrors the incremental key maintenance:
    /// capture removal, piece movement, en-passant publication, castling
    /// rights, then the derived check info and repetition marker.
    pub fn do_move_gc(&mut self, mv: Move, gives_check: bool) {
        let z = &*ZOBRIST;
        let us = self.side_to_move();
        let them = !us;
        let from = mv.from();
        let mut to = mv.to();
        let (_, piece) = self.piece_at(from).expect("do_move from empty square");

        let mut captured = if mv.is_en_passant() {
            Some(Piece::Pawn)
        } else {
            self.piece_at(to).map(|(_, p)| p)
        };
        debug_assert!(captured != Some(Piece::King));

        let st = self.state();
        let mut key = st.key ^ z.side_to_move;
        let mut new_st = StateInfo {
            castling_rights: st.castling_rights,
            rule50: st.rule50 + 1,
            plies_from_null: st.plies_from_null + 1,
            ep_square: st.ep_square,
            key: 0,
            king_pawn_key: st.king_pawn_key,
            material_key: st.material_key,
            material: st.material,
            captured: None,
            checkers: Bitboard::EMPTY,
            king_blockers: [Bitboard::EMPTY; 2],
            pinners: [Bitboard::EMPTY; 2],
            check_squares: [Bitboard::EMPTY; 6],
            repetition: 0,
        };

        self.bump_ply();

        // Castling swaps both pieces in one pass; the "captured" rook is
        // our own and is not a capture.
        if mv.is_castling() {
            let (rook_from, rook_to) = self.do_castling(us, from, &mut to);
            key ^= z.piece(us, Piece::Rook, rook_from) ^ z.piece(us, Piece::Rook, rook_to);
            captured = None;
        }

        if let Some(cap) = captured {
            let mut cap_sq = to;
            if cap == Piece::Pawn {
                if mv.is_en_passant() {
                    cap_sq = cap_sq.offset(-us.pawn_direction());
                }
                new_st.king_pawn_key ^= z.piece(them, Piece::Pawn, cap_sq);
            } else {
                new_st.material[them.index()] -= psq::piece_mg(cap);
            }

            self.remove_piece(cap_sq);
            key ^= z.piece(them, cap, cap_sq);
            new_st.material_key ^= z.material(them, cap, self.count(them, cap) as usize);
            new_st.rule50 = 0;
        }

        key ^= z.piece(us, piece, from) ^ z.piece(us, piece, to);

        if let Some(ep) = new_st.ep_square.take() {
            key ^= z.ep_file(ep.file());
        }

        if new_st.castling_rights.any() {
            let touched = self.castling_mask[from.index()] | self.castling_mask[to.index()];
            if touched != 0 {
                let lost = new_st.castling_rights & CastlingRights::from_bits(touched);
                key ^= z.castling_rights(lost);
                new_st.castling_rights &= !lost;
            }
        }

        if !mv.is_castling() {
            self.move_piece(from, to);
        }

        if piece == Piece::Pawn {
            new_st.king_pawn_key ^= z.piece(us, Piece::Pawn, from) ^ z.piece(us, Piece::Pawn, to);
            new_st.rule50 = 0;

            if from.rank_distance(to) == 2 {
                // Publish the en-passant square only when an enemy pawn
                // can actually capture there.
                let ep = to.offset(-us.pawn_direction());
                if (pawn_attacks(us, ep) & self.pieces(them, Piece::Pawn)).any() {
                    new_st.ep_square = Some(ep);
                    key ^= z.ep_file(ep.file());
                }
            } else if mv.is_promotion() {
                let promo = mv.promotion_piece();
                self.remove_piece(to);
                self.put_piece(us, promo, to);

                key ^= z.piece(us, Piece::Pawn, to) ^ z.piece(us, promo, to);
                new_st.king_pawn_key ^= z.piece(us, Piece::Pawn, to);
                new_st.material[us.index()] += psq::piece_mg(promo);
                new_st.material_key ^=
                    z.material(us, promo, self.count(us, promo) as usize - 1);
                new_st.material_key ^= z.material(us, Piece::Pawn, self.count(us, Piece::Pawn) as usize);
            }
        } else if piece == Piece::King {
            new_st.king_pawn_key ^= z.piece(us, Piece::King, from) ^ z.piece(us, Piece::King, to);
        }

        new_st.captured = captured;
        new_st.key = key;
        new_st.checkers = if gives_check {
            self.attackers_to(self.king_square(them)) & self.by_color(us)
        } else {
            Bitboard::EMPTY
        };

        self.flip_side_to_move();
        self.push_state(new_st);
        self.set_check_info();
        self.update_repetition();

        #[cfg(debug_assertions)]
        self.assert_consistent();
    }

    /// Move king and rook to their castling destinations. `to` arrives as
    /// the rook's square and leaves as the king's destination.
    fn do_castling(&mut self, us: Color, king_from: Square, to: &mut Square) -> (Square, Square) {
        let kingside = *to > king_from;
        let rook_from = *to;
        let rook_to = if kingside { Square::F1 } else { Square::D1 }.relative(us);
        *to = if kingside { Square::G1 } else { Square::C1 }.relative(us);

        self.remove_piece(king_from);
        self.remove_piece(rook_from);
        self.put_piece(us, Piece::King, *to);
        self.put_piece(us, Piece::Rook, rook_to);

        (rook_from, rook_to)
    }

    fn undo_castling(&mut self, us: Color, king_from: Square, rook_from: Square) {
        let kingside = rook_from > king_from;
        let rook_to = if kingside { Square::F1 } else { Square::D1 }.relative(us);
        let king_to = if kingside { Square::G1 } else { Square::C1 }.relative(us);

        self.remove_piece(king_to);
        self.remove_piece(rook_to);
        self.put_piece(us, Piece::King, king_from);
        self.put_piece(us, Piece::Rook, rook_from);
    }

    /// Revert the last applied move. No key recomputation is needed; the
    /// popped frame carries everything.
    pub fn undo_move(&mut self, mv: Move) {
        self.flip_side_to_move();
        let us = self.side_to_move();
        let from = mv.from();
        let to = mv.to();

        if mv.is_promotion() {
            self.remove_piece(to);
            self.put_piece(us, Piece::Pawn, to);
        }

        if mv.is_castling() {
            self.undo_castling(us, from, to);
        } else {
            self.move_piece(to, from);

            if let Some(captured) = self.state().captured {
                let mut cap_sq = to;
                if mv.is_en_passant() {
                    cap_sq = cap_sq.offset(-us.pawn_direction());
                }
                self.put_piece(!us, captured, cap_sq);
            }
        }

        self.pop_state();
        self.unbump_ply();
    }

    /// Flip the side to move without moving a piece. Requires the side to
    /// move not to be in check and is only used by null-move pruning.
    pub fn do_null_move(&mut self) {
        debug_assert!(!self.in_check());
        let z = &*ZOBRIST;

        let mut new_st = self.state().clone();
        new_st.key ^= z.side_to_move;
        new_st.rule50 += 1;
        new_st.plies_from_null = 0;
        new_st.repetition = 0;
        new_st.captured = None;
        if let Some(ep) = new_st.ep_square.take() {
            new_st.key ^= z.ep_file(ep.file());
        }

        self.flip_side_to_move();
        self.push_state(new_st);
        self.set_check_info();
    }

    pub fn undo_null_move(&mut self) {
        self.pop_state();
        self.flip_side_to_move();
    }

    // ------------------------------------------------------------------
    // Legality
    // ------------------------------------------------------------------

    /// Full legality check for a pseudo-legal move, without applying it.
    ///
    /// Three specialized tests: en-passant captures rebuild the occupancy
    /// minus both pawns and look for discovered slider rays; castlings
    /// scan every square the king crosses for enemy attacks (plus the
    /// vacated-rook ray in Chess960); all other moves only need the pin
    /// ray test, or a destination-attack test for king moves.
    #[must_use]
    pub fn is_legal(&self, mv: Move) -> bool {
        let us = self.side_to_move();
        let them = !us;
        let from = mv.from();
        let to = mv.to();
        let king = self.king_square(us);

        match mv.kind() {
            MoveKind::EnPassant => {
                let cap_sq = to.offset(-us.pawn_direction());
                let occupancy = (self.occupied()
                    ^ Bitboard::from_square(from)
                    ^ Bitboard::from_square(cap_sq))
                    | Bitboard::from_square(to);

                let sliders = (rook_attacks(king, occupancy)
                    & self.by_types(Piece::Rook, Piece::Queen))
                    | (bishop_attacks(king, occupancy)
                        & self.by_types(Piece::Bishop, Piece::Queen));
                (sliders & self.by_color(them)).is_empty()
            }
            MoveKind::Castling => {
                let kingside = to > from;
                let king_to = if kingside { Square::G1 } else { Square::C1 }.relative(us);

                let mut path = between(from, king_to) | Bitboard::from_square(king_to);
                path &= !Bitboard::from_square(from);
                for sq in path {
                    if self.is_attacked_by(sq, them) {
                        return false;
                    }
                }

                if self.is_chess960() {
                    // The rook may have been shielding the king's arrival
                    // square along the home rank.
                    let occupancy = self.occupied() ^ Bitboard::from_square(to);
                    if (rook_attacks(king_to, occupancy)
                        & self.by_types(Piece::Rook, Piece::Queen)
                        & self.by_color(them))
                        .any()
                    {
                        return false;
                    }
                }
                true
            }
            _ => {
                if from == king {
                    let occupancy = self.occupied() ^ Bitboard::from_square(from);
                    return (self.attackers_to_occ(to, occupancy) & self.by_color(them)).is_empty();
                }

                // A pinned piece may only move along its pin ray.
                !self.state().king_blockers[us.index()].contains(from)
                    || aligned(from, to, king)
            }
        }
    }

    /// Does a move of the side to move match a piece's movement pattern
    /// and the occupancy? Used to vet transposition-table moves before
    /// trusting them; special move kinds take the slow generation path.
    #[must_use]
    pub fn is_pseudo_legal(&self, mv: Move) -> bool {
        if !mv.is_some() {
            return false;
        }

        let us = self.side_to_move();
        let from = mv.from();
        let to = mv.to();

        if mv.kind() != MoveKind::Normal {
            let mut list = super::types::MoveList::new();
            if self.in_check() {
                self.generate(&mut list, super::movegen::GenType::Evasions);
            } else {
                self.generate(&mut list, super::movegen::GenType::All);
            }
            return list.contains(mv);
        }

        let Some((color, piece)) = self.piece_at(from) else {
            return false;
        };
        if color != us {
            return false;
        }
        if self.by_color(us).contains(to) {
            return false;
        }

        if piece == Piece::Pawn {
            // Promotions carry their own move kind
            if (Bitboard::RANK_1 | Bitboard::RANK_8).contains(to) {
                return false;
            }

            let push = from.offset(us.pawn_direction());
            let double_push_ok = from.relative_rank(us) == 1
                && to == from.offset(2 * us.pawn_direction())
                && self.piece_at(push).is_none()
                && self.piece_at(to).is_none();
            let single_push_ok = to == push && self.piece_at(to).is_none();
            let capture_ok =
                pawn_attacks(us, from).contains(to) && self.by_color(!us).contains(to);

            if !single_push_ok && !double_push_ok && !capture_ok {
                return false;
            }
        } else if !piece_attacks(piece, from, self.occupied()).contains(to) {
            return false;
        }

        // While in check, only evasions qualify.
        let checkers = self.checkers();
        if checkers.any() {
            if piece != Piece::King {
                if checkers.more_than_one() {
                    return false;
                }
                let checker = checkers.first_square();
                let king = self.king_square(us);
                if !(between(king, checker) | Bitboard::from_square(checker)).contains(to) {
                    return false;
                }
            }
        }

        true
    }

    /// Does this move give check? Resolved from the precomputed check
    /// squares plus the discovered-check blocker test; the special move
    /// kinds recompute the relevant slider rays on a patched occupancy.
    #[must_use]
    pub fn gives_check(&self, mv: Move) -> bool {
        let us = self.side_to_move();
        let them = !us;
        let from = mv.from();
        let to = mv.to();
        let their_king = self.king_square(them);
        let st = self.state();
        let (_, piece) = self.piece_at(from).expect("gives_check from empty square");

        // Direct check from the moved piece
        if piece != Piece::King && st.check_squares[piece.index()].contains(to) {
            return true;
        }

        // Discovered check: the mover was blocking a slider line to the
        // enemy king and does not stay on it.
        if st.king_blockers[them.index()].contains(from) && !aligned(from, to, their_king) {
            return true;
        }

        match mv.kind() {
            MoveKind::Normal => false,
            MoveKind::Promotion => {
                let occupancy = self.occupied() ^ Bitboard::from_square(from);
                piece_attacks(mv.promotion_piece(), to, occupancy).contains(their_king)
            }
            MoveKind::EnPassant => {
                let cap_sq = to.offset(-us.pawn_direction());
                let occupancy = (self.occupied()
                    ^ Bitboard::from_square(from)
                    ^ Bitboard::from_square(cap_sq))
                    | Bitboard::from_square(to);

                ((rook_attacks(their_king, occupancy)
                    & self.by_types(Piece::Rook, Piece::Queen))
                    | (bishop_attacks(their_king, occupancy)
                        & self.by_types(Piece::Bishop, Piece::Queen)))
                    .intersects(self.by_color(us))
            }
            MoveKind::Castling => {
                let kingside = to > from;
                let rook_to = if kingside { Square::F1 } else { Square::D1 }.relative(us);
                let king_to = if kingside { Square::G1 } else { Square::C1 }.relative(us);
                let occupancy = (self.occupied()
                    ^ Bitboard::from_square(from)
                    ^ Bitboard::from_square(to))
                    | Bitboard::from_square(king_to)
                    | Bitboard::from_square(rook_to);

                rook_attacks(rook_to, occupancy).contains(their_king)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::board::types::{Move, MoveKind};
    use crate::board::Board;

    fn snapshot(board: &Board) -> (String, u64, u64, u64) {
        (
            board.fen(),
            board.key(),
            board.king_pawn_key(),
            board.material_key(),
        )
    }

    #[test]
    fn test_make_unmake_restores_board() {
        let fens = [
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "n1n5/PPPk4/8/8/8/8/4Kppp/5N1N b - - 0 1",
        ];

        for fen in fens {
            let mut board = Board::from_fen(fen).unwrap();
            let before = snapshot(&board);
            let moves = board.generate_legal();
            for mv in moves.iter() {
                board.do_move(mv);
                board.undo_move(mv);
                assert_eq!(snapshot(&board), before, "undo mismatch after {mv:?} in {fen}");
            }
        }
    }

    #[test]
    fn test_null_move_roundtrip() {
        let mut board =
            Board::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
                .unwrap();
        let before = snapshot(&board);
        board.do_null_move();
        assert_ne!(board.key(), before.1);
        board.undo_null_move();
        assert_eq!(snapshot(&board), before);
    }

    #[test]
    fn test_gives_check_matches_reality() {
        let fens = [
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        ];
        for fen in fens {
            let mut board = Board::from_fen(fen).unwrap();
            let moves = board.generate_legal();
            for mv in moves.iter() {
                let predicted = board.gives_check(mv);
                board.do_move_gc(mv, predicted);
                assert_eq!(
                    board.in_check(),
                    predicted,
                    "gives_check mismatch for {mv:?} in {fen}"
                );
                board.undo_move(mv);
            }
        }
    }

    #[test]
    fn test_ep_capture_and_undo() {
        let mut board =
            Board::from_fen("rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 3")
                .unwrap();
        let before = snapshot(&board);
        let ep = board.parse_uci_move("d4e3").unwrap();
        assert_eq!(ep.kind(), MoveKind::EnPassant);
        board.do_move(ep);
        assert!(board.piece_at("e4".parse().unwrap()).is_none());
        board.undo_move(ep);
        assert_eq!(snapshot(&board), before);
    }

    #[test]
    fn test_repetition_marker() {
        let mut board = Board::startpos();
        for uci in ["g1f3", "g8f6", "f3g1", "f6g8"] {
            let mv = board.parse_uci_move(uci).unwrap();
            board.do_move(mv);
        }
        // Back to the starting position: repetition at distance 4.
        // It only counts as a search-tree draw when the repeat lies
        // strictly inside the tree (ply greater than the distance).
        assert_eq!(board.state().repetition, 4);
        assert!(!board.is_draw(2));
        assert!(board.is_draw(5));
    }

    #[test]
    fn test_pseudo_legal_rejects_foreign_moves() {
        let board = Board::startpos();
        // Knight move pattern from an empty square
        assert!(!board.is_pseudo_legal(Move::new(
            "e4".parse().unwrap(),
            "f6".parse().unwrap()
        )));
        // Rook cannot jump over pawns
        assert!(!board.is_pseudo_legal(Move::new(
            "a1".parse().unwrap(),
            "a5".parse().unwrap()
        )));
        assert!(board.is_pseudo_legal(Move::new(
            "g1".parse().unwrap(),
            "f3".parse().unwrap()
        )));
    }
}
