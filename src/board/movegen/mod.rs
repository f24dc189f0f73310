//! Pseudo-legal and legal move generation.
//!
//! Four generator entry points share a target-mask driven core: all
//! pseudo-legal moves, captures only, quiets only, and check evasions.
//! `generate_legal` wraps them with the legality filter.

use super::attack_tables::{between, king_attacks, pawn_attacks, piece_attacks};
use super::state::Board;
use super::types::{Bitboard, CastlingRights, Color, Move, MoveList, Piece, Square};

/// Which subset of pseudo-legal moves to generate.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GenType {
    /// Every pseudo-legal move
    All,
    /// Captures, promotions, and en passant
    Captures,
    /// Non-captures without promotions
    Quiets,
    /// Moves that may resolve a check
    Evasions,
}

impl Board {
    /// Generate pseudo-legal moves of the requested type into `list`.
    ///
    /// `Evasions` must be used when the side to move is in check; the
    /// other types assume it is not.
    pub fn generate(&self, list: &mut MoveList, gen: GenType) {
        debug_assert!((gen == GenType::Evasions) == self.in_check());

        match gen {
            GenType::Evasions => self.generate_evasions(list),
            GenType::All => {
                self.generate_for_targets(
                    list,
                    !self.by_color(self.side_to_move()),
                    Bitboard::ALL,
                );
                self.generate_castling(list);
            }
            GenType::Captures => {
                // Push promotions count as noisy moves and are generated
                // here even though their target square is empty.
                self.generate_for_targets(
                    list,
                    self.by_color(!self.side_to_move()),
                    Bitboard::ALL,
                );
            }
            GenType::Quiets => {
                self.generate_for_targets(list, !self.occupied(), Bitboard::EMPTY);
                self.generate_castling(list);
            }
        }
    }

    /// All legal moves in the position.
    #[must_use]
    pub fn generate_legal(&self) -> MoveList {
        let mut list = MoveList::new();
        if self.in_check() {
            self.generate(&mut list, GenType::Evasions);
        } else {
            self.generate(&mut list, GenType::All);
        }
        list.retain(|mv| self.is_legal(mv));
        list
    }

    /// Core generator: pawn moves, piece moves, and king steps, all
    /// intersected with `targets`. `promo_pushes` additionally masks the
    /// squares where promotion pushes may land.
    fn generate_for_targets(&self, list: &mut MoveList, targets: Bitboard, promo_pushes: Bitboard) {
        let us = self.side_to_move();

        self.generate_pawn_moves(list, targets, promo_pushes);
        self.generate_piece_moves(list, targets);

        let king = self.king_square(us);
        for to in king_attacks(king) & targets {
            list.push(Move::new(king, to));
        }
    }

    fn generate_castling(&self, list: &mut MoveList) {
        let us = self.side_to_move();
        let king = self.king_square(us);

        for kingside in [true, false] {
            let right = CastlingRights::single(us, kingside);
            if !self.castling_rights().has(right) {
                continue;
            }
            let idx = right.index();
            if (self.castling_path[idx] & self.occupied()).any() {
                continue;
            }
            if let Some(rook) = self.castling_rook[idx] {
                list.push(Move::castling(king, rook));
            }
        }
    }

    fn generate_piece_moves(&self, list: &mut MoveList, targets: Bitboard) {
        let us = self.side_to_move();
        let occupied = self.occupied();

        for piece in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
            for from in self.pieces(us, piece) {
                for to in piece_attacks(piece, from, occupied) & targets {
                    list.push(Move::new(from, to));
                }
            }
        }
    }

    fn push_promotions(list: &mut MoveList, from: Square, to: Square) {
        for promo in super::types::PROMOTION_PIECES {
            list.push(Move::promotion(from, to, promo));
        }
    }

    fn generate_pawn_moves(&self, list: &mut MoveList, targets: Bitboard, promo_pushes: Bitboard) {
        let us = self.side_to_move();
        let them = !us;
        let pawns = self.pieces(us, Piece::Pawn);
        let empties = !self.occupied();
        let enemies = self.by_color(them) & targets;
        let promo_rank = if us == Color::White {
            Bitboard::RANK_8
        } else {
            Bitboard::RANK_1
        };
        let double_rank = if us == Color::White {
            Bitboard::RANK_3
        } else {
            Bitboard::RANK_6
        };
        let dir = us.pawn_direction();

        // Pushes (single, double, and push promotions)
        let single = pawns.shift_forward(us) & empties;
        let double = (single & double_rank).shift_forward(us) & empties & targets;

        for to in single & targets & !promo_rank {
            list.push(Move::new(to.offset(-dir), to));
        }
        for to in double {
            list.push(Move::new(to.offset(-2 * dir), to));
        }
        for to in single & promo_rank & promo_pushes {
            Self::push_promotions(list, to.offset(-dir), to);
        }

        // Captures (including capture promotions)
        for from in pawns {
            for to in pawn_attacks(us, from) & enemies {
                if promo_rank.contains(to) {
                    Self::push_promotions(list, from, to);
                } else {
                    list.push(Move::new(from, to));
                }
            }
        }

        // En passant: only when captures are in scope; evasions accept it
        // both to capture a checking pawn and to block on the target square
        if enemies.any() {
            if let Some(ep) = self.ep_square() {
                let cap_sq = ep.offset(-dir);
                if targets.contains(ep) || targets.contains(cap_sq) {
                    for from in pawn_attacks(them, ep) & pawns {
                        list.push(Move::en_passant(from, ep));
                    }
                }
            }
        }
    }

    fn generate_evasions(&self, list: &mut MoveList) {
        let us = self.side_to_move();
        let them = !us;
        let king = self.king_square(us);
        let checkers = self.checkers();
        debug_assert!(checkers.any());

        // King steps: exclude squares still covered by a checking slider,
        // using the occupancy without the king itself.
        let occupancy = self.occupied() ^ Bitboard::from_square(king);
        for to in king_attacks(king) & !self.by_color(us) {
            if (self.attackers_to_occ(to, occupancy) & self.by_color(them)).is_empty() {
                list.push(Move::new(king, to));
            }
        }

        // Double check: only the king may move.
        if checkers.more_than_one() {
            return;
        }

        // Block the checking line or capture the checker.
        let checker = checkers.first_square();
        let targets = between(king, checker) | Bitboard::from_square(checker);

        self.generate_pawn_moves(list, targets, targets);
        self.generate_piece_moves(list, targets);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startpos_move_count() {
        let board = Board::startpos();
        let moves = board.generate_legal();
        assert_eq!(moves.len(), 20);
    }

    #[test]
    fn test_capture_generation_subset() {
        let board =
            Board::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
                .unwrap();
        let mut captures = MoveList::new();
        board.generate(&mut captures, GenType::Captures);
        let mut quiets = MoveList::new();
        board.generate(&mut quiets, GenType::Quiets);
        let mut all = MoveList::new();
        board.generate(&mut all, GenType::All);

        // Captures and quiets (castling included) partition the full set
        assert_eq!(captures.len() + quiets.len(), all.len());

        for mv in captures.iter() {
            assert!(
                board.piece_at(mv.to()).is_some() || mv.is_en_passant() || mv.is_promotion(),
                "{mv:?} is not a capture"
            );
        }
    }

    #[test]
    fn test_evasions_only_resolve_check() {
        let board =
            Board::from_fen("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3")
                .unwrap();
        assert!(board.in_check());
        let legal = board.generate_legal();
        assert!(legal.len() > 0);
        let mut board = board;
        for mv in legal.iter() {
            board.do_move(mv);
            // After any evasion our king is safe
            let us = !board.side_to_move();
            assert!(!board.is_attacked_by(board.king_square(us), board.side_to_move()));
            board.undo_move(mv);
        }
    }

    #[test]
    fn test_double_check_king_moves_only() {
        // Knight on f6 and bishop on b5 both give check
        let board = Board::from_fen("4k3/8/5N2/1B6/8/8/8/4K3 b - - 0 1").unwrap();
        assert!(board.in_check());
        assert!(board.checkers().more_than_one());
        let legal = board.generate_legal();
        assert!(!legal.is_empty());
        for mv in legal.iter() {
            assert_eq!(board.piece_at(mv.from()).map(|(_, p)| p), Some(Piece::King));
        }
    }

    #[test]
    fn test_promotion_generation() {
        let board = Board::from_fen("n1n5/PPPk4/8/8/8/8/4Kppp/5N1N b - - 0 1").unwrap();
        let legal = board.generate_legal();
        let promos = legal.iter().filter(|m| m.is_promotion()).count();
        // g2g1, f2f1 are blocked-or-capture dependent; each promoting
        // move expands to four piece choices
        assert!(promos >= 4);
        assert_eq!(promos % 4, 0);
    }
}
