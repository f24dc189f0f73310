//! Static Exchange Evaluation.
//!
//! Answers "does this move win at least `threshold` centipawns of
//! material after all exchanges on the target square?" without applying
//! any move. Pieces capture in ascending value order; removing a slider
//! exposes x-ray attackers behind it, and attackers pinned against their
//! own king are excluded.

use super::attack_tables::{bishop_attacks, rook_attacks};
use super::state::Board;
use super::types::{Bitboard, Move, MoveKind, Piece, Score};

/// Fixed piece values for exchange evaluation, independent from the
/// positional evaluation tables.
pub(crate) const SEE_VALUES: [Score; 6] = [100, 300, 300, 500, 900, 0];

#[inline]
#[must_use]
pub(crate) fn see_value(piece: Piece) -> Score {
    SEE_VALUES[piece.index()]
}

impl Board {
    /// True when the static exchange outcome of `mv` is at least
    /// `threshold`.
    ///
    /// Castling and en passant don't fit the single-square exchange model
    /// and are treated as material-neutral; promotions are evaluated on
    /// the pawn's value without the promotion gain.
    #[must_use]
    pub fn see_ge(&self, mv: Move, threshold: Score) -> bool {
        if mv.kind() != MoveKind::Normal && mv.kind() != MoveKind::Promotion {
            return threshold <= 0;
        }

        let from = mv.from();
        let to = mv.to();

        let mut next_value = self
            .piece_at(to)
            .map_or(0, |(_, piece)| see_value(piece))
            - threshold;

        // The capture alone doesn't reach the threshold.
        if next_value < 0 {
            return false;
        }

        let (attacker_color, attacker) = self.piece_at(from).expect("see_ge from empty square");
        next_value = see_value(attacker) - next_value;

        // Even losing the capturing piece keeps us at the threshold.
        if next_value <= 0 {
            return true;
        }

        let mut occupancy =
            self.occupied() ^ Bitboard::from_square(from) ^ Bitboard::from_square(to);
        let mut side_to_move = attacker_color;
        let mut attackers = self.attackers_to_occ(to, occupancy);
        let mut result = true;

        loop {
            side_to_move = !side_to_move;
            attackers &= occupancy;

            let mut stm_attackers = attackers & self.by_color(side_to_move);
            if stm_attackers.is_empty() {
                break;
            }

            // Pinned pieces can't join the exchange while the pinning
            // slider is still standing.
            if (self.state().pinners[(!side_to_move).index()] & occupancy).any() {
                stm_attackers &= !self.state().king_blockers[side_to_move.index()];
                if stm_attackers.is_empty() {
                    break;
                }
            }

            result = !result;

            // Capture with the least valuable attacker, updating x-rays.
            let mut captured = None;
            for piece in [
                Piece::Pawn,
                Piece::Knight,
                Piece::Bishop,
                Piece::Rook,
                Piece::Queen,
            ] {
                let candidates = stm_attackers & self.by_type(piece);
                if candidates.any() {
                    captured = Some((piece, candidates.isolate_first()));
                    break;
                }
            }

            match captured {
                Some((piece, bit)) => {
                    next_value = see_value(piece) - next_value;
                    if next_value < Score::from(result) {
                        break;
                    }

                    occupancy ^= bit;
                    if piece == Piece::Pawn || piece.slides_diagonally() {
                        attackers |= bishop_attacks(to, occupancy)
                            & self.by_types(Piece::Bishop, Piece::Queen);
                    }
                    if piece.slides_straight() {
                        attackers |=
                            rook_attacks(to, occupancy) & self.by_types(Piece::Rook, Piece::Queen);
                    }
                }
                None => {
                    // Only the king can recapture; it may do so only when
                    // the opponent has no attackers left.
                    return if (attackers & !self.by_color(side_to_move) & occupancy).any() {
                        !result
                    } else {
                        result
                    };
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(board: &Board, s: &str) -> Move {
        board.parse_uci_move(s).unwrap()
    }

    #[test]
    fn test_winning_capture() {
        // Pawn takes queen: always winning
        let board = Board::from_fen("4k3/8/8/3q4/4P3/8/8/4K3 w - - 0 1").unwrap();
        let capture = mv(&board, "e4d5");
        assert!(board.see_ge(capture, 0));
        assert!(board.see_ge(capture, 800));
        assert!(!board.see_ge(capture, 1000));
    }

    #[test]
    fn test_losing_capture() {
        // Queen takes a defended pawn
        let board = Board::from_fen("4k3/2p5/3p4/8/3Q4/8/8/4K3 w - - 0 1").unwrap();
        let capture = mv(&board, "d4d6");
        assert!(!board.see_ge(capture, 0));
        assert!(board.see_ge(capture, 100 - 900));
    }

    #[test]
    fn test_equal_exchange() {
        // Rook takes rook, recaptured by rook: net zero
        let board = Board::from_fen("3rk3/8/8/8/8/8/8/3RK3 w - - 0 1").unwrap();
        let capture = mv(&board, "d1d8");
        assert!(board.see_ge(capture, 0));
        assert!(!board.see_ge(capture, 1));
    }

    #[test]
    fn test_xray_support() {
        // Doubled rooks win the exchange on d8: RxR, rxR? No - the second
        // white rook recaptures, leaving white a rook up.
        let board = Board::from_fen("3rk3/8/8/8/8/8/3R4/3RK3 w - - 0 1").unwrap();
        let capture = mv(&board, "d2d8");
        assert!(board.see_ge(capture, 0));
        assert!(board.see_ge(capture, 400));
    }

    #[test]
    fn test_quiet_move_threshold() {
        // A quiet move "wins" zero material
        let board = Board::startpos();
        let quiet = mv(&board, "e2e4");
        assert!(board.see_ge(quiet, 0));
        assert!(!board.see_ge(quiet, 1));
    }

    #[test]
    fn test_pinned_defender_excluded() {
        // The d7 knight is pinned against its king by the d1 rook, so it
        // cannot recapture on e5 and the pawn grab stands.
        let board = Board::from_fen("3k4/3n4/8/4p3/8/5N2/8/3RK3 w - - 0 1").unwrap();
        let capture = mv(&board, "f3e5");
        assert!(board.see_ge(capture, 100));

        // Same capture with the king off the pin ray is just a losing
        // knight-for-pawn trade.
        let board = Board::from_fen("k7/3n4/8/4p3/8/5N2/8/3RK3 w - - 0 1").unwrap();
        let capture = mv(&board, "f3e5");
        assert!(!board.see_ge(capture, 0));
    }
}
