//! Zobrist hashing for chess positions.
//!
//! Provides incrementally-updatable 64-bit position keys for the
//! transposition table, plus the king-pawn key used by the pawn cache and
//! the material-signature key used by endgame recognition.

use once_cell::sync::Lazy;
use rand::prelude::*;

use super::types::{CastlingRights, Color, Piece, Square};

pub(crate) struct ZobristKeys {
    /// `psq[color][piece][square]`. The square axis doubles as a piece
    /// count when building material-signature keys.
    pub(crate) psq: [[[u64; 64]; 6]; 2],
    /// One key per en-passant file
    pub(crate) en_passant: [u64; 8],
    /// One key per castling-rights subset; composites are XOR-combinations
    /// of the single-right keys so that incremental right removal works.
    pub(crate) castling: [u64; 16],
    pub(crate) side_to_move: u64,
}

impl ZobristKeys {
    fn new() -> Self {
        // Fixed seed for reproducible keys across runs
        let mut rng = StdRng::seed_from_u64(0x7FA3_1E05_9D42_C6B8);
        let mut psq = [[[0u64; 64]; 6]; 2];
        let mut en_passant = [0u64; 8];
        let mut castling = [0u64; 16];

        for color in &mut psq {
            for piece in color.iter_mut() {
                for key in piece.iter_mut() {
                    *key = rng.gen();
                }
            }
        }

        for key in &mut en_passant {
            *key = rng.gen();
        }

        let single: [u64; 4] = [rng.gen(), rng.gen(), rng.gen(), rng.gen()];
        for (mask, slot) in castling.iter_mut().enumerate() {
            for (bit, key) in single.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    *slot ^= key;
                }
            }
        }

        let side_to_move = rng.gen();

        ZobristKeys {
            psq,
            en_passant,
            castling,
            side_to_move,
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn piece(&self, color: Color, piece: Piece, sq: Square) -> u64 {
        self.psq[color.index()][piece.index()][sq.index()]
    }

    #[inline]
    #[must_use]
    pub(crate) fn ep_file(&self, file: usize) -> u64 {
        self.en_passant[file]
    }

    #[inline]
    #[must_use]
    pub(crate) fn castling_rights(&self, rights: CastlingRights) -> u64 {
        self.castling[rights.bits()]
    }

    /// Key contribution of the `count`-th piece of a kind, for the
    /// material-signature key.
    #[inline]
    #[must_use]
    pub(crate) fn material(&self, color: Color, piece: Piece, count: usize) -> u64 {
        self.psq[color.index()][piece.index()][count]
    }
}

pub(crate) static ZOBRIST: Lazy<ZobristKeys> = Lazy::new(ZobristKeys::new);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_distinct() {
        let z = &*ZOBRIST;
        let mut seen = std::collections::HashSet::new();
        for color in [Color::White, Color::Black] {
            for piece in crate::board::types::ALL_PIECES {
                for sq in Square::all() {
                    assert!(seen.insert(z.piece(color, piece, sq)));
                }
            }
        }
        assert!(seen.insert(z.side_to_move));
        for file in 0..8 {
            assert!(seen.insert(z.ep_file(file)));
        }
    }

    #[test]
    fn test_castling_keys_compose() {
        let z = &*ZOBRIST;
        let k = z.castling_rights(CastlingRights::WHITE_KINGSIDE);
        let q = z.castling_rights(CastlingRights::BLACK_QUEENSIDE);
        let both = z.castling_rights(CastlingRights::WHITE_KINGSIDE | CastlingRights::BLACK_QUEENSIDE);
        assert_eq!(k ^ q, both);
        assert_eq!(z.castling_rights(CastlingRights::NONE), 0);
    }
}
