//! Piece values and piece-square tables.

use once_cell::sync::Lazy;

use crate::board::types::{Color, Piece, Score, ScorePair, Square};

pub(crate) const PIECE_MG: [Score; 6] = [100, 300, 330, 500, 900, 0];
pub(crate) const PIECE_EG: [Score; 6] = [200, 600, 660, 1000, 1800, 0];

/// Midgame material value of a piece.
#[inline]
#[must_use]
pub fn piece_mg(piece: Piece) -> Score {
    PIECE_MG[piece.index()]
}

/// Endgame material value of a piece.
#[inline]
#[must_use]
pub fn piece_eg(piece: Piece) -> Score {
    PIECE_EG[piece.index()]
}

const fn s(mg: i32, eg: i32) -> ScorePair {
    ScorePair::new(mg, eg)
}

/// Pawn bonus, full table (pawn play is not file-symmetric).
#[rustfmt::skip]
const PAWN_BONUS: [[ScorePair; 8]; 8] = [
    [s(0, 0); 8],
    [s(-14, 19), s(-14,  7), s(-11, 12), s( -6,  9), s( -7, 19), s( 35, 15), s( 33, -1), s(  7,-18)],
    [s(-11, 12), s(-11,  7), s( -2,  2), s(  3,  1), s( 18,  8), s( 12,  7), s( 29, -7), s(  9, -7)],
    [s( -9, 20), s(-10, 14), s(  1, -6), s(  7,-14), s( 16,-11), s( 21, -5), s( 12, -3), s(  3, -4)],
    [s( -9, 40), s( -5, 28), s(  0, 11), s( 21,-18), s( 35,-16), s( 50,-11), s( 19,  6), s(  2,  9)],
    [s( -5, 81), s( 19, 61), s( 38, 25), s( 40,-19), s( 60,-29), s(123, -8), s( 55, 17), s( 25, 29)],
    [s( 68, 28), s( 58, 19), s( 56, -7), s( 69,-50), s( 53,-54), s( 32,-39), s(-48, -9), s(-34,  2)],
    [s(0, 0); 8],
];

/// Piece bonuses, queenside half only (mirrored onto the kingside).
#[rustfmt::skip]
const KNIGHT_BONUS: [[ScorePair; 4]; 8] = [
    [s( -74, -75), s( -14, -61), s( -16, -36), s( -16, -25)],
    [s(  -5, -24), s( -22, -17), s( -10, -38), s(  -3, -20)],
    [s( -13, -60), s(   1, -25), s(  -8, -10), s(   6,  13)],
    [s(   8, -16), s(  21,  -3), s(  12,  29), s(  15,  32)],
    [s(  27, -19), s(  20,   5), s(  39,  28), s(  30,  38)],
    [s(   7, -32), s(  22,  -8), s(  45,  25), s(  49,  14)],
    [s(   6, -43), s( -12, -16), s(  46, -31), s(  39,   8)],
    [s(-104,-105), s( -13, -46), s( -44,  -2), s(  -5, -12)],
];

#[rustfmt::skip]
const BISHOP_BONUS: [[ScorePair; 4]; 8] = [
    [s(  19, -16), s(  11,  -8), s( -13, -14), s( -26, -12)],
    [s(  17, -38), s(  12, -14), s(   9, -25), s(  -7, -12)],
    [s(   5,  -8), s(   5, -14), s(   2,  -3), s(   4,   1)],
    [s(   2, -18), s(   2,  -8), s(  -1,   3), s(  21,   5)],
    [s( -18,   3), s(  15,   5), s(  14,  -1), s(  31,   9)],
    [s(  -7,   5), s(   8,  10), s(  37,   5), s(  22,  -2)],
    [s( -48, -12), s( -14,   8), s( -11,   4), s( -21,   9)],
    [s( -41,  15), s( -14,   7), s( -74,  12), s( -72,  19)],
];

#[rustfmt::skip]
const ROOK_BONUS: [[ScorePair; 4]; 8] = [
    [s( -26, -19), s( -16, -12), s( -13,  -8), s(  -8, -19)],
    [s( -65, -11), s( -23, -28), s( -23, -25), s( -28, -24)],
    [s( -38, -16), s( -20,  -8), s( -41,  -5), s( -33,  -9)],
    [s( -33,   8), s( -32,  21), s( -37,  22), s( -28,  14)],
    [s( -13,  23), s(   4,  21), s(   7,  23), s(  22,  17)],
    [s( -15,  34), s(  31,  19), s(  20,  33), s(  41,  15)],
    [s(   3,  35), s( -13,  43), s(  16,  36), s(  23,  43)],
    [s(  24,  51), s(  20,  54), s(  -8,  61), s(  -2,  53)],
];

#[rustfmt::skip]
const QUEEN_BONUS: [[ScorePair; 4]; 8] = [
    [s(  16, -85), s(  13, -86), s(  16,-102), s(  21, -71)],
    [s(  14, -73), s(  21, -86), s(  22, -96), s(  13, -59)],
    [s(   9, -52), s(  14, -39), s(   5, -11), s(   2, -23)],
    [s(   9, -12), s(  11,   1), s(   1,  18), s(  -9,  51)],
    [s(  27,  -1), s(  12,  43), s(  -1,  51), s( -19,  86)],
    [s(  20,  14), s(  28,  12), s(   3,  65), s(   2,  64)],
    [s(   2,  18), s(  36,  15), s(   5,  48), s( -13,  85)],
    [s(  38,  -1), s(  45,  18), s(  52,  37), s(  47,  40)],
];

#[rustfmt::skip]
const KING_BONUS: [[ScorePair; 4]; 8] = [
    [s( 284, -63), s( 283,  35), s( 219,  60), s( 150,  55)],
    [s( 284,  40), s( 263,  87), s( 205, 124), s( 185, 129)],
    [s( 186,  86), s( 262, 106), s( 197, 143), s( 171, 166)],
    [s( 152,  95), s( 224, 146), s( 192, 177), s( 157, 198)],
    [s( 153, 124), s( 197, 181), s( 134, 205), s(  97, 208)],
    [s( 131, 126), s( 163, 208), s( 104, 215), s(  45, 196)],
    [s(  93,  56), s( 131, 178), s(  80, 163), s(  44, 152)],
    [s(  59,  -3), s(  92,  63), s(  48,  78), s(   3,  84)],
];

/// `PSQ[color][piece][square]`, white-positive.
static PSQ: Lazy<Box<[[[ScorePair; 64]; 6]; 2]>> = Lazy::new(|| {
    let mut table = Box::new([[[ScorePair::ZERO; 64]; 6]; 2]);

    for piece in crate::board::types::ALL_PIECES {
        let value = ScorePair::new(PIECE_MG[piece.index()], PIECE_EG[piece.index()]);

        for sq in Square::all() {
            let rank = sq.rank();
            let file = sq.file();
            let bonus = match piece {
                Piece::Pawn => PAWN_BONUS[rank][file],
                _ => {
                    let qside_file = file.min(file ^ 7);
                    match piece {
                        Piece::Knight => KNIGHT_BONUS[rank][qside_file],
                        Piece::Bishop => BISHOP_BONUS[rank][qside_file],
                        Piece::Rook => ROOK_BONUS[rank][qside_file],
                        Piece::Queen => QUEEN_BONUS[rank][qside_file],
                        _ => KING_BONUS[rank][qside_file],
                    }
                }
            };

            let entry = value + bonus;
            table[Color::White.index()][piece.index()][sq.index()] = entry;
            table[Color::Black.index()][piece.index()][sq.flip_vertical().index()] = -entry;
        }
    }

    table
});

/// Signed material-plus-square score of a piece on a square, positive for
/// White. Summed over the board this is the evaluation's base term.
#[inline]
#[must_use]
pub fn psq_score(color: Color, piece: Piece, sq: Square) -> ScorePair {
    PSQ[color.index()][piece.index()][sq.index()]
}

pub(crate) fn init() {
    Lazy::force(&PSQ);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_psq_antisymmetry() {
        for piece in crate::board::types::ALL_PIECES {
            for sq in Square::all() {
                let white = psq_score(Color::White, piece, sq);
                let black = psq_score(Color::Black, piece, sq.flip_vertical());
                assert_eq!(white, -black);
            }
        }
    }

    #[test]
    fn test_pawn_values_include_material() {
        let e4 = psq_score(Color::White, Piece::Pawn, "e4".parse().unwrap());
        assert!(e4.mg() > 0);
        // rank 3 (e4), file 4: material 100 + bonus 35
        assert_eq!(e4.mg(), 100 + 35);
        assert_eq!(e4.eg(), 200 - 16);
    }

    #[test]
    fn test_kingside_mirror() {
        // Non-pawn tables are mirrored around the d/e boundary
        let a1 = psq_score(Color::White, Piece::Rook, "a1".parse().unwrap());
        let h1 = psq_score(Color::White, Piece::Rook, "h1".parse().unwrap());
        assert_eq!(a1, h1);
    }
}
