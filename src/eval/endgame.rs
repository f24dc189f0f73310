//! Specialized endgame recognition.
//!
//! A table built at startup maps material-signature keys to endgame
//! kinds; evaluation dispatches on the kind with an exhaustive match. A
//! second routine produces the scale factor applied to the endgame half
//! of a normal evaluation.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::board::attack_tables::{king_attacks, square_distance};
use crate::board::types::score::VICTORY;
use crate::board::types::{Bitboard, Color, Piece, Score, Square};
use crate::board::zobrist::ZOBRIST;
use crate::board::Board;

use super::kpk;
use super::pawns::forward_file;
use super::psq::{piece_eg, piece_mg};

/// The recognized endgame families.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum EndgameKind {
    /// Dead draw by material
    Draw,
    /// Practically drawn minor-piece endings
    LikelyDraw,
    /// Drawn with best play but easy to lose
    TrickyDraw,
    Kpk,
    Kbnk,
    Kbbk,
    Krkp,
    Krkn,
    Krkb,
    Kqkp,
    Kqkr,
    Knnkp,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct EndgameEntry {
    pub(crate) strong: Color,
    pub(crate) kind: EndgameKind,
}

/// Material key of an explicit piece-count multiset.
fn material_key(counts: &[(Color, Piece, usize)]) -> u64 {
    let z = &*ZOBRIST;
    let mut key = 0u64;
    for &(color, piece, count) in counts {
        for n in 0..count {
            key ^= z.material(color, piece, n);
        }
    }
    key
}

/// Parse a "KBNvK"-style material string into per-side piece counts,
/// with `strong` playing the left-hand side.
fn config_key(config: &str, strong: Color) -> u64 {
    let (left, right) = config.split_once('v').expect("config contains 'v'");
    let mut counts: Vec<(Color, Piece, usize)> = Vec::new();

    for (side, pieces) in [(strong, left), (!strong, right)] {
        for c in pieces.chars() {
            let piece = Piece::from_char(c).expect("valid piece letter");
            match counts.iter_mut().find(|(s, p, _)| *s == side && *p == piece) {
                Some(entry) => entry.2 += 1,
                None => counts.push((side, piece, 1)),
            }
        }
    }
    material_key(&counts)
}

static ENDGAMES: Lazy<HashMap<u64, EndgameEntry>> = Lazy::new(|| {
    let mut table = HashMap::new();

    let mut add = |config: &str, kind: EndgameKind| {
        for strong in [Color::White, Color::Black] {
            let key = config_key(config, strong);
            let prev = table.insert(key, EndgameEntry { strong, kind });
            debug_assert!(
                prev.is_none() || config == "KvK",
                "endgame key collision for {config}"
            );
        }
    };

    add("KvK", EndgameKind::Draw);
    add("KNvK", EndgameKind::Draw);
    add("KBvK", EndgameKind::Draw);
    add("KNNvK", EndgameKind::Draw);
    add("KBBvKB", EndgameKind::Draw);

    add("KBvKN", EndgameKind::LikelyDraw);
    add("KNNvKB", EndgameKind::LikelyDraw);
    add("KNNvKN", EndgameKind::LikelyDraw);
    add("KBNvKB", EndgameKind::LikelyDraw);

    add("KBNvKN", EndgameKind::TrickyDraw);

    add("KPvK", EndgameKind::Kpk);
    add("KBNvK", EndgameKind::Kbnk);
    add("KBBvK", EndgameKind::Kbbk);
    add("KRvKP", EndgameKind::Krkp);
    add("KRvKN", EndgameKind::Krkn);
    add("KRvKB", EndgameKind::Krkb);
    add("KQvKP", EndgameKind::Kqkp);
    add("KQvKR", EndgameKind::Kqkr);
    add("KNNvKP", EndgameKind::Knnkp);

    table
});

/// Look up a specialized endgame for a material key.
#[must_use]
pub(crate) fn probe(key: u64) -> Option<EndgameEntry> {
    ENDGAMES.get(&key).copied()
}

pub(crate) fn init() {
    Lazy::force(&ENDGAMES);
}

// ----------------------------------------------------------------------
// Positional helpers shared by the scorers
// ----------------------------------------------------------------------

/// Grows toward the board edge, largest in the corners.
fn edge_bonus(sq: Square) -> Score {
    let mut rank = sq.rank();
    let mut file = sq.file();
    if rank > 3 {
        rank ^= 7;
    }
    if file > 3 {
        file ^= 7;
    }
    50 - 2 * (file * file + rank * rank) as Score
}

fn close_bonus(a: Square, b: Square) -> Score {
    70 - 10 * Score::from(square_distance(a, b))
}

fn away_bonus(a: Square, b: Square) -> Score {
    10 + 10 * Score::from(square_distance(a, b))
}

impl EndgameEntry {
    /// Score the endgame from the side to move's perspective. Returns
    /// `None` when the pattern declines to score the position (wrong
    /// bishop pair for KBBK), falling back to the normal evaluation.
    #[must_use]
    pub(crate) fn evaluate(self, board: &Board) -> Option<Score> {
        let strong = self.strong;
        let weak = !strong;
        let strong_king = board.king_square(strong);
        let weak_king = board.king_square(weak);

        let score = match self.kind {
            EndgameKind::Draw => 0,
            EndgameKind::LikelyDraw => 8,
            EndgameKind::TrickyDraw => 16,
            EndgameKind::Kpk => {
                let pawn = board.by_type(Piece::Pawn).first_square();
                let strong_to_move = board.side_to_move() == strong;

                // Normalize so the strong side plays up the board.
                let (wk, bk, psq) = match strong {
                    Color::White => (strong_king, weak_king, pawn),
                    Color::Black => (
                        strong_king.flip_vertical(),
                        weak_king.flip_vertical(),
                        pawn.flip_vertical(),
                    ),
                };

                if kpk::probe(wk, psq, bk, strong_to_move) {
                    VICTORY + piece_eg(Piece::Pawn) + 8 * psq.rank() as Score
                } else {
                    0
                }
            }
            EndgameKind::Kbnk => {
                let mut cornered = weak_king;
                let mut score =
                    VICTORY + piece_mg(Piece::Knight) + piece_mg(Piece::Bishop)
                        + close_bonus(weak_king, strong_king);

                // Drive the defending king toward a corner of the
                // bishop's color.
                if (board.by_type(Piece::Bishop) & Bitboard::DARK_SQUARES).any() {
                    cornered = cornered.flip_vertical();
                }
                score += (cornered.file() as Score - cornered.rank() as Score).abs() * 100;
                score
            }
            EndgameKind::Kbbk => {
                // Same-colored bishops cannot mate; let the scale factor
                // logic flatten the normal eval instead.
                let dark = board.by_type(Piece::Bishop) & Bitboard::DARK_SQUARES;
                if dark.is_empty() || dark.more_than_one() {
                    return None;
                }
                VICTORY
                    + 2 * piece_eg(Piece::Bishop)
                    + close_bonus(strong_king, weak_king)
                    + edge_bonus(weak_king)
            }
            EndgameKind::Krkp => {
                let rook = board.by_type(Piece::Rook).first_square();
                let pawn = board.by_type(Piece::Pawn).first_square();
                let push = pawn.offset(weak.pawn_direction());
                let promote = Square::new(7, pawn.file()).relative(weak);
                let strong_to_move = board.side_to_move() == strong;

                if forward_file(strong, strong_king).contains(pawn) {
                    // The winning king controls the promotion path.
                    piece_eg(Piece::Rook) - Score::from(square_distance(strong_king, pawn))
                } else if square_distance(weak_king, pawn) >= 3 + u8::from(!strong_to_move)
                    && square_distance(weak_king, rook) >= 3
                {
                    piece_eg(Piece::Rook) - Score::from(square_distance(strong_king, pawn))
                } else if weak_king.relative_rank(strong) <= 2
                    && square_distance(weak_king, pawn) == 1
                    && strong_king.relative_rank(strong) >= 3
                    && square_distance(strong_king, pawn)
                        > 2 + u8::from(strong_to_move)
                {
                    // The pawn is escorted home and out of reach.
                    40 - 4 * Score::from(square_distance(strong_king, pawn))
                } else {
                    100 - 4 * (Score::from(square_distance(strong_king, push))
                        - Score::from(square_distance(weak_king, push))
                        - Score::from(square_distance(pawn, promote)))
                }
            }
            EndgameKind::Krkn => {
                let knight = board.by_type(Piece::Knight).first_square();
                edge_bonus(weak_king) + away_bonus(weak_king, knight)
            }
            EndgameKind::Krkb => edge_bonus(weak_king),
            EndgameKind::Kqkp => {
                let pawn = board.by_type(Piece::Pawn).first_square();
                let mut score = close_bonus(strong_king, weak_king);

                // A rook or bishop pawn on the 7th defended by its king
                // is a fortress draw; every other pawn loses.
                let winning_files = Bitboard::FILE_B
                    | Bitboard::FILE_D
                    | Bitboard::FILE_E
                    | Bitboard::FILE_G;
                if pawn.relative_rank(weak) != 6
                    || square_distance(weak_king, pawn) != 1
                    || winning_files.contains(pawn)
                {
                    score += piece_eg(Piece::Queen) - piece_eg(Piece::Pawn);
                }
                score
            }
            EndgameKind::Kqkr => {
                piece_eg(Piece::Queen) - piece_eg(Piece::Rook)
                    + edge_bonus(weak_king)
                    + close_bonus(strong_king, weak_king)
            }
            EndgameKind::Knnkp => {
                let pawn = board.by_type(Piece::Pawn).first_square();
                piece_eg(Piece::Pawn) + edge_bonus(weak_king)
                    - 5 * pawn.relative_rank(weak) as Score
            }
        };

        Some(if board.side_to_move() == strong {
            score
        } else {
            -score
        })
    }
}

/// Scale factor in [0, 128] applied to the endgame score half.
#[must_use]
pub(crate) fn scale_factor(board: &Board, eg: Score) -> Score {
    let strong = if eg > 0 { Color::White } else { Color::Black };
    let weak = !strong;

    let strong_mat = board.non_pawn_material(strong);
    let weak_mat = board.non_pawn_material(weak);
    let strong_pawns = board.pieces(strong, Piece::Pawn);
    let weak_pawns = board.pieces(weak, Piece::Pawn);

    // No pawns and a small material edge: drawn or nearly so.
    if strong_pawns.is_empty() && strong_mat - weak_mat <= piece_mg(Piece::Bishop) {
        return if strong_mat <= piece_mg(Piece::Bishop) {
            0
        } else {
            ((strong_mat - weak_mat) / 8).clamp(8, 32)
        };
    }

    if opposite_colored_bishops(board) {
        return 36 + 6 * board.by_color(strong).popcount() as Score;
    }

    // Single-rook endings with the pawns on one wing and the defending
    // king in touch with its own pawns.
    if strong_mat == piece_mg(Piece::Rook)
        && weak_mat == piece_mg(Piece::Rook)
        && (strong_pawns.popcount() as Score - weak_pawns.popcount() as Score) < 2
        && (strong_pawns & Bitboard::KINGSIDE).any() != (strong_pawns & Bitboard::QUEENSIDE).any()
        && (king_attacks(board.king_square(weak)) & weak_pawns).any()
    {
        return 64;
    }

    (96 + 8 * strong_pawns.popcount() as Score).min(128)
}

fn opposite_colored_bishops(board: &Board) -> bool {
    let white = board.pieces(Color::White, Piece::Bishop);
    let black = board.pieces(Color::Black, Piece::Bishop);

    if white.is_empty() || white.more_than_one() || black.is_empty() || black.more_than_one() {
        return false;
    }

    let dark = (white | black) & Bitboard::DARK_SQUARES;
    dark.any() && !dark.more_than_one()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_recognizes_kpk() {
        let board = Board::from_fen("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1").unwrap();
        let entry = probe(board.material_key()).unwrap();
        assert_eq!(entry.kind, EndgameKind::Kpk);
        assert_eq!(entry.strong, Color::White);

        // Mirrored colors resolve to the black-strong entry
        let board = Board::from_fen("4k3/4p3/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let entry = probe(board.material_key()).unwrap();
        assert_eq!(entry.strong, Color::Black);
    }

    #[test]
    fn test_unknown_material_has_no_entry() {
        let board = Board::startpos();
        assert!(probe(board.material_key()).is_none());
    }

    #[test]
    fn test_kpk_entry_scores_win() {
        // King in front of its pawn on the sixth rank: textbook win
        let board = Board::from_fen("4k3/8/4K3/4P3/8/8/8/8 w - - 0 1").unwrap();
        let entry = probe(board.material_key()).unwrap();
        let score = entry.evaluate(&board).unwrap();
        assert!(score > VICTORY / 2);

        // Rook pawn against a cornered king is a dead draw
        let board = Board::from_fen("k7/8/K7/P7/8/8/8/8 w - - 0 1").unwrap();
        let entry = probe(board.material_key()).unwrap();
        assert_eq!(entry.evaluate(&board), Some(0));
    }

    #[test]
    fn test_kbnk_scored_as_winning() {
        let board = Board::from_fen("7k/8/6KN/8/8/5B2/8/8 w - - 0 1").unwrap();
        let entry = probe(board.material_key()).unwrap();
        assert_eq!(entry.kind, EndgameKind::Kbnk);
        let score = entry.evaluate(&board).unwrap();
        assert!(score > VICTORY);
    }

    #[test]
    fn test_kqkr_scored_for_strong_side() {
        let board = Board::from_fen("4k3/4r3/8/8/8/8/4Q3/4K3 b - - 0 1").unwrap();
        let entry = probe(board.material_key()).unwrap();
        assert_eq!(entry.kind, EndgameKind::Kqkr);
        // Black to move but white is winning: negative from stm view
        let score = entry.evaluate(&board).unwrap();
        assert!(score < 0);
    }

    #[test]
    fn test_scale_factors() {
        // Opposite-colored bishops with one pawn each
        let board =
            Board::from_fen("4k3/4b1p1/8/8/8/6P1/4B3/4K3 w - - 0 1").unwrap();
        let factor = scale_factor(&board, 100);
        assert_eq!(factor, 36 + 6 * 3);

        // Bare minor up: scaled to zero
        let board = Board::from_fen("4k3/8/8/8/8/8/4N3/4K3 w - - 0 1").unwrap();
        assert_eq!(scale_factor(&board, 50), 0);
    }
}
