//! Attack tables for move generation.
//!
//! Sliding-piece attacks use magic bitboards: per square, a mask of the
//! inner blocker squares, a multiplier found by random trial, and a shift
//! producing an index into a shared dense table. Leaper attacks, the
//! line/between tables and the square-distance table are plain lookups.
//! Everything is built once on first use.

mod tables;

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::types::{Bitboard, Color, Piece, Square};

/// Magic entry for one square: hashing data plus the offset of its slice
/// of the dense attack table.
struct Magic {
    mask: u64,
    magic: u64,
    shift: u32,
    offset: usize,
}

impl Magic {
    #[inline]
    fn index(&self, occupancy: u64) -> usize {
        (((occupancy & self.mask).wrapping_mul(self.magic)) >> self.shift) as usize
    }
}

struct SliderTable {
    magics: Vec<Magic>,
    attacks: Vec<u64>,
}

const ROOK_DIRECTIONS: [(isize, isize); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const BISHOP_DIRECTIONS: [(isize, isize); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

/// Reachable squares for a slider from `sq` given `occupancy`, by ray walk.
/// Only used at initialization; lookups go through the magic tables.
fn sliding_attacks(directions: &[(isize, isize); 4], sq: usize, occupancy: u64) -> u64 {
    let mut attacks = 0u64;
    let rank = (sq / 8) as isize;
    let file = (sq % 8) as isize;

    for &(dr, df) in directions {
        let mut r = rank + dr;
        let mut f = file + df;
        while (0..8).contains(&r) && (0..8).contains(&f) {
            let bit = 1u64 << (r * 8 + f);
            attacks |= bit;
            if occupancy & bit != 0 {
                break;
            }
            r += dr;
            f += df;
        }
    }
    attacks
}

/// Candidate magics need high bit sparsity, hence the triple AND.
fn sparse_random(rng: &mut StdRng) -> u64 {
    rng.gen::<u64>() & rng.gen::<u64>() & rng.gen::<u64>()
}

/// Build the magic table for one slider type.
///
/// For each square, iterate over all blocker subsets of the inner mask
/// with the carry-rippler trick, then try random sparse magics until each
/// subset maps to a slot that is either fresh this trial (tracked by an
/// epoch counter, so the table never needs re-zeroing) or already holds
/// the identical attack set.
fn build_slider_table(directions: &[(isize, isize); 4], seed: u64) -> SliderTable {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut magics = Vec::with_capacity(64);
    let mut attacks = Vec::new();

    let mut occupancies = [0u64; 4096];
    let mut reference = [0u64; 4096];
    let mut epoch_table = [0u32; 4096];
    let mut current_epoch = 0u32;

    for sq in 0..64 {
        // Edges only matter as blockers when the piece itself sits on them.
        let rank_edges = (Bitboard::RANK_1.0 | Bitboard::RANK_8.0) & !(0xFFu64 << (sq / 8 * 8));
        let file_edges = (Bitboard::FILE_A.0 | Bitboard::FILE_H.0)
            & !(Bitboard::FILE_A.0 << (sq % 8));
        let edges = rank_edges | file_edges;

        let mask = sliding_attacks(directions, sq, 0) & !edges;
        let bits = mask.count_ones();
        let shift = 64 - bits;
        let size = 1usize << bits;
        let offset = attacks.len();
        attacks.resize(offset + size, 0u64);

        let mut subset = 0u64;
        for i in 0..size {
            occupancies[i] = subset;
            reference[i] = sliding_attacks(directions, sq, subset);
            subset = subset.wrapping_sub(mask) & mask;
        }

        let mut magic = 0u64;
        let mut done = false;
        while !done {
            magic = sparse_random(&mut rng);
            while (magic.wrapping_mul(mask) >> 56).count_ones() < 6 {
                magic = sparse_random(&mut rng);
            }

            current_epoch += 1;
            done = true;
            for i in 0..size {
                let idx = ((occupancies[i] & mask).wrapping_mul(magic) >> shift) as usize;
                if epoch_table[idx] < current_epoch {
                    epoch_table[idx] = current_epoch;
                    attacks[offset + idx] = reference[i];
                } else if attacks[offset + idx] != reference[i] {
                    done = false;
                    break;
                }
            }
        }

        magics.push(Magic {
            mask,
            magic,
            shift,
            offset,
        });
    }

    SliderTable { magics, attacks }
}

static ROOK_TABLE: Lazy<SliderTable> = Lazy::new(|| build_slider_table(&ROOK_DIRECTIONS, 64));
static BISHOP_TABLE: Lazy<SliderTable> = Lazy::new(|| build_slider_table(&BISHOP_DIRECTIONS, 17));

/// `LINE[a][b]`: the full line through two collinear squares, including
/// both endpoints; zero when the squares are not aligned.
static LINE: Lazy<Box<[[u64; 64]; 64]>> = Lazy::new(|| {
    let mut line = Box::new([[0u64; 64]; 64]);
    for a in 0..64usize {
        for b in 0..64usize {
            if a == b {
                continue;
            }
            let (av, bv) = (1u64 << a, 1u64 << b);
            if sliding_attacks(&ROOK_DIRECTIONS, a, 0) & bv != 0 {
                line[a][b] = (sliding_attacks(&ROOK_DIRECTIONS, a, 0)
                    & sliding_attacks(&ROOK_DIRECTIONS, b, 0))
                    | av
                    | bv;
            } else if sliding_attacks(&BISHOP_DIRECTIONS, a, 0) & bv != 0 {
                line[a][b] = (sliding_attacks(&BISHOP_DIRECTIONS, a, 0)
                    & sliding_attacks(&BISHOP_DIRECTIONS, b, 0))
                    | av
                    | bv;
            }
        }
    }
    line
});

/// `BETWEEN[a][b]`: squares strictly between two collinear squares.
static BETWEEN: Lazy<Box<[[u64; 64]; 64]>> = Lazy::new(|| {
    let mut between = Box::new([[0u64; 64]; 64]);
    for a in 0..64usize {
        for b in 0..64usize {
            if a == b {
                continue;
            }
            let bv = 1u64 << b;
            if sliding_attacks(&ROOK_DIRECTIONS, a, 0) & bv != 0 {
                between[a][b] =
                    sliding_attacks(&ROOK_DIRECTIONS, a, bv) & sliding_attacks(&ROOK_DIRECTIONS, b, 1u64 << a);
            } else if sliding_attacks(&BISHOP_DIRECTIONS, a, 0) & bv != 0 {
                between[a][b] = sliding_attacks(&BISHOP_DIRECTIONS, a, bv)
                    & sliding_attacks(&BISHOP_DIRECTIONS, b, 1u64 << a);
            }
        }
    }
    between
});

static DISTANCE: Lazy<[[u8; 64]; 64]> = Lazy::new(|| {
    let mut dist = [[0u8; 64]; 64];
    for a in 0..64usize {
        for b in 0..64usize {
            let file_dist = (a % 8).abs_diff(b % 8);
            let rank_dist = (a / 8).abs_diff(b / 8);
            dist[a][b] = file_dist.max(rank_dist) as u8;
        }
    }
    dist
});

/// Force-build every table. Called once at startup so that search threads
/// never race on lazy initialization.
pub fn init() {
    Lazy::force(&tables::KNIGHT_ATTACKS);
    Lazy::force(&tables::KING_ATTACKS);
    Lazy::force(&tables::PAWN_ATTACKS);
    Lazy::force(&ROOK_TABLE);
    Lazy::force(&BISHOP_TABLE);
    Lazy::force(&LINE);
    Lazy::force(&BETWEEN);
    Lazy::force(&DISTANCE);
}

#[inline]
#[must_use]
pub fn knight_attacks(sq: Square) -> Bitboard {
    Bitboard(KNIGHT_ATTACKS_REF[sq.index()])
}

#[inline]
#[must_use]
pub fn king_attacks(sq: Square) -> Bitboard {
    Bitboard(KING_ATTACKS_REF[sq.index()])
}

#[inline]
#[must_use]
pub fn pawn_attacks(color: Color, sq: Square) -> Bitboard {
    Bitboard(tables::PAWN_ATTACKS[color.index()][sq.index()])
}

// Direct references so the hot accessors read through one Lazy deref only.
use tables::{KING_ATTACKS as KING_ATTACKS_REF, KNIGHT_ATTACKS as KNIGHT_ATTACKS_REF};

#[inline]
#[must_use]
pub fn rook_attacks(sq: Square, occupancy: Bitboard) -> Bitboard {
    let table = &*ROOK_TABLE;
    let magic = &table.magics[sq.index()];
    Bitboard(table.attacks[magic.offset + magic.index(occupancy.0)])
}

#[inline]
#[must_use]
pub fn bishop_attacks(sq: Square, occupancy: Bitboard) -> Bitboard {
    let table = &*BISHOP_TABLE;
    let magic = &table.magics[sq.index()];
    Bitboard(table.attacks[magic.offset + magic.index(occupancy.0)])
}

#[inline]
#[must_use]
pub fn queen_attacks(sq: Square, occupancy: Bitboard) -> Bitboard {
    rook_attacks(sq, occupancy) | bishop_attacks(sq, occupancy)
}

/// Attacks of any non-pawn piece type.
#[must_use]
pub fn piece_attacks(piece: Piece, sq: Square, occupancy: Bitboard) -> Bitboard {
    match piece {
        Piece::Knight => knight_attacks(sq),
        Piece::Bishop => bishop_attacks(sq, occupancy),
        Piece::Rook => rook_attacks(sq, occupancy),
        Piece::Queen => queen_attacks(sq, occupancy),
        Piece::King => king_attacks(sq),
        Piece::Pawn => unreachable!("pawn attacks are color-dependent"),
    }
}

/// The full line through `a` and `b` when collinear, else empty.
#[inline]
#[must_use]
pub fn line(a: Square, b: Square) -> Bitboard {
    Bitboard(LINE[a.index()][b.index()])
}

/// Squares strictly between `a` and `b` when collinear, else empty.
#[inline]
#[must_use]
pub fn between(a: Square, b: Square) -> Bitboard {
    Bitboard(BETWEEN[a.index()][b.index()])
}

/// Returns true when `a`, `b`, and `c` lie on one rank, file, or diagonal.
#[inline]
#[must_use]
pub fn aligned(a: Square, b: Square, c: Square) -> bool {
    line(a, b).contains(c)
}

/// Chebyshev distance between two squares.
#[inline]
#[must_use]
pub fn square_distance(a: Square, b: Square) -> u8 {
    DISTANCE[a.index()][b.index()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Square {
        name.parse().unwrap()
    }

    #[test]
    fn test_rook_attacks_empty_board() {
        let attacks = rook_attacks(sq("e4"), Bitboard::EMPTY);
        let expected = (Bitboard::rank_mask(3) | Bitboard::file_mask(4))
            & !Bitboard::from_square(sq("e4"));
        assert_eq!(attacks, expected);
    }

    #[test]
    fn test_rook_attacks_with_blockers() {
        let blockers = Bitboard::from_square(sq("e6")) | Bitboard::from_square(sq("c4"));
        let attacks = rook_attacks(sq("e4"), blockers);
        assert!(attacks.contains(sq("e6"))); // can capture
        assert!(!attacks.contains(sq("e7"))); // blocked
        assert!(attacks.contains(sq("c4")));
        assert!(!attacks.contains(sq("b4")));
    }

    #[test]
    fn test_bishop_attacks_with_blockers() {
        let blockers = Bitboard::from_square(sq("g6"));
        let attacks = bishop_attacks(sq("e4"), blockers);
        assert!(attacks.contains(sq("g6")));
        assert!(!attacks.contains(sq("h7")));
        assert!(attacks.contains(sq("a8")));
        assert!(attacks.contains(sq("h1")));
    }

    #[test]
    fn test_magic_tables_match_ray_walk() {
        // Spot-check the magic lookup against the generation-time ray walk
        // on a handful of irregular occupancies.
        for occ in [0u64, 0xFF00_FF00_FF00_FF00, 0x0123_4567_89AB_CDEF] {
            for sq_idx in [0usize, 7, 28, 36, 63] {
                let square = Square::from_index(sq_idx);
                assert_eq!(
                    rook_attacks(square, Bitboard(occ)).0,
                    sliding_attacks(&ROOK_DIRECTIONS, sq_idx, occ)
                );
                assert_eq!(
                    bishop_attacks(square, Bitboard(occ)).0,
                    sliding_attacks(&BISHOP_DIRECTIONS, sq_idx, occ)
                );
            }
        }
    }

    #[test]
    fn test_between_and_line() {
        assert_eq!(
            between(sq("a1"), sq("d4")),
            Bitboard::from_square(sq("b2")) | Bitboard::from_square(sq("c3"))
        );
        assert_eq!(between(sq("a1"), sq("b3")), Bitboard::EMPTY);
        assert!(line(sq("a1"), sq("h8")).contains(sq("e5")));
        assert!(aligned(sq("a1"), sq("h1"), sq("d1")));
        assert!(!aligned(sq("a1"), sq("h1"), sq("d2")));
    }

    #[test]
    fn test_square_distance() {
        assert_eq!(square_distance(sq("a1"), sq("h8")), 7);
        assert_eq!(square_distance(sq("e4"), sq("e4")), 0);
        assert_eq!(square_distance(sq("b2"), sq("c4")), 2);
    }

    #[test]
    fn test_knight_attacks_corner() {
        let attacks = knight_attacks(sq("a1"));
        assert_eq!(attacks.popcount(), 2);
        assert!(attacks.contains(sq("b3")));
        assert!(attacks.contains(sq("c2")));
    }

    #[test]
    fn test_pawn_attacks_by_color() {
        assert!(pawn_attacks(Color::White, sq("e4")).contains(sq("d5")));
        assert!(pawn_attacks(Color::Black, sq("e4")).contains(sq("d3")));
    }
}
