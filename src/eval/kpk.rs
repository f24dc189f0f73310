//! King-and-pawn versus king bitbase.
//!
//! Exact win/draw knowledge for every KPK position, computed once by
//! iterating a game-theoretic classification to its fixpoint. The pawn is
//! normalized to files a-d, giving 2 (side to move) x 24 (pawn) x 64 x 64
//! positions packed one bit each.

use once_cell::sync::Lazy;

use crate::board::attack_tables::{king_attacks, pawn_attacks, square_distance};
use crate::board::types::{Color, Square};

const MAX_INDEX: usize = 2 * 24 * 64 * 64;

/// Classification flags; positions combine into a bitset during the
/// fixpoint iteration.
const INVALID: u8 = 0;
const UNKNOWN: u8 = 1;
const DRAW: u8 = 2;
const WIN: u8 = 4;

/// `index(stm, bksq, wksq, psq)` with the pawn on files a-d.
fn index(stm: Color, bksq: Square, wksq: Square, psq: Square) -> usize {
    debug_assert!(psq.file() <= 3);
    wksq.index()
        + 64 * bksq.index()
        + 64 * 64 * stm.index()
        + 64 * 64 * 2 * (psq.file() + 4 * (psq.rank() - 1))
}

struct KpkPosition {
    stm: Color,
    bksq: Square,
    wksq: Square,
    psq: Square,
    result: u8,
}

impl KpkPosition {
    fn new(idx: usize) -> Self {
        let wksq = Square::from_index(idx & 0x3F);
        let bksq = Square::from_index((idx >> 6) & 0x3F);
        let stm = Color::from_index((idx >> 12) & 1);
        let psq = Square::new(((idx >> 13) / 4) + 1, (idx >> 13) & 3);

        let mut pos = KpkPosition {
            stm,
            bksq,
            wksq,
            psq,
            result: UNKNOWN,
        };

        // Overlapping or adjacent kings, or a king on the pawn square
        if square_distance(wksq, bksq) <= 1 || wksq == psq || bksq == psq {
            pos.result = INVALID;
            return pos;
        }

        // Side not to move may not be in check (only the pawn can check)
        if stm == Color::White && pawn_attacks(Color::White, psq).contains(bksq) {
            pos.result = INVALID;
            return pos;
        }

        // Immediate wins: the pawn promotes next move and survives
        if stm == Color::White && psq.rank() == 6 {
            let promo = psq.offset(8);
            if wksq != promo
                && (square_distance(bksq, promo) > 1 || square_distance(wksq, promo) == 1)
            {
                pos.result = WIN;
                return pos;
            }
        }

        // Immediate draws: stalemate, or the king captures an undefended pawn
        if stm == Color::Black {
            let escapes =
                king_attacks(bksq) & !(king_attacks(wksq) | pawn_attacks(Color::White, psq));
            let can_take_pawn =
                king_attacks(bksq).contains(psq) && square_distance(wksq, psq) > 1;
            if escapes.is_empty() || can_take_pawn {
                pos.result = DRAW;
                return pos;
            }
        }

        pos
    }

    /// Combine successor classifications. White picks any WIN; Black
    /// escapes with any DRAW; otherwise the position inherits the forced
    /// outcome once every successor is resolved.
    fn classify(&self, db: &[u8]) -> u8 {
        let (good, bad) = if self.stm == Color::White {
            (WIN, DRAW)
        } else {
            (DRAW, WIN)
        };

        let mut r = INVALID;

        for to in king_attacks(if self.stm == Color::White {
            self.wksq
        } else {
            self.bksq
        }) {
            r |= if self.stm == Color::White {
                db[index(Color::Black, self.bksq, to, self.psq)]
            } else {
                db[index(Color::White, to, self.wksq, self.psq)]
            };
        }

        if self.stm == Color::White {
            if self.psq.rank() < 6 {
                r |= db[index(Color::Black, self.bksq, self.wksq, self.psq.offset(8))];
            }
            if self.psq.rank() == 1 {
                let push = self.psq.offset(8);
                let double = self.psq.offset(16);
                if push != self.wksq && push != self.bksq {
                    r |= db[index(Color::Black, self.bksq, self.wksq, double)];
                }
            }
        }

        if r & good != 0 {
            good
        } else if r & UNKNOWN != 0 {
            UNKNOWN
        } else {
            bad
        }
    }
}

static BITBASE: Lazy<Vec<u8>> = Lazy::new(|| {
    let positions: Vec<KpkPosition> = (0..MAX_INDEX).map(KpkPosition::new).collect();
    let mut db: Vec<u8> = positions.iter().map(|p| p.result).collect();

    // Retrograde-style fixpoint: keep reclassifying unknowns until no
    // entry changes anymore.
    let mut changed = true;
    while changed {
        changed = false;
        for (i, pos) in positions.iter().enumerate() {
            if db[i] == UNKNOWN {
                let r = pos.classify(&db);
                if r != UNKNOWN {
                    db[i] = r;
                    changed = true;
                }
            }
        }
    }

    db
});

/// Probe the bitbase. Coordinates are from the strong side's point of
/// view (the strong side is "White" and its pawn moves up); the caller
/// normalizes colors and mirrors the pawn onto files a-d.
#[must_use]
pub fn probe(wksq: Square, psq: Square, bksq: Square, strong_to_move: bool) -> bool {
    let mirror = psq.file() > 3;
    let fix = |sq: Square| {
        if mirror {
            Square::new(sq.rank(), 7 - sq.file())
        } else {
            sq
        }
    };

    let stm = if strong_to_move {
        Color::White
    } else {
        Color::Black
    };
    BITBASE[index(stm, fix(bksq), fix(wksq), fix(psq))] == WIN
}

pub(crate) fn init() {
    Lazy::force(&BITBASE);
}
