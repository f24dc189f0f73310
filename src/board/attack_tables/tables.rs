//! Precomputed attack tables for leaper pieces (knights, kings, pawns).

use once_cell::sync::Lazy;

pub(crate) static KNIGHT_ATTACKS: Lazy<[u64; 64]> = Lazy::new(|| {
    let deltas = [
        (2, 1),
        (1, 2),
        (-1, 2),
        (-2, 1),
        (-2, -1),
        (-1, -2),
        (1, -2),
        (2, -1),
    ];
    leaper_table(&deltas)
});

pub(crate) static KING_ATTACKS: Lazy<[u64; 64]> = Lazy::new(|| {
    let deltas = [
        (1, 0),
        (-1, 0),
        (0, 1),
        (0, -1),
        (1, 1),
        (1, -1),
        (-1, 1),
        (-1, -1),
    ];
    leaper_table(&deltas)
});

pub(crate) static PAWN_ATTACKS: Lazy<[[u64; 64]; 2]> = Lazy::new(|| {
    let white = leaper_table(&[(1, -1), (1, 1)]);
    let black = leaper_table(&[(-1, -1), (-1, 1)]);
    [white, black]
});

fn leaper_table(deltas: &[(isize, isize)]) -> [u64; 64] {
    let mut attacks = [0u64; 64];
    for (sq, slot) in attacks.iter_mut().enumerate() {
        let r = (sq / 8) as isize;
        let f = (sq % 8) as isize;
        let mut mask = 0u64;
        for &(dr, df) in deltas {
            let nr = r + dr;
            let nf = f + df;
            if (0..8).contains(&nr) && (0..8).contains(&nf) {
                mask |= 1u64 << (nr * 8 + nf);
            }
        }
        *slot = mask;
    }
    attacks
}
