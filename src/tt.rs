//! Shared transposition table.
//!
//! Entries are pairs of 64-bit words (key, data) written and read with
//! relaxed atomic operations. A torn pair simply fails the key check on
//! read and counts as a miss, so no locking is needed. Entries live in
//! four-slot clusters sized to one cache line, aged by a generation
//! counter that advances once per search.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::board::types::score::MATE_FOUND;
use crate::board::types::{Move, Score};

/// Entries per cluster (one 64-byte cache line).
pub const CLUSTER_SIZE: usize = 4;

/// Generation steps; the low two bits of the genbound byte hold the bound.
const GENERATION_DELTA: u8 = 4;
const GENERATION_MASK: u8 = 0xFC;

/// Bound kind of a stored score.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Bound {
    None = 0,
    Upper = 1,
    Lower = 2,
    Exact = 3,
}

impl Bound {
    #[inline]
    fn from_bits(bits: u8) -> Bound {
        match bits & 3 {
            0 => Bound::None,
            1 => Bound::Upper,
            2 => Bound::Lower,
            _ => Bound::Exact,
        }
    }

    /// True when this bound can fail high (it is a lower bound on the
    /// real score).
    #[inline]
    #[must_use]
    pub fn is_lower(self) -> bool {
        self as u8 & Bound::Lower as u8 != 0
    }

    /// True when this bound can fail low.
    #[inline]
    #[must_use]
    pub fn is_upper(self) -> bool {
        self as u8 & Bound::Upper as u8 != 0
    }
}

/// Decoded view of a table entry.
#[derive(Clone, Copy, Debug)]
pub struct TtHit {
    pub mv: Move,
    pub score: Score,
    pub eval: Score,
    pub depth: i32,
    pub bound: Bound,
}

#[derive(Default)]
struct Entry {
    key: AtomicU64,
    data: AtomicU64,
}

fn pack(mv: Move, score: Score, eval: Score, depth: i32, genbound: u8) -> u64 {
    (mv.as_u16() as u64)
        | ((score as i16 as u16 as u64) << 16)
        | ((eval as i16 as u16 as u64) << 32)
        | ((depth as u8 as u64) << 48)
        | ((genbound as u64) << 56)
}

fn unpack(data: u64) -> (Move, Score, Score, i32, u8) {
    (
        Move::from_u16(data as u16),
        Score::from((data >> 16) as u16 as i16),
        Score::from((data >> 32) as u16 as i16),
        i32::from((data >> 48) as u8),
        (data >> 56) as u8,
    )
}

#[repr(align(64))]
#[derive(Default)]
struct Cluster {
    entries: [Entry; CLUSTER_SIZE],
}

pub struct TranspositionTable {
    clusters: Vec<Cluster>,
    generation: AtomicU8,
}

impl TranspositionTable {
    /// Create a table of roughly `size_mb` mebibytes.
    #[must_use]
    pub fn new(size_mb: usize) -> Self {
        let cluster_count =
            (size_mb.max(1) * 1024 * 1024 / std::mem::size_of::<Cluster>()).max(1);
        let mut clusters = Vec::with_capacity(cluster_count);
        clusters.resize_with(cluster_count, Cluster::default);

        TranspositionTable {
            clusters,
            generation: AtomicU8::new(0),
        }
    }

    /// Resize to `size_mb`, dropping all contents.
    pub fn resize(&mut self, size_mb: usize) {
        *self = TranspositionTable::new(size_mb);
    }

    /// Zero every entry, splitting the work across `threads` helpers so
    /// large tables clear quickly.
    pub fn clear(&self, threads: usize) {
        let threads = threads.max(1);
        let chunk = self.clusters.len().div_ceil(threads);

        std::thread::scope(|scope| {
            for part in self.clusters.chunks(chunk) {
                scope.spawn(move || {
                    for cluster in part {
                        for entry in &cluster.entries {
                            entry.key.store(0, Ordering::Relaxed);
                            entry.data.store(0, Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        self.generation.store(0, Ordering::Relaxed);
    }

    /// Advance the generation counter; called once per "go".
    pub fn new_search(&self) {
        self.generation
            .fetch_add(GENERATION_DELTA, Ordering::Relaxed);
    }

    #[inline]
    fn current_generation(&self) -> u8 {
        self.generation.load(Ordering::Relaxed) & GENERATION_MASK
    }

    /// Map a key to its cluster: the high half of the 128-bit product
    /// avoids a modulo while using the full key entropy.
    #[inline]
    fn cluster_for(&self, key: u64) -> &Cluster {
        let idx = ((u128::from(key) * self.clusters.len() as u128) >> 64) as usize;
        &self.clusters[idx]
    }

    /// Look up a position. A hit refreshes the entry's generation so the
    /// replacement policy keeps it around.
    #[must_use]
    pub fn probe(&self, key: u64) -> Option<TtHit> {
        let cluster = self.cluster_for(key);
        let generation = self.current_generation();

        for entry in &cluster.entries {
            let entry_key = entry.key.load(Ordering::Relaxed);
            if entry_key != key {
                continue;
            }
            let data = entry.data.load(Ordering::Relaxed);

            let (mv, score, eval, depth, genbound) = unpack(data);
            let bound = Bound::from_bits(genbound);

            // Refresh the age without changing the payload.
            let refreshed = (data & !(u64::from(GENERATION_MASK) << 56))
                | (u64::from(generation) << 56);
            entry.data.store(refreshed, Ordering::Relaxed);

            return Some(TtHit {
                mv,
                score,
                eval,
                depth,
                bound,
            });
        }
        None
    }

    /// Store an entry. Within the cluster a key match is preferred;
    /// otherwise the shallowest, stalest slot is evicted. An exact deep
    /// entry for the same key resists being overwritten by a shallower
    /// bound-only result.
    pub fn store(&self, key: u64, mv: Move, score: Score, eval: Score, depth: i32, bound: Bound) {
        let cluster = self.cluster_for(key);
        let generation = self.current_generation();

        let mut replace = &cluster.entries[0];
        let mut replace_score = i32::MAX;

        let mut target = None;
        for entry in &cluster.entries {
            let entry_key = entry.key.load(Ordering::Relaxed);
            if entry_key == key || entry_key == 0 {
                target = Some(entry);
                break;
            }

            let (_, _, _, entry_depth, genbound) = unpack(entry.data.load(Ordering::Relaxed));
            let age = generation.wrapping_sub(genbound & GENERATION_MASK) & GENERATION_MASK;
            let relevance = entry_depth - 2 * i32::from(age);
            if relevance < replace_score {
                replace_score = relevance;
                replace = entry;
            }
        }
        let entry = target.unwrap_or(replace);

        // Keep the previous best move when the new result has none.
        let old_key = entry.key.load(Ordering::Relaxed);
        let old_data = entry.data.load(Ordering::Relaxed);
        let (old_mv, _, _, old_depth, _) = unpack(old_data);

        let mv = if mv == Move::NONE && old_key == key {
            old_mv
        } else {
            mv
        };

        // Don't replace a deeper same-key entry with a much shallower one
        // unless the new bound is exact.
        if bound != Bound::Exact && old_key == key && depth + 4 < old_depth {
            return;
        }

        let genbound = generation | bound as u8;
        entry.key.store(key, Ordering::Relaxed);
        entry
            .data
            .store(pack(mv, score, eval, depth, genbound), Ordering::Relaxed);
    }

    /// Per-mille load estimate over the first thousand clusters, counting
    /// only entries from the current search.
    #[must_use]
    pub fn hashfull(&self) -> u32 {
        let generation = self.current_generation();
        let sample = self.clusters.len().min(1000);
        let mut count = 0u32;

        for cluster in &self.clusters[..sample] {
            for entry in &cluster.entries {
                if entry.key.load(Ordering::Relaxed) != 0 {
                    let genbound = (entry.data.load(Ordering::Relaxed) >> 56) as u8;
                    if genbound & GENERATION_MASK == generation {
                        count += 1;
                    }
                }
            }
        }

        count / CLUSTER_SIZE as u32
    }
}

/// Translate a score for storage: mate scores become distances from this
/// node rather than from the root, making them ply-independent.
#[inline]
#[must_use]
pub fn score_to_tt(score: Score, ply: usize) -> Score {
    if score >= MATE_FOUND {
        score + ply as Score
    } else if score <= -MATE_FOUND {
        score - ply as Score
    } else {
        score
    }
}

/// Reverse of `score_to_tt` when reading a stored score at `ply`.
#[inline]
#[must_use]
pub fn score_from_tt(score: Score, ply: usize) -> Score {
    if score >= MATE_FOUND {
        score - ply as Score
    } else if score <= -MATE_FOUND {
        score + ply as Score
    } else {
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::types::score::MATE;
    use crate::board::types::Square;

    fn mv(from: usize, to: usize) -> Move {
        Move::new(Square::from_index(from), Square::from_index(to))
    }

    #[test]
    fn test_store_probe_roundtrip() {
        let tt = TranspositionTable::new(1);
        tt.new_search();
        tt.store(0xDEAD_BEEF, mv(12, 28), 37, 15, 9, Bound::Exact);

        let hit = tt.probe(0xDEAD_BEEF).unwrap();
        assert_eq!(hit.mv, mv(12, 28));
        assert_eq!(hit.score, 37);
        assert_eq!(hit.eval, 15);
        assert_eq!(hit.depth, 9);
        assert_eq!(hit.bound, Bound::Exact);

        assert!(tt.probe(0xCAFE_BABE).is_none());
    }

    #[test]
    fn test_negative_scores_survive_packing() {
        let tt = TranspositionTable::new(1);
        tt.store(42, Move::NONE, -441, -37, 3, Bound::Upper);
        let hit = tt.probe(42).unwrap();
        assert_eq!(hit.score, -441);
        assert_eq!(hit.eval, -37);
    }

    #[test]
    fn test_clear_empties_table(){
        let tt = TranspositionTable::new(1);
        tt.store(7, mv(0, 8), 1, 1, 1, Bound::Lower);
        assert!(tt.probe(7).is_some());
        tt.clear(4);
        assert!(tt.probe(7).is_none());
    }

    #[test]
    fn test_deep_exact_entry_is_sticky() {
        let tt = TranspositionTable::new(1);
        tt.store(99, mv(0, 8), 100, 50, 20, Bound::Exact);
        // A much shallower bound result must not evict it
        tt.store(99, mv(8, 16), -5, 0, 2, Bound::Lower);
        let hit = tt.probe(99).unwrap();
        assert_eq!(hit.depth, 20);
        assert_eq!(hit.mv, mv(0, 8));
    }

    #[test]
    fn test_mate_score_translation() {
        let root_mate = MATE - 8;
        let stored = score_to_tt(root_mate, 3);
        assert_eq!(score_from_tt(stored, 3), root_mate);

        let mated = -MATE + 5;
        let stored = score_to_tt(mated, 2);
        assert_eq!(score_from_tt(stored, 2), mated);

        assert_eq!(score_to_tt(123, 10), 123);
    }

    #[test]
    fn test_hashfull_counts_current_generation() {
        let tt = TranspositionTable::new(1);
        tt.new_search();
        assert_eq!(tt.hashfull(), 0);
        for i in 0..100u64 {
            tt.store(i * 7919, Move::NONE, 0, 0, 1, Bound::Lower);
        }
        assert!(tt.hashfull() > 0);
    }
}
