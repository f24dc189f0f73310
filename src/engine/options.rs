//! Engine option storage and clamping.

/// Typed engine options, mirrored by the UCI `option` declarations.
#[derive(Clone, Debug)]
pub struct EngineOptions {
    /// Transposition table size in MiB
    pub hash_mb: usize,
    /// Number of search threads
    pub threads: usize,
    /// Number of principal variations to report
    pub multi_pv: usize,
    /// Time reserved per move for I/O latency, in ms
    pub move_overhead: u64,
    /// Lower bound on the per-move time budget, in ms
    pub min_thinking_ms: u64,
    /// Chess960 castling rules and notation
    pub chess960: bool,
}

pub const HASH_MIN: usize = 1;
pub const HASH_MAX: usize = 16384;
pub const THREADS_MIN: usize = 1;
pub const THREADS_MAX: usize = 256;
pub const MULTI_PV_MIN: usize = 1;
pub const MULTI_PV_MAX: usize = 500;
pub const MOVE_OVERHEAD_MAX: u64 = 5000;
pub const MIN_THINKING_MAX: u64 = 5000;

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            hash_mb: 16,
            threads: 1,
            multi_pv: 1,
            move_overhead: 30,
            min_thinking_ms: 0,
            chess960: false,
        }
    }
}

impl EngineOptions {
    pub fn set_hash(&mut self, mb: usize) {
        self.hash_mb = mb.clamp(HASH_MIN, HASH_MAX);
    }

    pub fn set_threads(&mut self, threads: usize) {
        self.threads = threads.clamp(THREADS_MIN, THREADS_MAX);
    }

    pub fn set_multi_pv(&mut self, lines: usize) {
        self.multi_pv = lines.clamp(MULTI_PV_MIN, MULTI_PV_MAX);
    }

    pub fn set_move_overhead(&mut self, ms: u64) {
        self.move_overhead = ms.min(MOVE_OVERHEAD_MAX);
    }

    pub fn set_min_thinking(&mut self, ms: u64) {
        self.min_thinking_ms = ms.min(MIN_THINKING_MAX);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamping() {
        let mut options = EngineOptions::default();
        options.set_hash(0);
        assert_eq!(options.hash_mb, HASH_MIN);
        options.set_hash(1 << 30);
        assert_eq!(options.hash_mb, HASH_MAX);
        options.set_threads(0);
        assert_eq!(options.threads, 1);
        options.set_multi_pv(1000);
        assert_eq!(options.multi_pv, MULTI_PV_MAX);
    }
}
