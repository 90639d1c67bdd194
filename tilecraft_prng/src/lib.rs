// Seeded pseudo-random source for the tile simulation.
//
// xoshiro256++ (Blackman & Vigna) expanded from a single `u64` seed with
// SplitMix64. Every random verb in `tilecraft_sim` draws from one `GameRng`
// owned by the controller: `turnRandom`, `repeatRandom` iteration counts,
// `moveRandom`, and the cell picked by an un-positioned `spawnEntity`.
// Replaying the same level with the same seed and the same command stream
// reproduces the same attempt.
//
// The level seed comes from `LevelConfig::seed`; `resetAttempt` re-seeds so
// each attempt starts from the same stream.
//
// **Critical constraint: determinism.** Integer-only core generator. Float
// helpers are derived from the integer output and never feed back into state.

use serde::{Deserialize, Serialize};

/// xoshiro256++ generator state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRng {
    s: [u64; 4],
}

impl GameRng {
    /// Seed a generator. Equal seeds yield equal streams.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Next raw 64-bit output.
    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);
        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];
        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Uniform `f64` in [0, 1) from the top 53 bits.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform integer in `[0, bound)` by rejection sampling.
    ///
    /// Returns 0 when `bound` is 0 so callers picking from an empty slice get
    /// a harmless index they must still bounds-check.
    pub fn below(&mut self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        if bound.is_power_of_two() {
            return self.next_u64() & (bound - 1);
        }
        let threshold = bound.wrapping_neg() % bound;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return r % bound;
            }
        }
    }

    /// Uniform `i32` in `[low, high]`, inclusive on both ends. Swapped bounds
    /// are normalised rather than rejected.
    pub fn range_i32_inclusive(&mut self, low: i32, high: i32) -> i32 {
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        let span = (i64::from(high) - i64::from(low) + 1) as u64;
        (i64::from(low) + self.below(span) as i64) as i32
    }

    /// Index into a collection of `len` items, or `None` if it is empty.
    pub fn index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            None
        } else {
            Some(self.below(len as u64) as usize)
        }
    }

    /// Pick one element of a slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        self.index(items.len()).map(|i| &items[i])
    }

    /// `true` with probability `p`; `p <= 0` is never, `p >= 1` is always.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
