use std::cell::Cell;

/// A pseudo-random number generator based on Wang Yi's Wyrand.
///
/// See: https://github.com/wangyi-fudan/wyhash
#[derive(Clone, Debug)]
pub(crate) struct Rng {
    seed: Cell<u64>,
}

impl Rng {
    /// Creates a new RNG with the provided seed.
    pub(crate) fn new(seed: u64) -> Self {
        Self {
            seed: Cell::new(seed),
        }
    }

    /// Generates a pseudo-random number within the range `0..2⁶⁴`.
    pub(crate) fn gen(&self) -> u64 {
        let seed = self.seed.get().wrapping_add(0xA0761D6478BD642F);
        self.seed.set(seed);
        let t = seed as u128 * (seed ^ 0xE7037ED1A0B428DB) as u128;
        (t as u64) ^ (t >> 64) as u64
    }

    /// Generates a pseudo-random number within the range `0..upper_bound`
    /// using the multiply-shift method.
    pub(crate) fn gen_bounded(&self, upper_bound: u64) -> u64 {
        ((self.gen() as u128 * upper_bound as u128) >> 64) as u64
    }

    /// Generates a pseudo-random beat time on a grid of quarter beats within
    /// `0..max_beats`, so that collisions between times are frequent.
    pub(crate) fn gen_beat(&self, max_beats: u64) -> f64 {
        self.gen_bounded(max_beats * 4) as f64 * 0.25
    }
}
