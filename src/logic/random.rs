//! Randomness seam for matchmaking and combat.

use rand::Rng;

/// Source of uniform draws. Every `rand::Rng` is one; tests can script exact sequences.
pub trait RandomSource {
    /// Uniform draw in `0..bound`. `bound` must be non-zero.
    fn below(&mut self, bound: u32) -> u32;
}

impl<R: Rng + ?Sized> RandomSource for R {
    fn below(&mut self, bound: u32) -> u32 {
        self.gen_range(0..bound)
    }
}
