//! Deterministic random number generator for cell updates
//!
//! A thin wrapper over `Xoshiro256StarStar` seeded through `SeedableRng::seed_from_u64`,
//! so neighbouring chunk keys do not produce correlated streams. Each chunk gets a static
//! stream (seed + chunk key) for world generation and a temporal one (static stream mixed
//! with the tick) for stepping.

use rand::{Rng, RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

/// Convert a probability in `0.0..=1.0` into a fixed-point threshold out of `u32::MAX`
pub fn probability_threshold(probability: f64) -> u32 {
    if probability.is_nan() || probability <= 0.0 {
        0
    } else if probability >= 1.0 {
        u32::MAX
    } else {
        (probability * f64::from(u32::MAX)) as u32
    }
}

/// Per-chunk random stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellRng {
    inner: Xoshiro256StarStar,
}

impl CellRng {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: Xoshiro256StarStar::seed_from_u64(seed),
        }
    }

    /// Fold `value` into the stream by reseeding from the next output
    pub fn mix(&mut self, value: u64) {
        let seed = self.inner.next_u64() ^ value;
        self.inner = Xoshiro256StarStar::seed_from_u64(seed);
    }

    #[inline]
    pub fn gen_u32(&mut self) -> u32 {
        self.inner.r#gen()
    }

    #[inline]
    pub fn gen_bool(&mut self) -> bool {
        self.inner.r#gen()
    }

    /// Uniform in `[0.0, 1.0)`
    #[inline]
    pub fn gen_f32(&mut self) -> f32 {
        self.inner.r#gen()
    }

    /// Uniform in `[min, max)`. Requires `min < max`.
    #[inline]
    pub fn gen_range(&mut self, min: u32, max: u32) -> u32 {
        debug_assert!(min < max, "gen_range requires min < max");
        self.inner.gen_range(min..max)
    }

    /// Uniform in `[min, max)`
    pub fn gen_range_i32(&mut self, min: i32, max: i32) -> i32 {
        debug_assert!(min < max, "gen_range_i32 requires min < max");
        self.inner.gen_range(min..max)
    }

    /// Uniform in `[min, max)`, or `min` for an empty range
    pub fn gen_range_f32(&mut self, min: f32, max: f32) -> f32 {
        if min < max {
            self.inner.gen_range(min..max)
        } else {
            min
        }
    }

    /// -1 or 1
    #[inline]
    pub fn gen_sign(&mut self) -> i32 {
        if self.inner.r#gen::<bool>() { 1 } else { -1 }
    }

    /// `p <= 0` is always false and `p >= 1` always true.
    pub fn check_probability(&mut self, probability: f32) -> bool {
        if probability.is_nan() || probability <= 0.0 {
            false
        } else if probability >= 1.0 {
            true
        } else {
            self.gen_f32() < probability
        }
    }

    /// Fixed-point variant of [`Self::check_probability`]; a draw equal to the threshold fails.
    #[inline]
    pub fn check_probability_u32(&mut self, threshold: u32) -> bool {
        match threshold {
            0 => false,
            u32::MAX => true,
            threshold => self.gen_u32() < threshold,
        }
    }
}
