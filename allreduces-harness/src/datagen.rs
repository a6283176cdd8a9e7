use allreduces::Rank;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Values are `k / GRID` for `k` in `-GRID..=GRID`.
pub const GRID: i32 = 1024;

/// Deterministic per-rank test vectors.
///
/// Every value sits on the `k / 1024` grid in `[-1, 1]`, so sums over many
/// ranks are exact in `f32` and every reduction order gives the same bits.
#[derive(Debug, Clone, Copy)]
pub struct DataGenerator {
    seed: u64,
}

impl DataGenerator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// `size` values for `rank`; the same (seed, rank, size) always gives
    /// the same vector.
    pub fn generate(&self, size: usize, rank: Rank) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(self.stream_seed(size, rank));
        (0..size)
            .map(|_| rng.gen_range(-GRID..=GRID) as f32 / GRID as f32)
            .collect()
    }

    /// `size` copies of `value`.
    pub fn constant(size: usize, value: f32) -> Vec<f32> {
        vec![value; size]
    }

    fn stream_seed(&self, size: usize, rank: Rank) -> u64 {
        // splitmix64 finalizer over the three inputs
        let mut z = self
            .seed
            .wrapping_add(u64::from(rank).wrapping_mul(0x9E37_79B9_7F4A_7C15))
            .wrapping_add((size as u64).wrapping_mul(0xD1B5_4A32_D192_ED03));
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}
