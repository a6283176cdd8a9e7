//! Harness settings, read from `AL_`-prefixed environment variables.

use allreduces::config::env_parse;

/// Settings shared by both binaries.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Number of in-process ranks (`AL_WORLD_SIZE`).
    pub world_size: u32,
    /// Largest power of two in the correctness sweep (`AL_TEST_MAX_SIZE`).
    pub test_max_size: usize,
    /// Smallest message in the ping-pong sweep.
    pub bench_start_size: usize,
    /// Largest message in the ping-pong sweep (`AL_BENCH_MAX_SIZE`).
    pub bench_max_size: usize,
    /// Trials per ping-pong size, including the dropped warm-up
    /// (`AL_BENCH_TRIALS`).
    pub bench_trials: usize,
    /// How long the device is kept busy before each timed trial, in seconds.
    pub bench_gpu_wait: f64,
    /// Seed for the data generator (`AL_DATA_SEED`).
    pub data_seed: u64,
}

impl HarnessConfig {
    /// Defaults for the correctness binary.
    pub fn correctness() -> Self {
        Self {
            world_size: 4,
            ..Self::base()
        }
    }

    /// Defaults for the benchmark binary.
    pub fn benchmark() -> Self {
        Self {
            world_size: 2,
            ..Self::base()
        }
    }

    fn base() -> Self {
        Self {
            world_size: 2,
            test_max_size: 1 << 16,
            bench_start_size: 1,
            bench_max_size: 1 << 18,
            bench_trials: 100,
            bench_gpu_wait: 0.001,
            data_seed: 0x5eed,
        }
    }

    /// Apply environment overrides on top of `self`. Unset or malformed
    /// variables keep the current value.
    pub fn with_env(mut self) -> Self {
        if let Some(n) = env_parse("AL_WORLD_SIZE") {
            self.world_size = n;
        }
        if let Some(n) = env_parse("AL_TEST_MAX_SIZE") {
            self.test_max_size = n;
        }
        if let Some(n) = env_parse("AL_BENCH_MAX_SIZE") {
            self.bench_max_size = n;
        }
        if let Some(n) = env_parse::<usize>("AL_BENCH_TRIALS") {
            // At least two, so one sample survives the warm-up drop.
            self.bench_trials = n.max(2);
        }
        if let Some(n) = env_parse("AL_DATA_SEED") {
            self.data_seed = n;
        }
        self
    }
}
