//! Runtime-configurable tuning parameters.
//!
//! All values have sensible defaults. Override via environment variables
//! (prefixed `AL_`) or by constructing a custom `AlConfig`.

use std::time::Duration;

/// Tuning parameters for collective operations and transport.
#[derive(Debug, Clone)]
pub struct AlConfig {
    /// Timeout for each receive inside a point-to-point or collective call.
    /// `None` waits forever, which is what a peer that never shows up does
    /// to a blocking call.
    pub collective_timeout: Option<Duration>,

    /// How long `finalize` waits for peers to say goodbye before closing.
    pub finalize_timeout: Duration,

    /// Automatic selection uses recursive doubling up to this many bytes.
    pub small_msg_bytes: usize,

    /// Automatic selection uses Rabenseifner up to this many bytes when the
    /// world size is a power of two.
    pub large_msg_bytes: usize,

    /// Largest world for which automatic selection prefers the plain ring
    /// over the pairwise-exchange ring.
    pub ring_max_world: usize,
}

impl Default for AlConfig {
    fn default() -> Self {
        Self {
            collective_timeout: None,
            finalize_timeout: Duration::from_secs(10),
            small_msg_bytes: 64 * 1024,       // 64 KiB
            large_msg_bytes: 4 * 1024 * 1024, // 4 MiB
            ring_max_world: 8,
        }
    }
}

impl AlConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `AL_COLLECTIVE_TIMEOUT_SECS`
    /// - `AL_FINALIZE_TIMEOUT_SECS`
    /// - `AL_SMALL_MSG_BYTES`
    /// - `AL_LARGE_MSG_BYTES`
    /// - `AL_RING_MAX_WORLD`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(s) = env_parse::<u64>("AL_COLLECTIVE_TIMEOUT_SECS") {
            cfg.collective_timeout = Some(Duration::from_secs(s));
        }
        if let Some(s) = env_parse::<u64>("AL_FINALIZE_TIMEOUT_SECS") {
            cfg.finalize_timeout = Duration::from_secs(s);
        }
        if let Some(n) = env_parse("AL_SMALL_MSG_BYTES") {
            cfg.small_msg_bytes = n;
        }
        if let Some(n) = env_parse("AL_LARGE_MSG_BYTES") {
            cfg.large_msg_bytes = n;
        }
        if let Some(n) = env_parse("AL_RING_MAX_WORLD") {
            cfg.ring_max_world = n;
        }

        cfg
    }
}

/// Parse an environment variable, treating unset or malformed values as absent.
pub fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}
