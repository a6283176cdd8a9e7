//! Correctness and performance drivers for the allreduces backends.
//!
//! The `test_correctness` binary checks every algorithm, blocking and
//! non-blocking, against a rank-ordered baseline over a sweep of message
//! sizes, or checks the vendor backend against the same baseline. The
//! `benchmark_pingpong` binary times point-to-point round trips between
//! ranks 0 and 1 on the host and device paths.

pub mod bench;
pub mod cli;
pub mod compare;
pub mod config;
pub mod correctness;
pub mod datagen;
pub mod launch;
pub mod oracle;
pub mod stats;
pub mod timer;

/// Install the log subscriber used by the binaries: `RUST_LOG` when set,
/// otherwise warnings and errors only.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Compact rendering of an element count for progress lines: exact
/// multiples of 1Ki or 1Mi get a suffix, anything else prints as is.
pub fn human_readable_size(size: usize) -> String {
    const KI: usize = 1 << 10;
    const MI: usize = 1 << 20;
    if size >= MI && size % MI == 0 {
        format!("{}M", size / MI)
    } else if size >= KI && size % KI == 0 {
        format!("{}K", size / KI)
    } else {
        size.to_string()
    }
}
