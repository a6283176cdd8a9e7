//! Command-line parsing for the harness binaries.

use clap::Parser;
use std::ffi::OsString;

/// Exit status for a malformed command line.
pub const USAGE_EXIT_CODE: i32 = -1;

/// What `test_correctness` checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Every algorithm against the rank-ordered baseline.
    #[default]
    Baseline,
    /// The vendor backend against the same baseline.
    Vendor,
}

fn parse_mode(s: &str) -> Result<Mode, String> {
    match s {
        "0" => Ok(Mode::Baseline),
        "1" => Ok(Mode::Vendor),
        other => Err(format!("'{other}' is not 0 or 1")),
    }
}

/// Arguments of `test_correctness`. There are no flags, `--help`
/// included; anything but a single `0` or `1` is a usage error.
#[derive(Debug, Parser)]
#[command(disable_help_flag = true)]
pub struct CorrectnessArgs {
    /// 0 checks the built-in algorithms, 1 checks the vendor backend.
    #[arg(value_parser = parse_mode)]
    pub mode: Option<Mode>,
}

impl CorrectnessArgs {
    pub fn mode(&self) -> Mode {
        self.mode.unwrap_or_default()
    }
}

/// Parse `test_correctness` arguments; `args` includes the program name.
pub fn parse_args<I, A>(args: I) -> Result<CorrectnessArgs, clap::Error>
where
    I: IntoIterator<Item = A>,
    A: Into<OsString> + Clone,
{
    CorrectnessArgs::try_parse_from(args)
}

/// The one-line usage message printed on a bad command line.
pub fn usage(prog: &str) -> String {
    format!("usage: {prog} [0(baseline) | 1(vendor)]")
}

/// `benchmark_pingpong` takes no arguments; tuning comes from `AL_*`
/// environment variables.
#[derive(Debug, Parser)]
#[command(about = "Time host and device ping-pong between ranks 0 and 1")]
pub struct BenchArgs {}
