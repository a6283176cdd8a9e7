use allreduces::AlConfig;
use allreduces_harness::cli::{self, Mode, USAGE_EXIT_CODE};
use allreduces_harness::config::HarnessConfig;
use allreduces_harness::correctness::{Report, run_baseline_suite, run_vendor_suite};
use allreduces_harness::init_tracing;
use allreduces_harness::launch::{launch, launch_with};
use allreduces_vendor::VendorCommunicator;
use anyhow::Context as _;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = match cli::parse_args(std::env::args_os()) {
        Ok(args) => args,
        Err(_) => {
            let prog = std::env::args().next().unwrap_or_else(|| "test_correctness".into());
            eprintln!("{}", cli::usage(&prog));
            std::process::exit(USAGE_EXIT_CODE);
        }
    };

    let harness = Arc::new(HarnessConfig::correctness().with_env());
    let config = AlConfig::from_env();
    tracing::info!(world_size = harness.world_size, mode = ?args.mode(), "starting");

    let reports: Vec<Report> = match args.mode() {
        Mode::Baseline => {
            launch(harness.world_size, config, move |comm| {
                let harness = Arc::clone(&harness);
                async move { run_baseline_suite(comm, &harness).await }
            })
            .await?
        }
        Mode::Vendor => {
            let vendors = VendorCommunicator::init_all(harness.world_size)
                .context("initializing the vendor communicators")?;
            launch_with(harness.world_size, config, vendors, move |comm, vendor| {
                let harness = Arc::clone(&harness);
                async move { run_vendor_suite(comm, vendor, &harness).await }
            })
            .await?
        }
    };

    let failed: usize = reports.iter().map(|r| r.mismatches.len()).sum();
    let checks: usize = reports.iter().map(|r| r.checks).sum();
    tracing::info!(checks, failed, "done");
    Ok(())
}
