use allreduces::AlConfig;
use allreduces_harness::bench::run_pingpong;
use allreduces_harness::cli::BenchArgs;
use allreduces_harness::config::HarnessConfig;
use allreduces_harness::init_tracing;
use allreduces_harness::launch::launch;
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let BenchArgs {} = BenchArgs::parse();

    let harness = Arc::new(HarnessConfig::benchmark().with_env());
    anyhow::ensure!(
        harness.world_size >= 2,
        "benchmark_pingpong needs AL_WORLD_SIZE of at least 2"
    );
    launch(harness.world_size, AlConfig::from_env(), move |comm| {
        let harness = Arc::clone(&harness);
        async move { run_pingpong(comm, &harness).await }
    })
    .await?;
    Ok(())
}
