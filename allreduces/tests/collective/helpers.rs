use allreduces::{AlConfig, Communicator, Context, Rank};
use std::sync::Arc;

/// Run `f` once per rank of a fresh world, concurrently, then finalize the
/// world. Panics in any rank fail the test.
pub async fn run_collective<F, Fut>(world_size: u32, f: F)
where
    F: Fn(Arc<Communicator>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    run_collective_with(world_size, AlConfig::default(), f).await;
}

pub async fn run_collective_with<F, Fut>(world_size: u32, config: AlConfig, f: F)
where
    F: Fn(Arc<Communicator>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let ctx = Context::initialize(world_size, config).await.unwrap();

    let f = Arc::new(f);
    let mut handles = Vec::new();
    for c in ctx.communicators() {
        let c = Arc::clone(c);
        let f = Arc::clone(&f);
        handles.push(tokio::spawn(async move { f(c).await }));
    }
    for h in handles {
        h.await.unwrap();
    }
    ctx.finalize().await.unwrap();
}

/// Per-rank test input on the k/1024 grid, so sums over a few ranks are
/// exact in f32 and every summation order agrees bit for bit.
pub fn input(rank: Rank, count: usize) -> Vec<f32> {
    (0..count)
        .map(|i| ((rank as usize * 131 + i * 17) % 2049) as f32 / 1024.0 - 1.0)
        .collect()
}

/// Element-wise sum of every rank's `input`.
pub fn expected_sum(world_size: u32, count: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; count];
    for r in 0..world_size {
        for (o, v) in out.iter_mut().zip(input(r, count)) {
            *o += v;
        }
    }
    out
}

pub const SIZES: &[usize] = &[0, 1, 2, 3, 4, 5, 8, 9, 16, 17, 64, 65, 1000];
