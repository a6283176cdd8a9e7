//! In-process launch: one task per rank on the current runtime.

use allreduces::{AlConfig, Communicator, Context};
use anyhow::{Context as _, anyhow, ensure};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Run `f` on every rank of a fresh world and finalize it. Returns each
/// rank's result in rank order, or the first rank's error.
pub async fn launch<F, Fut, T>(world_size: u32, config: AlConfig, f: F) -> anyhow::Result<Vec<T>>
where
    F: Fn(Arc<Communicator>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let per_rank = vec![(); world_size as usize];
    launch_with(world_size, config, per_rank, move |comm, ()| f(comm)).await
}

/// Like [`launch`], additionally handing rank `r` the value `per_rank[r]`.
///
/// The first rank to fail (with an error or a panic) aborts every other
/// rank's task, since those are typically blocked in a collective the
/// failed rank will never join. The world is finalized either way.
pub async fn launch_with<X, F, Fut, T>(
    world_size: u32,
    config: AlConfig,
    per_rank: Vec<X>,
    f: F,
) -> anyhow::Result<Vec<T>>
where
    X: Send + 'static,
    F: Fn(Arc<Communicator>, X) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    ensure!(
        per_rank.len() == world_size as usize,
        "{} per-rank values for a world of {world_size}",
        per_rank.len()
    );
    let ctx = Context::initialize(world_size, config)
        .await
        .context("initializing the world")?;

    let f = Arc::new(f);
    let mut tasks = JoinSet::new();
    let mut ranks = HashMap::with_capacity(per_rank.len());
    for (comm, extra) in ctx.communicators().iter().zip(per_rank) {
        let comm = Arc::clone(comm);
        let f = Arc::clone(&f);
        let rank = comm.rank();
        let handle = tasks.spawn(async move { f(comm, extra).await });
        ranks.insert(handle.id(), rank);
    }

    let mut results: Vec<Option<T>> = std::iter::repeat_with(|| None)
        .take(world_size as usize)
        .collect();
    let mut first_err = None;
    while let Some(joined) = tasks.join_next_with_id().await {
        let failure = match joined {
            Ok((id, Ok(v))) => {
                if let Some(&rank) = ranks.get(&id) {
                    results[rank as usize] = Some(v);
                }
                continue;
            }
            Ok((id, Err(e))) => {
                let rank = ranks.get(&id).copied().unwrap_or_default();
                tracing::error!(rank, "rank failed: {e:#}");
                e.context(format!("rank {rank}"))
            }
            Err(e) if e.is_cancelled() => continue,
            Err(e) => {
                let rank = ranks.get(&e.id()).copied().unwrap_or_default();
                anyhow!("rank {rank} task failed: {e}")
            }
        };
        if first_err.is_none() {
            tasks.abort_all();
            first_err = Some(failure);
        }
    }

    ctx.finalize().await.context("finalizing the world")?;
    if let Some(e) = first_err {
        return Err(e);
    }
    results
        .into_iter()
        .enumerate()
        .map(|(rank, r)| r.ok_or_else(|| anyhow!("rank {rank} produced no result")))
        .collect()
}
