use allreduces::collective::ChunkLayout;
use allreduces::reduce::{Order, as_bytes, copy_bytes_into, reduce_bytes_into};
use allreduces::{Element, Rank, ReduceOp};

use super::{tree_broadcast, tree_reduce};
use crate::fabric::{Lane, Port};
use crate::types::Protocol;

/// Allreduce over the fabric with the protocol the library picks for this
/// message size.
pub(crate) async fn fabric_allreduce<T: Element>(
    port: &Port,
    buf: &mut [T],
    op: ReduceOp,
) -> allreduces::Result<()> {
    let world = port.world_size();
    if buf.is_empty() || world <= 1 {
        return Ok(());
    }
    let protocol = Protocol::select(std::mem::size_of_val(buf), world);
    tracing::debug!(
        rank = port.rank(),
        %protocol,
        count = buf.len(),
        dtype = %T::DTYPE,
        %op,
        "vendor allreduce"
    );
    match protocol {
        Protocol::Tree => {
            tree_reduce(port, buf, op, 0).await?;
            tree_broadcast(port, buf, 0).await
        }
        Protocol::Ring => ring_allreduce(port, buf, op).await,
    }
}

/// Ring reduce-scatter then ring allgather. Sends never block on the
/// fabric, so each step sends before it receives.
async fn ring_allreduce<T: Element>(
    port: &Port,
    buf: &mut [T],
    op: ReduceOp,
) -> allreduces::Result<()> {
    let world = port.world_size();
    let rank = port.rank() as usize;
    let layout = ChunkLayout::new(buf.len(), world);
    let next = ((rank + 1) % world) as Rank;
    let prev = ((rank + world - 1) % world) as Rank;

    for step in 0..world - 1 {
        let send_idx = (rank + world - step) % world;
        let recv_idx = (rank + world - step - 1) % world;
        port.send(next, Lane::Collective, as_bytes(&buf[layout.range(send_idx)]))?;
        let received = port.recv(prev, Lane::Collective).await?;
        reduce_bytes_into(
            &mut buf[layout.range(recv_idx)],
            &received,
            op,
            Order::RemoteFirst,
        )?;
    }

    for step in 0..world - 1 {
        let send_idx = (rank + 1 + world - step) % world;
        let recv_idx = (rank + world - step) % world;
        port.send(next, Lane::Collective, as_bytes(&buf[layout.range(send_idx)]))?;
        let received = port.recv(prev, Lane::Collective).await?;
        copy_bytes_into(&mut buf[layout.range(recv_idx)], &received)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fabric::connect;
    use std::sync::Arc;

    async fn run(world: usize, count: usize) -> Vec<Vec<f64>> {
        let ports: Vec<Arc<Port>> = connect(world).into_iter().map(Arc::new).collect();
        let tasks: Vec<_> = ports
            .iter()
            .map(|port| {
                let port = Arc::clone(port);
                tokio::spawn(async move {
                    let mut buf: Vec<f64> =
                        (0..count).map(|i| (i + port.rank() as usize) as f64).collect();
                    fabric_allreduce(&port, &mut buf, ReduceOp::Sum).await.unwrap();
                    buf
                })
            })
            .collect();
        let mut out = Vec::new();
        for t in tasks {
            out.push(t.await.unwrap());
        }
        out
    }

    fn expected(world: usize, count: usize) -> Vec<f64> {
        (0..count)
            .map(|i| (0..world).map(|r| (i + r) as f64).sum())
            .collect()
    }

    #[tokio::test]
    async fn test_tree_small_message() {
        for world in 1..=5 {
            for result in run(world, 7).await {
                assert_eq!(result, expected(world, 7), "world {world}");
            }
        }
    }

    #[tokio::test]
    async fn test_ring_large_message() {
        let count = 40_000; // 320 KB of f64
        for result in run(3, count).await {
            assert_eq!(result, expected(3, count));
        }
    }
}
