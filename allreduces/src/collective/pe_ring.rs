use crate::collective::helpers::{ChunkLayout, send_recv};
use crate::comm::Communicator;
use crate::error::{AlError, Result};
use crate::reduce::{Order, as_bytes, copy_bytes_into, reduce_bytes_into, reduce_into};
use crate::types::{Element, Rank, ReduceOp};

const OP: &str = "pe_ring_allreduce";

/// Pairwise-exchange reduce-scatter followed by a ring allgather.
///
/// Rank `j` owns chunk `j`. In round `k` every rank sends chunk
/// `rank + k` to its owner and receives its own chunk from `rank - k`, so
/// each round is a permutation with no hot spot. The owner folds the
/// contributions in rank order before the allgather spreads the chunks.
pub(crate) async fn pe_ring_allreduce<T: Element>(
    comm: &Communicator,
    buf: &mut [T],
    op: ReduceOp,
    tag: u64,
) -> Result<()> {
    let world = comm.world_size() as usize;
    let rank = comm.rank() as usize;
    let layout = ChunkLayout::new(buf.len(), world);
    let mine = layout.range(rank);

    let mut contributions: Vec<Option<_>> = (0..world).map(|_| None).collect();
    for offset in 1..world {
        let dest = (rank + offset) % world;
        let src = (rank + world - offset) % world;
        let received = send_recv(
            comm,
            dest as Rank,
            src as Rank,
            tag,
            as_bytes(&buf[layout.range(dest)]),
            OP,
        )
        .await?;
        contributions[src] = Some(received);
    }

    let own = buf[mine.clone()].to_vec();
    let acc = &mut buf[mine];
    for (r, contribution) in contributions.iter_mut().enumerate() {
        if r == rank {
            if r != 0 {
                reduce_into(acc, &own, op)?;
            }
            continue;
        }
        let bytes = contribution.take().ok_or_else(|| AlError::CollectiveFailed {
            operation: OP,
            rank: rank as Rank,
            reason: format!("no contribution received from rank {r}"),
        })?;
        if r == 0 {
            copy_bytes_into(acc, &bytes)?;
        } else {
            reduce_bytes_into(acc, &bytes, op, Order::LocalFirst)?;
        }
    }

    let next = ((rank + 1) % world) as Rank;
    let prev = ((rank + world - 1) % world) as Rank;
    for step in 0..world - 1 {
        let send_idx = (rank + world - step) % world;
        let recv_idx = (rank + world - step - 1) % world;
        let received = send_recv(
            comm,
            next,
            prev,
            tag,
            as_bytes(&buf[layout.range(send_idx)]),
            OP,
        )
        .await?;
        copy_bytes_into(&mut buf[layout.range(recv_idx)], &received)?;
    }
    Ok(())
}
