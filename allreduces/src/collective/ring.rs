use crate::collective::helpers::{ChunkLayout, send_recv};
use crate::comm::Communicator;
use crate::error::Result;
use crate::reduce::{Order, as_bytes, copy_bytes_into, reduce_bytes_into};
use crate::types::{Element, Rank, ReduceOp};

const OP: &str = "ring_allreduce";

/// Ring allreduce: reduce-scatter then allgather around the ring, each in
/// `n - 1` steps of one chunk. Bandwidth-optimal: every rank sends
/// `2 (n-1)/n` of the buffer regardless of world size.
pub(crate) async fn ring_allreduce<T: Element>(
    comm: &Communicator,
    buf: &mut [T],
    op: ReduceOp,
    tag: u64,
) -> Result<()> {
    let world = comm.world_size() as usize;
    let rank = comm.rank() as usize;
    let layout = ChunkLayout::new(buf.len(), world);
    let next = ((rank + 1) % world) as Rank;
    let prev = ((rank + world - 1) % world) as Rank;

    // Reduce-scatter: after step s, chunk (rank - s - 1) holds s + 2
    // contributions. Rank r ends up owning the full reduction of chunk r + 1.
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
        reduce_bytes_into(
            &mut buf[layout.range(recv_idx)],
            &received,
            op,
            Order::RemoteFirst,
        )?;
    }

    // Allgather: pass the finished chunks around.
    for step in 0..world - 1 {
        let send_idx = (rank + 1 + world - step) % world;
        let recv_idx = (rank + world - step) % world;
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
