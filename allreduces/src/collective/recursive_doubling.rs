use crate::collective::helpers::{
    collective_recv, collective_send, largest_power_of_two_le, send_recv,
};
use crate::comm::Communicator;
use crate::error::Result;
use crate::reduce::{Order, as_bytes, copy_bytes_into, reduce_bytes_into};
use crate::types::{Element, Rank, ReduceOp};

const OP: &str = "recursive_doubling_allreduce";

/// Recursive-doubling allreduce: `log2(p)` rounds, each exchanging the whole
/// buffer with the partner `rank ^ 2^r`. Latency-optimal, so it suits small
/// messages.
///
/// For a non-power-of-two world the top `n - p` ranks first fold their
/// buffer into `rank - p`, sit out the rounds, and get the result back at
/// the end.
pub(crate) async fn recursive_doubling_allreduce<T: Element>(
    comm: &Communicator,
    buf: &mut [T],
    op: ReduceOp,
    tag: u64,
) -> Result<()> {
    let world = comm.world_size() as usize;
    let rank = comm.rank() as usize;
    let p2 = largest_power_of_two_le(world);
    let excess = world - p2;

    if rank >= p2 {
        let partner = (rank - p2) as Rank;
        collective_send(comm, partner, tag, as_bytes(buf), OP).await?;
        let result = collective_recv(comm, partner, tag, OP).await?;
        return copy_bytes_into(buf, &result);
    }

    if rank < excess {
        let partner = (rank + p2) as Rank;
        let folded = collective_recv(comm, partner, tag, OP).await?;
        reduce_bytes_into(buf, &folded, op, Order::LocalFirst)?;
    }

    let mut mask = 1;
    while mask < p2 {
        let partner = (rank ^ mask) as Rank;
        let received = send_recv(comm, partner, partner, tag, as_bytes(buf), OP).await?;
        reduce_bytes_into(buf, &received, op, Order::by_rank(rank as Rank, partner))?;
        mask <<= 1;
    }

    if rank < excess {
        collective_send(comm, (rank + p2) as Rank, tag, as_bytes(buf), OP).await?;
    }
    Ok(())
}
