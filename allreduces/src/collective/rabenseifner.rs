use crate::collective::helpers::{
    collective_recv, collective_send, largest_power_of_two_le, send_recv,
};
use crate::comm::Communicator;
use crate::error::Result;
use crate::reduce::{Order, as_bytes, copy_bytes_into, reduce_bytes_into};
use crate::types::{Element, Rank, ReduceOp};
use std::ops::Range;

const OP: &str = "rabenseifner_allreduce";

/// Rabenseifner allreduce: reduce-scatter by recursive halving, then
/// allgather by recursive doubling over the same partners in reverse.
///
/// Each halving round hands half of the current slice to the partner and
/// reduces the other half, so every rank moves about `2 (p-1)/p` of the
/// buffer in `2 log2(p)` rounds. Ranks beyond the largest power of two fold
/// in and out exactly as in recursive doubling.
pub(crate) async fn rabenseifner_allreduce<T: Element>(
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
        let folded = collective_recv(comm, (rank + p2) as Rank, tag, OP).await?;
        reduce_bytes_into(buf, &folded, op, Order::LocalFirst)?;
    }

    // Recursive halving. Partners always hold the same slice at the start of
    // a round; the lower rank keeps the lower half.
    let mut slice = 0..buf.len();
    let mut given: Vec<Range<usize>> = Vec::new();
    let mut mask = p2 >> 1;
    while mask > 0 {
        let partner = rank ^ mask;
        let mid = slice.start + slice.len() / 2;
        let (keep, give) = if rank < partner {
            (slice.start..mid, mid..slice.end)
        } else {
            (mid..slice.end, slice.start..mid)
        };
        let peer = partner as Rank;
        let received = send_recv(comm, peer, peer, tag, as_bytes(&buf[give.clone()]), OP).await?;
        reduce_bytes_into(
            &mut buf[keep.clone()],
            &received,
            op,
            Order::by_rank(rank as Rank, peer),
        )?;
        given.push(give);
        slice = keep;
        mask >>= 1;
    }

    // Recursive doubling: the partner of each round now owns exactly the
    // range we gave it, fully reduced.
    let mut mask = 1;
    for give in given.into_iter().rev() {
        let peer = (rank ^ mask) as Rank;
        let received = send_recv(comm, peer, peer, tag, as_bytes(&buf[slice.clone()]), OP).await?;
        copy_bytes_into(&mut buf[give.clone()], &received)?;
        slice = slice.start.min(give.start)..slice.end.max(give.end);
        mask <<= 1;
    }

    if rank < excess {
        collective_send(comm, (rank + p2) as Rank, tag, as_bytes(buf), OP).await?;
    }
    Ok(())
}
