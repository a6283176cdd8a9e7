use crate::collective::helpers::{collective_recv, collective_send};
use crate::comm::Communicator;
use crate::error::Result;
use crate::reduce::{Order, as_bytes, copy_bytes_into, reduce_bytes_into, reduce_into};
use crate::types::{Element, ReduceOp};
use futures::future::try_join_all;

const OP: &str = "baseline_allreduce";

/// Reference allreduce: every rank sends its whole buffer to every other
/// rank, then folds all contributions in rank order `0..n`.
///
/// Costs `n - 1` full-buffer messages per rank, but the evaluation order is
/// fixed and identical on every rank, which makes it the yardstick the
/// other algorithms are checked against.
pub(crate) async fn baseline_allreduce<T: Element>(
    comm: &Communicator,
    buf: &mut [T],
    op: ReduceOp,
    tag: u64,
) -> Result<()> {
    let world = comm.world_size();
    let rank = comm.rank();

    let own = buf.to_vec();
    let peers: Vec<_> = (0..world).filter(|&r| r != rank).collect();

    let sends = peers
        .iter()
        .map(|&dest| collective_send(comm, dest, tag, as_bytes(&own), OP));
    let recvs = peers.iter().map(|&src| collective_recv(comm, src, tag, OP));
    let (_, received) = futures::future::try_join(try_join_all(sends), try_join_all(recvs)).await?;

    // `received` follows `peers`, which is ascending and skips `rank`.
    let mut contributions = received.iter();
    for r in 0..world {
        if r == rank {
            if r == 0 {
                continue;
            }
            reduce_into(buf, &own, op)?;
        } else {
            let Some(bytes) = contributions.next() else {
                break;
            };
            if r == 0 {
                copy_bytes_into(buf, bytes)?;
            } else {
                reduce_bytes_into(buf, bytes, op, Order::LocalFirst)?;
            }
        }
    }
    Ok(())
}
