use allreduces::reduce::{Order, as_bytes, reduce_bytes_into};
use allreduces::{Element, Rank, ReduceOp};

use super::{absolute, relative};
use crate::fabric::{Lane, Port};

/// Binomial-tree reduce of `buf` to `root`.
///
/// Each parent folds its children in increasing distance, keeping its own
/// partial on the left. Only the root's `buf` holds the result afterwards;
/// other ranks are left with partial sums.
pub(crate) async fn tree_reduce<T: Element>(
    port: &Port,
    buf: &mut [T],
    op: ReduceOp,
    root: Rank,
) -> allreduces::Result<()> {
    let world = port.world_size();
    let vrank = relative(port.rank(), root, world);

    let mut mask = 1;
    while mask < world {
        if vrank & mask != 0 {
            let parent = absolute(vrank - mask, root, world);
            return port.send(parent, Lane::Collective, as_bytes(buf));
        }
        let child = vrank + mask;
        if child < world {
            let partial = port
                .recv(absolute(child, root, world), Lane::Collective)
                .await?;
            reduce_bytes_into(buf, &partial, op, Order::LocalFirst)?;
        }
        mask <<= 1;
    }
    Ok(())
}
