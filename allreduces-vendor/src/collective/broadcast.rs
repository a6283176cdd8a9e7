use allreduces::reduce::{as_bytes, copy_bytes_into};
use allreduces::{Element, Rank};

use super::{absolute, relative};
use crate::fabric::{Lane, Port};

/// Binomial-tree broadcast of `root`'s `buf` to every rank.
pub(crate) async fn tree_broadcast<T: Element>(
    port: &Port,
    buf: &mut [T],
    root: Rank,
) -> allreduces::Result<()> {
    let world = port.world_size();
    let vrank = relative(port.rank(), root, world);

    let mut mask = 1;
    while mask < world {
        if vrank & mask != 0 {
            let payload = port
                .recv(absolute(vrank - mask, root, world), Lane::Collective)
                .await?;
            copy_bytes_into(buf, &payload)?;
            break;
        }
        mask <<= 1;
    }

    mask >>= 1;
    while mask > 0 {
        if vrank + mask < world {
            port.send(absolute(vrank + mask, root, world), Lane::Collective, as_bytes(buf))?;
        }
        mask >>= 1;
    }
    Ok(())
}
