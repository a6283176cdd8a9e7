use crate::collective::helpers::send_recv;
use crate::comm::Communicator;
use crate::error::Result;

const OP: &str = "barrier";

/// Dissemination barrier: in round `k` each rank signals `rank + 2^k` and
/// waits for `rank - 2^k`. After `ceil(log2 n)` rounds every rank has
/// transitively heard from every other.
pub(crate) async fn dissemination_barrier(comm: &Communicator, tag: u64) -> Result<()> {
    let world = comm.world_size();
    let rank = comm.rank();
    let mut distance = 1;
    while distance < world {
        let to = (rank + distance) % world;
        let from = (rank + world - distance) % world;
        send_recv(comm, to, from, tag, &[], OP).await?;
        distance <<= 1;
    }
    Ok(())
}
