//! Allreduce algorithms and the dispatch that picks one per call.
//!
//! Every algorithm reduces `buf` in place across all ranks of `comm`, using
//! `tag` for all of its messages. Callers draw the tag from the
//! communicator before the call so that every rank uses the same one.

mod baseline;
mod barrier;
pub mod helpers;
mod pe_ring;
mod rabenseifner;
mod recursive_doubling;
mod ring;
pub mod select;

pub use helpers::ChunkLayout;

pub(crate) use baseline::baseline_allreduce;
pub(crate) use barrier::dissemination_barrier;

use crate::comm::Communicator;
use crate::error::{AlError, Result};
use crate::types::{AllreduceAlgorithm, Element, ReduceOp};

/// Run one allreduce with `algo` and release the tag's lanes afterwards.
pub(crate) async fn allreduce_with_tag<T: Element>(
    comm: &Communicator,
    buf: &mut [T],
    op: ReduceOp,
    algo: AllreduceAlgorithm,
    tag: u64,
) -> Result<()> {
    let world = comm.world_size() as usize;
    if buf.is_empty() || world <= 1 {
        return Ok(());
    }

    let resolved = select::resolve(algo, std::mem::size_of_val(buf), world, comm.config());
    tracing::debug!(
        rank = comm.rank(),
        tag,
        algorithm = %resolved,
        count = buf.len(),
        dtype = %T::DTYPE,
        %op,
        "allreduce"
    );

    let result = match resolved {
        AllreduceAlgorithm::Passthrough => baseline::baseline_allreduce(comm, buf, op, tag).await,
        AllreduceAlgorithm::RecursiveDoubling => {
            recursive_doubling::recursive_doubling_allreduce(comm, buf, op, tag).await
        }
        AllreduceAlgorithm::Ring => ring::ring_allreduce(comm, buf, op, tag).await,
        AllreduceAlgorithm::Rabenseifner => {
            rabenseifner::rabenseifner_allreduce(comm, buf, op, tag).await
        }
        AllreduceAlgorithm::PeRing => pe_ring::pe_ring_allreduce(comm, buf, op, tag).await,
        AllreduceAlgorithm::Automatic => Err(AlError::CollectiveFailed {
            operation: "allreduce",
            rank: comm.rank(),
            reason: "automatic selection did not resolve".into(),
        }),
    };
    comm.release_tag(tag).await;
    result
}
