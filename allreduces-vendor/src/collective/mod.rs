//! Reductions and broadcasts over the fabric, on host-staged data.
//!
//! These run inside stream operations: the caller has already copied the
//! device buffer out and copies the result back in.

mod allreduce;
mod broadcast;
mod reduce;

pub(crate) use allreduce::fabric_allreduce;
pub(crate) use broadcast::tree_broadcast;
pub(crate) use reduce::tree_reduce;

use allreduces::Rank;

/// Position of `rank` in a tree rooted at `root`.
fn relative(rank: Rank, root: Rank, world: usize) -> usize {
    (rank as usize + world - root as usize) % world
}

/// Inverse of [`relative`].
fn absolute(vrank: usize, root: Rank, world: usize) -> Rank {
    ((vrank + root as usize) % world) as Rank
}
