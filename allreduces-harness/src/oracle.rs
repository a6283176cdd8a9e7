//! Expected results, computed with the baseline allreduce.

use crate::datagen::DataGenerator;
use allreduces::{Communicator, Element, Rank, ReduceOp};

/// Reduce `local` across all ranks with the rank-ordered baseline.
pub async fn reduce_baseline<T: Element>(
    comm: &Communicator,
    local: &[T],
    op: ReduceOp,
) -> allreduces::Result<Vec<T>> {
    let mut out = local.to_vec();
    comm.baseline_allreduce(&mut out, op).await?;
    Ok(out)
}

/// One message size's input on this rank and the expected sum, computed
/// once and shared by every candidate checked at that size.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub size: usize,
    pub rank: Rank,
    pub input: Vec<f32>,
    pub expected: Vec<f32>,
}

impl TestCase {
    /// Generate this rank's input and reduce it with the baseline. Every
    /// rank must call this for the same `size` in the same order.
    pub async fn prepare(
        comm: &Communicator,
        generator: &DataGenerator,
        size: usize,
    ) -> allreduces::Result<Self> {
        let input = generator.generate(size, comm.rank());
        let expected = reduce_baseline(comm, &input, ReduceOp::Sum).await?;
        Ok(Self {
            size,
            rank: comm.rank(),
            input,
            expected,
        })
    }
}
