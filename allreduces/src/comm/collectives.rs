use crate::collective::{allreduce_with_tag, baseline_allreduce, dissemination_barrier};
use crate::comm::Communicator;
use crate::error::{AlError, Result};
use crate::types::{AllreduceAlgorithm, Element, ReduceOp};

impl Communicator {
    /// Out-of-place allreduce: `recv` receives the reduction of every rank's
    /// `send`. `send` is left untouched.
    pub async fn allreduce<T: Element>(
        &self,
        send: &[T],
        recv: &mut [T],
        op: ReduceOp,
        algo: AllreduceAlgorithm,
    ) -> Result<()> {
        check_same_len(send, recv)?;
        recv.copy_from_slice(send);
        let tag = self.next_collective_tag();
        allreduce_with_tag(self, recv, op, algo, tag).await
    }

    /// In-place allreduce: `buf` is replaced by the reduction across ranks.
    pub async fn allreduce_in_place<T: Element>(
        &self,
        buf: &mut [T],
        op: ReduceOp,
        algo: AllreduceAlgorithm,
    ) -> Result<()> {
        let tag = self.next_collective_tag();
        allreduce_with_tag(self, buf, op, algo, tag).await
    }

    /// Reference allreduce with a fixed rank-order fold; the result every
    /// other algorithm is measured against.
    pub async fn baseline_allreduce<T: Element>(&self, buf: &mut [T], op: ReduceOp) -> Result<()> {
        let tag = self.next_collective_tag();
        let result = if buf.is_empty() || self.world_size() <= 1 {
            Ok(())
        } else {
            baseline_allreduce(self, buf, op, tag).await
        };
        self.release_tag(tag).await;
        result
    }

    /// Block until every rank has entered the barrier.
    pub async fn barrier(&self) -> Result<()> {
        let tag = self.next_collective_tag();
        let result = dissemination_barrier(self, tag).await;
        self.release_tag(tag).await;
        result
    }
}

pub(super) fn check_same_len<T: Element>(send: &[T], recv: &[T]) -> Result<()> {
    if send.len() != recv.len() {
        return Err(AlError::BufferSizeMismatch {
            expected: std::mem::size_of_val(send),
            actual: std::mem::size_of_val(recv),
        });
    }
    Ok(())
}
