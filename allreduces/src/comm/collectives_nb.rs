use crate::collective::allreduce_with_tag;
use crate::comm::Communicator;
use crate::comm::collectives::check_same_len;
use crate::error::Result;
use crate::request::Request;
use crate::types::{AllreduceAlgorithm, Element, ReduceOp};
use std::sync::Arc;

impl Communicator {
    /// Non-blocking out-of-place allreduce.
    ///
    /// `send` is copied into `recv` at issue time, so the caller keeps
    /// `send`; `recv` travels with the request and comes back reduced from
    /// `wait`.
    pub fn nonblocking_allreduce<T: Element>(
        self: &Arc<Self>,
        send: &[T],
        mut recv: Vec<T>,
        op: ReduceOp,
        algo: AllreduceAlgorithm,
    ) -> Result<Request<Vec<T>>> {
        check_same_len(send, &recv)?;
        recv.copy_from_slice(send);
        self.nonblocking_allreduce_in_place(recv, op, algo)
    }

    /// Non-blocking in-place allreduce. The reduced buffer comes back from
    /// `wait`.
    pub fn nonblocking_allreduce_in_place<T: Element>(
        self: &Arc<Self>,
        mut buf: Vec<T>,
        op: ReduceOp,
        algo: AllreduceAlgorithm,
    ) -> Result<Request<Vec<T>>> {
        let comm = Arc::clone(self);
        // Drawn now, in program order, not when the task first runs.
        let tag = comm.next_collective_tag();
        self.requests().issue(async move {
            allreduce_with_tag(&comm, &mut buf, op, algo, tag).await?;
            Ok(buf)
        })
    }
}
