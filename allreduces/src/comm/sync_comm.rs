use crate::comm::Communicator;
use crate::config::AlConfig;
use crate::error::{AlError, Result};
use crate::request::Request;
use crate::types::{AllreduceAlgorithm, Element, Rank, ReduceOp};
use std::sync::Arc;

/// Thread-blocking wrapper around [`Communicator`].
///
/// All ranks of a world share one multi-threaded runtime; each call is a
/// `block_on` from the caller's thread, so ranks are driven from separate
/// OS threads. Non-blocking requests run on the shared runtime in the
/// background between calls.
pub struct SyncCommunicator {
    inner: Arc<Communicator>,
    rt: Arc<tokio::runtime::Runtime>,
}

impl SyncCommunicator {
    /// Bootstrap a local world and return one blocking communicator per rank.
    pub fn bootstrap_local(world_size: u32, config: AlConfig) -> Result<Vec<Self>> {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| AlError::transport_with_source("tokio runtime", e))?;
        let rt = Arc::new(rt);

        let comms = rt.block_on(Communicator::bootstrap_local(world_size, config))?;
        Ok(comms
            .into_iter()
            .map(|c| Self {
                inner: Arc::new(c),
                rt: Arc::clone(&rt),
            })
            .collect())
    }

    /// The async communicator underneath.
    pub fn as_async(&self) -> &Arc<Communicator> {
        &self.inner
    }

    pub fn rank(&self) -> Rank {
        self.inner.rank()
    }

    pub fn world_size(&self) -> u32 {
        self.inner.world_size()
    }

    pub fn send<T: Element>(&self, buf: &[T], dest: Rank) -> Result<()> {
        self.rt.block_on(self.inner.send(buf, dest))
    }

    pub fn recv<T: Element>(&self, buf: &mut [T], src: Rank) -> Result<()> {
        self.rt.block_on(self.inner.recv(buf, src))
    }

    pub fn barrier(&self) -> Result<()> {
        self.rt.block_on(self.inner.barrier())
    }

    pub fn allreduce<T: Element>(
        &self,
        send: &[T],
        recv: &mut [T],
        op: ReduceOp,
        algo: AllreduceAlgorithm,
    ) -> Result<()> {
        self.rt
            .block_on(self.inner.allreduce(send, recv, op, algo))
    }

    pub fn allreduce_in_place<T: Element>(
        &self,
        buf: &mut [T],
        op: ReduceOp,
        algo: AllreduceAlgorithm,
    ) -> Result<()> {
        self.rt
            .block_on(self.inner.allreduce_in_place(buf, op, algo))
    }

    pub fn nonblocking_allreduce_in_place<T: Element>(
        &self,
        buf: Vec<T>,
        op: ReduceOp,
        algo: AllreduceAlgorithm,
    ) -> Result<Request<Vec<T>>> {
        self.inner.nonblocking_allreduce_in_place(buf, op, algo)
    }

    pub fn wait<T: Send + 'static>(&self, request: Request<T>) -> Result<T> {
        self.rt.block_on(self.inner.wait(request))
    }

    pub fn test<T: Send + 'static>(&self, request: &Request<T>) -> Result<bool> {
        self.inner.test(request)
    }

    /// Leave the mesh. Every rank must call this concurrently, each from its
    /// own thread.
    pub fn finalize(&self) -> Result<()> {
        self.rt.block_on(self.inner.finalize())
    }
}
