use std::sync::Arc;

use allreduces::{DeviceBuffer, Element, Rank, ReduceOp, Stream};

use crate::collective::{fabric_allreduce, tree_broadcast, tree_reduce};
use crate::error::{Result, VendorError};
use crate::fabric::{Lane, Port};
use crate::types::VendorAlgorithm;

/// One device's handle on a vendor world.
///
/// Every operation is validated when called and then queued on the
/// communicator's stream; it runs after everything queued before it and its
/// result is visible after [`VendorCommunicator::synchronize`]. All ranks
/// must queue collectives in the same order.
pub struct VendorCommunicator {
    port: Arc<Port>,
    stream: Stream,
}

impl VendorCommunicator {
    pub(crate) fn new(port: Port, stream: Stream) -> Self {
        Self {
            port: Arc::new(port),
            stream,
        }
    }

    pub fn rank(&self) -> Rank {
        self.port.rank()
    }

    pub fn world_size(&self) -> u32 {
        self.port.world_size() as u32
    }

    /// The stream this communicator queues on.
    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// Queue an out-of-place allreduce from `send` into `recv`.
    pub fn allreduce<T: Element>(
        &self,
        send: &DeviceBuffer<T>,
        recv: &DeviceBuffer<T>,
        op: ReduceOp,
        _algo: VendorAlgorithm,
    ) -> Result<()> {
        check_same_len(send, recv)?;
        let port = Arc::clone(&self.port);
        let (send, recv) = (send.alias(), recv.alias());
        self.enqueue(async move {
            let mut staged = send.copy_to_host()?;
            fabric_allreduce(&port, &mut staged, op).await?;
            recv.copy_from_host(&staged)
        })
    }

    pub fn allreduce_in_place<T: Element>(
        &self,
        buf: &DeviceBuffer<T>,
        op: ReduceOp,
        algo: VendorAlgorithm,
    ) -> Result<()> {
        self.allreduce(buf, buf, op, algo)
    }

    /// Queue a broadcast of `root`'s `buf` into every rank's `buf`.
    pub fn broadcast<T: Element>(&self, buf: &DeviceBuffer<T>, root: Rank) -> Result<()> {
        self.check_rank(root)?;
        let port = Arc::clone(&self.port);
        let buf = buf.alias();
        self.enqueue(async move {
            let mut staged = buf.copy_to_host()?;
            tree_broadcast(&port, &mut staged, root).await?;
            buf.copy_from_host(&staged)
        })
    }

    /// Queue a reduce of every rank's `send` into `root`'s `recv`. `recv`
    /// is only written on `root`.
    pub fn reduce<T: Element>(
        &self,
        send: &DeviceBuffer<T>,
        recv: &DeviceBuffer<T>,
        op: ReduceOp,
        root: Rank,
    ) -> Result<()> {
        self.check_rank(root)?;
        check_same_len(send, recv)?;
        let port = Arc::clone(&self.port);
        let (send, recv) = (send.alias(), recv.alias());
        let is_root = root == self.rank();
        self.enqueue(async move {
            let mut staged = send.copy_to_host()?;
            tree_reduce(&port, &mut staged, op, root).await?;
            if is_root {
                recv.copy_from_host(&staged)?;
            }
            Ok(())
        })
    }

    /// Queue a send of `buf` to `peer`.
    pub fn send<T: Element>(&self, buf: &DeviceBuffer<T>, peer: Rank) -> Result<()> {
        self.check_peer(peer)?;
        let port = Arc::clone(&self.port);
        let buf = buf.alias();
        self.enqueue(async move {
            let staged = buf.copy_to_host()?;
            port.send(peer, Lane::P2p, allreduces::reduce::as_bytes(&staged))
        })
    }

    /// Queue a receive from `peer` into `buf`.
    pub fn recv<T: Element>(&self, buf: &DeviceBuffer<T>, peer: Rank) -> Result<()> {
        self.check_peer(peer)?;
        let port = Arc::clone(&self.port);
        let buf = buf.alias();
        self.enqueue(async move {
            let payload = port.recv(peer, Lane::P2p).await?;
            buf.copy_from_host(&allreduces::reduce::vec_from_bytes(&payload)?)
        })
    }

    /// Wait for everything queued so far and report the first failure.
    pub async fn synchronize(&self) -> Result<()> {
        Ok(self.stream.synchronize().await?)
    }

    /// Drain the stream, then wait until every rank has done the same.
    pub async fn barrier(&self) -> Result<()> {
        self.synchronize().await?;
        let mut token = [0u32; 1];
        fabric_allreduce(&self.port, &mut token, ReduceOp::Sum).await?;
        Ok(())
    }

    fn enqueue<F>(&self, op: F) -> Result<()>
    where
        F: std::future::Future<Output = allreduces::Result<()>> + Send + 'static,
    {
        Ok(self.stream.enqueue(op)?)
    }

    fn check_rank(&self, rank: Rank) -> Result<()> {
        if rank >= self.world_size() {
            return Err(VendorError::InvalidRank {
                rank,
                world_size: self.world_size(),
            });
        }
        Ok(())
    }

    fn check_peer(&self, peer: Rank) -> Result<()> {
        self.check_rank(peer)?;
        if peer == self.rank() {
            return Err(VendorError::InvalidRank {
                rank: peer,
                world_size: self.world_size(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for VendorCommunicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorCommunicator")
            .field("rank", &self.rank())
            .field("world_size", &self.world_size())
            .field("stream", &self.stream)
            .finish()
    }
}

fn check_same_len<T: Element>(a: &DeviceBuffer<T>, b: &DeviceBuffer<T>) -> Result<()> {
    if a.len() != b.len() {
        return Err(allreduces::AlError::BufferSizeMismatch {
            expected: a.len() * std::mem::size_of::<T>(),
            actual: b.len() * std::mem::size_of::<T>(),
        }
        .into());
    }
    Ok(())
}
