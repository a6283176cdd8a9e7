use crate::backend::Backend;
use crate::collective::allreduce_with_tag;
use crate::comm::{Communicator, DEVICE_P2P_TAG};
use crate::device::{DeviceBuffer, Stream};
use crate::error::{AlError, Result};
use crate::types::{AllreduceAlgorithm, Element, Rank, ReduceOp};
use std::sync::Arc;

/// A communicator whose operations are queued on a device stream.
///
/// Every call validates its arguments, reserves its message tag and enqueues
/// the work, then returns without waiting. Work runs in enqueue order after
/// whatever the stream already holds (e.g. a `gpu_wait`). Results are
/// visible once [`DeviceCommunicator::synchronize`] returns.
///
/// Each enqueued collective reserves a tag at enqueue time, so all ranks
/// must enqueue collectives in the same order. If stream work fails, the
/// stream skips everything queued behind it until the next synchronize;
/// peers waiting on a skipped collective only return through the configured
/// collective timeout.
#[derive(Clone)]
pub struct DeviceCommunicator {
    comm: Arc<Communicator>,
    stream: Stream,
}

impl DeviceCommunicator {
    /// Attach a fresh stream to `comm`. Must be called inside a runtime.
    pub fn new(comm: Arc<Communicator>) -> Result<Self> {
        Ok(Self::with_stream(comm, Stream::new()?))
    }

    pub fn with_stream(comm: Arc<Communicator>, stream: Stream) -> Self {
        Self { comm, stream }
    }

    pub fn comm(&self) -> &Arc<Communicator> {
        &self.comm
    }

    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    pub fn rank(&self) -> Rank {
        self.comm.rank()
    }

    pub fn world_size(&self) -> u32 {
        self.comm.world_size()
    }

    /// Enqueue an out-of-place allreduce from `send` into `recv`.
    pub fn allreduce<T: Element>(
        &self,
        send: &DeviceBuffer<T>,
        recv: &DeviceBuffer<T>,
        op: ReduceOp,
        algo: AllreduceAlgorithm,
    ) -> Result<()> {
        if send.len() != recv.len() {
            return Err(AlError::BufferSizeMismatch {
                expected: send.len() * std::mem::size_of::<T>(),
                actual: recv.len() * std::mem::size_of::<T>(),
            });
        }
        let tag = self.comm.next_collective_tag();
        let comm = Arc::clone(&self.comm);
        let (send, recv) = (send.alias(), recv.alias());
        self.stream.enqueue(async move {
            let mut staged = send.copy_to_host()?;
            allreduce_with_tag(&comm, &mut staged, op, algo, tag).await?;
            recv.copy_from_host(&staged)
        })
    }

    /// Enqueue an in-place allreduce of `buf`.
    pub fn allreduce_in_place<T: Element>(
        &self,
        buf: &DeviceBuffer<T>,
        op: ReduceOp,
        algo: AllreduceAlgorithm,
    ) -> Result<()> {
        self.allreduce(buf, buf, op, algo)
    }

    /// Enqueue a send of `buf` to `dest`.
    pub fn send<T: Element>(&self, buf: &DeviceBuffer<T>, dest: Rank) -> Result<()> {
        self.comm.check_peer(dest)?;
        let comm = Arc::clone(&self.comm);
        let buf = buf.alias();
        self.stream.enqueue(async move {
            let staged = buf.copy_to_host()?;
            comm.send_on(DEVICE_P2P_TAG, &staged, dest).await
        })
    }

    /// Enqueue a receive from `src` into `buf`.
    pub fn recv<T: Element>(&self, buf: &DeviceBuffer<T>, src: Rank) -> Result<()> {
        self.comm.check_peer(src)?;
        let comm = Arc::clone(&self.comm);
        let buf = buf.alias();
        self.stream.enqueue(async move {
            let mut staged = vec![T::zeroed(); buf.len()];
            comm.recv_on(DEVICE_P2P_TAG, &mut staged, src).await?;
            buf.copy_from_host(&staged)
        })
    }

    /// Wait for all enqueued work; reports the first failure since the last
    /// synchronize.
    pub async fn synchronize(&self) -> Result<()> {
        self.stream.synchronize().await
    }

    /// Drain the stream, then wait for every rank to do the same.
    pub async fn barrier(&self) -> Result<()> {
        self.synchronize().await?;
        self.comm.barrier().await
    }
}

impl std::fmt::Debug for DeviceCommunicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCommunicator")
            .field("rank", &self.rank())
            .field("stream", &self.stream)
            .finish()
    }
}

/// Device-resident buffers over the QUIC mesh, ordered by a stream. Calls
/// return once the work is enqueued.
pub struct DeviceBackend;

impl Backend for DeviceBackend {
    type Comm = DeviceCommunicator;
    type Algo = AllreduceAlgorithm;
    type Buffer<T: Element> = DeviceBuffer<T>;
    type Error = AlError;

    const NAME: &'static str = "device";

    fn upload<T: Element>(data: &[T]) -> DeviceBuffer<T> {
        DeviceBuffer::from_host(data)
    }

    fn download<T: Element>(buf: &DeviceBuffer<T>) -> Result<Vec<T>> {
        buf.copy_to_host()
    }

    async fn send<T: Element>(
        comm: &DeviceCommunicator,
        buf: &DeviceBuffer<T>,
        dest: Rank,
    ) -> Result<()> {
        comm.send(buf, dest)
    }

    async fn recv<T: Element>(
        comm: &DeviceCommunicator,
        buf: &mut DeviceBuffer<T>,
        src: Rank,
    ) -> Result<()> {
        comm.recv(buf, src)
    }

    async fn allreduce<T: Element>(
        comm: &DeviceCommunicator,
        send: &DeviceBuffer<T>,
        recv: &mut DeviceBuffer<T>,
        op: ReduceOp,
        algo: AllreduceAlgorithm,
    ) -> Result<()> {
        comm.allreduce(send, recv, op, algo)
    }

    async fn allreduce_in_place<T: Element>(
        comm: &DeviceCommunicator,
        buf: &mut DeviceBuffer<T>,
        op: ReduceOp,
        algo: AllreduceAlgorithm,
    ) -> Result<()> {
        comm.allreduce_in_place(buf, op, algo)
    }

    async fn synchronize(comm: &DeviceCommunicator) -> Result<()> {
        comm.synchronize().await
    }

    async fn barrier(comm: &DeviceCommunicator) -> Result<()> {
        comm.barrier().await
    }
}
