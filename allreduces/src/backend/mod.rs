//! One interface over the ways an allreduce can be run.
//!
//! A backend fixes the communicator type, the buffer residency and the
//! algorithm selector. The correctness harness and the benchmark are written
//! against [`Backend`] so the same driver code exercises host buffers over
//! the QUIC mesh, device buffers on a stream, and the vendor library.

mod device;
mod host;

pub use device::{DeviceBackend, DeviceCommunicator};
pub use host::HostBackend;

use crate::types::{Element, Rank, ReduceOp};
use std::fmt;
use std::future::Future;

pub trait Backend: Send + Sync + 'static {
    /// Per-rank communicator handle.
    type Comm: Send + Sync;
    /// Algorithm selector accepted by `allreduce`.
    type Algo: Copy + fmt::Display + Send + Sync + 'static;
    /// Where message buffers live.
    type Buffer<T: Element>: Send + Sync;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Short name used in reports.
    const NAME: &'static str;

    /// Put host data into a buffer of this backend's residency.
    fn upload<T: Element>(data: &[T]) -> Self::Buffer<T>;

    /// Read a buffer back to the host. For stream-ordered backends, call
    /// `synchronize` first.
    fn download<T: Element>(buf: &Self::Buffer<T>) -> Result<Vec<T>, Self::Error>;

    fn send<T: Element>(
        comm: &Self::Comm,
        buf: &Self::Buffer<T>,
        dest: Rank,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn recv<T: Element>(
        comm: &Self::Comm,
        buf: &mut Self::Buffer<T>,
        src: Rank,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Out-of-place allreduce; `send` is left untouched.
    fn allreduce<T: Element>(
        comm: &Self::Comm,
        send: &Self::Buffer<T>,
        recv: &mut Self::Buffer<T>,
        op: ReduceOp,
        algo: Self::Algo,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn allreduce_in_place<T: Element>(
        comm: &Self::Comm,
        buf: &mut Self::Buffer<T>,
        op: ReduceOp,
        algo: Self::Algo,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Wait for all previously issued work of this rank to finish.
    fn synchronize(comm: &Self::Comm) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Synchronize, then wait for every rank to do the same.
    fn barrier(comm: &Self::Comm) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
