use allreduces::{Backend, DeviceBuffer, Element, Rank, ReduceOp};

use crate::comm::VendorCommunicator;
use crate::error::{Result, VendorError};
use crate::types::VendorAlgorithm;

/// The vendor library behind the common backend interface. Calls return once
/// the work is queued; `synchronize` makes results visible.
pub struct VendorBackend;

impl Backend for VendorBackend {
    type Comm = VendorCommunicator;
    type Algo = VendorAlgorithm;
    type Buffer<T: Element> = DeviceBuffer<T>;
    type Error = VendorError;

    const NAME: &'static str = "vendor";

    fn upload<T: Element>(data: &[T]) -> DeviceBuffer<T> {
        DeviceBuffer::from_host(data)
    }

    fn download<T: Element>(buf: &DeviceBuffer<T>) -> Result<Vec<T>> {
        Ok(buf.copy_to_host()?)
    }

    async fn send<T: Element>(
        comm: &VendorCommunicator,
        buf: &DeviceBuffer<T>,
        dest: Rank,
    ) -> Result<()> {
        comm.send(buf, dest)
    }

    async fn recv<T: Element>(
        comm: &VendorCommunicator,
        buf: &mut DeviceBuffer<T>,
        src: Rank,
    ) -> Result<()> {
        comm.recv(buf, src)
    }

    async fn allreduce<T: Element>(
        comm: &VendorCommunicator,
        send: &DeviceBuffer<T>,
        recv: &mut DeviceBuffer<T>,
        op: ReduceOp,
        algo: VendorAlgorithm,
    ) -> Result<()> {
        comm.allreduce(send, recv, op, algo)
    }

    async fn allreduce_in_place<T: Element>(
        comm: &VendorCommunicator,
        buf: &mut DeviceBuffer<T>,
        op: ReduceOp,
        algo: VendorAlgorithm,
    ) -> Result<()> {
        comm.allreduce_in_place(buf, op, algo)
    }

    async fn synchronize(comm: &VendorCommunicator) -> Result<()> {
        comm.synchronize().await
    }

    async fn barrier(comm: &VendorCommunicator) -> Result<()> {
        comm.barrier().await
    }
}
