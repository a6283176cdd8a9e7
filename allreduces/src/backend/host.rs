use crate::backend::Backend;
use crate::comm::Communicator;
use crate::error::{AlError, Result};
use crate::types::{AllreduceAlgorithm, Element, Rank, ReduceOp};
use std::sync::Arc;

/// Host-resident buffers over the QUIC mesh. Calls complete when the
/// operation has completed on this rank.
pub struct HostBackend;

impl Backend for HostBackend {
    type Comm = Arc<Communicator>;
    type Algo = AllreduceAlgorithm;
    type Buffer<T: Element> = Vec<T>;
    type Error = AlError;

    const NAME: &'static str = "host";

    fn upload<T: Element>(data: &[T]) -> Vec<T> {
        data.to_vec()
    }

    fn download<T: Element>(buf: &Vec<T>) -> Result<Vec<T>> {
        Ok(buf.clone())
    }

    async fn send<T: Element>(comm: &Self::Comm, buf: &Vec<T>, dest: Rank) -> Result<()> {
        comm.send(buf, dest).await
    }

    async fn recv<T: Element>(comm: &Self::Comm, buf: &mut Vec<T>, src: Rank) -> Result<()> {
        comm.recv(buf, src).await
    }

    async fn allreduce<T: Element>(
        comm: &Self::Comm,
        send: &Vec<T>,
        recv: &mut Vec<T>,
        op: ReduceOp,
        algo: AllreduceAlgorithm,
    ) -> Result<()> {
        comm.allreduce(send, recv, op, algo).await
    }

    async fn allreduce_in_place<T: Element>(
        comm: &Self::Comm,
        buf: &mut Vec<T>,
        op: ReduceOp,
        algo: AllreduceAlgorithm,
    ) -> Result<()> {
        comm.allreduce_in_place(buf, op, algo).await
    }

    async fn synchronize(_comm: &Self::Comm) -> Result<()> {
        Ok(())
    }

    async fn barrier(comm: &Self::Comm) -> Result<()> {
        comm.barrier().await
    }
}
