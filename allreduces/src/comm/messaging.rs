use crate::comm::{Communicator, P2P_TAG};
use crate::error::{AlError, Result};
use crate::reduce::{as_bytes, copy_bytes_into};
use crate::request::Request;
use crate::transport::buffer_pool::PooledBuf;
use crate::types::{Element, Rank};
use std::sync::Arc;

impl Communicator {
    /// Send raw bytes to `dest` on `tag`.
    pub(crate) async fn send_bytes(&self, dest: Rank, tag: u64, data: &[u8]) -> Result<()> {
        self.peer(dest)?.send_data(tag, data).await
    }

    /// Receive the next payload `src` sent on `tag`, honoring the configured
    /// timeout.
    pub(crate) async fn recv_bytes(&self, src: Rank, tag: u64) -> Result<PooledBuf> {
        let router = self.router(src)?;
        match self.config().collective_timeout {
            None => router.recv_tagged(tag).await,
            Some(limit) => tokio::time::timeout(limit, router.recv_tagged(tag))
                .await
                .map_err(|_| AlError::Timeout {
                    operation: "recv",
                    rank: self.rank(),
                    timeout_ms: limit.as_millis() as u64,
                })?,
        }
    }

    pub(crate) async fn send_on<T: Element>(&self, tag: u64, buf: &[T], dest: Rank) -> Result<()> {
        self.send_bytes(dest, tag, as_bytes(buf)).await
    }

    pub(crate) async fn recv_on<T: Element>(
        &self,
        tag: u64,
        buf: &mut [T],
        src: Rank,
    ) -> Result<()> {
        let payload = self.recv_bytes(src, tag).await?;
        copy_bytes_into(buf, &payload)
    }

    /// Blocking send of `buf` to `dest`.
    ///
    /// Returns once the payload is handed to the transport; the matching
    /// `recv` on `dest` must use a buffer of the same length.
    pub async fn send<T: Element>(&self, buf: &[T], dest: Rank) -> Result<()> {
        self.send_on(P2P_TAG, buf, dest).await
    }

    /// Blocking receive from `src` into `buf`.
    ///
    /// Fails with `BufferSizeMismatch` if the message length differs from
    /// `buf.len()`.
    pub async fn recv<T: Element>(&self, buf: &mut [T], src: Rank) -> Result<()> {
        self.recv_on(P2P_TAG, buf, src).await
    }

    /// Non-blocking send. The buffer is handed back by `wait`.
    ///
    /// Two outstanding sends to the same peer are not ordered with respect
    /// to each other; wait for the first before issuing the second if the
    /// order matters.
    pub fn isend<T: Element>(self: &Arc<Self>, buf: Vec<T>, dest: Rank) -> Result<Request<Vec<T>>> {
        self.check_peer(dest)?;
        let comm = Arc::clone(self);
        self.requests().issue(async move {
            comm.send(&buf, dest).await?;
            Ok(buf)
        })
    }

    /// Non-blocking receive into `buf`, handed back filled by `wait`.
    pub fn irecv<T: Element>(
        self: &Arc<Self>,
        mut buf: Vec<T>,
        src: Rank,
    ) -> Result<Request<Vec<T>>> {
        self.check_peer(src)?;
        let comm = Arc::clone(self);
        self.requests().issue(async move {
            comm.recv(&mut buf, src).await?;
            Ok(buf)
        })
    }

    /// Wait for a request issued by this communicator.
    pub async fn wait<T: Send + 'static>(&self, request: Request<T>) -> Result<T> {
        self.check_owner(&request)?;
        request.wait().await
    }

    /// Poll a request issued by this communicator.
    pub fn test<T: Send + 'static>(&self, request: &Request<T>) -> Result<bool> {
        self.check_owner(request)?;
        request.test()
    }

    fn check_owner<T: Send + 'static>(&self, request: &Request<T>) -> Result<()> {
        if !request.belongs_to(self.requests()) {
            return Err(AlError::InvalidRequest(format!(
                "request {} was issued by another communicator",
                request.id()
            )));
        }
        Ok(())
    }
}
