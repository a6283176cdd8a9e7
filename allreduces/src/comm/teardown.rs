use crate::comm::Communicator;
use crate::error::{AlError, Result};
use crate::protocol::ControlMessage;
use futures::future::join_all;

impl Communicator {
    /// Leave the mesh.
    ///
    /// Aborts outstanding non-blocking requests, tells every peer we are
    /// done, and waits (up to `finalize_timeout`) until every peer has said
    /// the same before closing connections. A peer only says goodbye once it
    /// has received everything it needs, so closing afterwards cannot cut
    /// off data still in flight to it.
    ///
    /// Every rank must call this; `Context::finalize` does so for all of
    /// them at once.
    pub async fn finalize(&self) -> Result<()> {
        let aborted = self.requests().abort_all();
        if aborted > 0 {
            tracing::warn!(
                rank = self.rank(),
                aborted,
                "finalize: aborting outstanding non-blocking requests"
            );
        }

        let goodbye = &ControlMessage::Goodbye { rank: self.rank() };
        let sends = self.peers.values().map(|peer| async move {
            if let Err(e) = peer.send_message(goodbye).await {
                tracing::debug!(
                    rank = self.rank(),
                    peer = peer.rank,
                    "finalize: goodbye not sent: {e}"
                );
            }
        });
        join_all(sends).await;

        let limit = self.config().finalize_timeout;
        let waits = self.routers.values().map(|router| async move {
            loop {
                match tokio::time::timeout(limit, router.recv_control()).await {
                    Ok(Ok(ControlMessage::Goodbye { .. })) => return,
                    Ok(Ok(other)) => {
                        tracing::warn!(peer = router.peer(), "finalize: ignoring {other:?}");
                    }
                    // The peer finished first and already closed.
                    Ok(Err(AlError::PeerDisconnected { .. })) => return,
                    Ok(Err(e)) => {
                        tracing::warn!(peer = router.peer(), "finalize: {e}");
                        return;
                    }
                    Err(_) => {
                        tracing::warn!(
                            peer = router.peer(),
                            timeout_ms = limit.as_millis() as u64,
                            "finalize: peer never said goodbye"
                        );
                        return;
                    }
                }
            }
        });
        join_all(waits).await;

        for peer in self.peers.values() {
            peer.close(b"finalize");
        }
        for endpoint in &self.endpoints {
            endpoint.close(quinn::VarInt::from_u32(0), b"finalize");
        }
        for endpoint in &self.endpoints {
            if tokio::time::timeout(limit, endpoint.wait_idle()).await.is_err() {
                tracing::warn!(rank = self.rank(), "finalize: endpoint did not drain");
            }
        }
        tracing::debug!(rank = self.rank(), "finalized");
        Ok(())
    }
}
