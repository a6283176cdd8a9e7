mod bootstrap;
mod collectives;
mod collectives_nb;
mod messaging;
mod sync_comm;
mod teardown;

pub use sync_comm::SyncCommunicator;

use crate::config::AlConfig;
use crate::error::{AlError, Result};
use crate::request::RequestTable;
use crate::transport::PeerConnection;
use crate::transport::buffer_pool::BufferPool;
use crate::transport::router::PeerRouter;
use crate::types::Rank;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Tag carried by user point-to-point messages on the host path.
pub const P2P_TAG: u64 = 0;

/// Tag carried by point-to-point messages issued from a device stream, kept
/// apart from host traffic between the same pair of ranks.
pub const DEVICE_P2P_TAG: u64 = 1 << 63;

/// One rank's handle on an in-process world.
///
/// Holds a connection to every other rank (for sending) and a router per
/// peer (for receiving). Each collective call draws a fresh tag from
/// `collective_tag`; every rank calls collectives in the same order, so the
/// tags line up across ranks and concurrent non-blocking collectives never
/// read each other's messages.
///
/// # Example
///
/// ```no_run
/// use allreduces::{AlConfig, AllreduceAlgorithm, Context, ReduceOp};
///
/// # async fn example() -> allreduces::Result<()> {
/// let ctx = Context::initialize(2, AlConfig::default()).await?;
/// let mut tasks = Vec::new();
/// for comm in ctx.communicators() {
///     let comm = comm.clone();
///     tasks.push(tokio::spawn(async move {
///         let mut buf = vec![1.0f32; 256];
///         comm.allreduce_in_place(&mut buf, ReduceOp::Sum, AllreduceAlgorithm::Ring)
///             .await
///             .map(|()| buf)
///     }));
/// }
/// for t in tasks {
///     assert!(t.await.unwrap()?.iter().all(|&x| x == 2.0));
/// }
/// ctx.finalize().await
/// # }
/// ```
pub struct Communicator {
    rank: Rank,
    world_size: u32,
    config: AlConfig,
    peers: HashMap<Rank, Arc<PeerConnection>>,
    routers: HashMap<Rank, PeerRouter>,
    router_handles: Vec<tokio::task::JoinHandle<()>>,
    /// The listener endpoint and the client endpoint, closed at finalize.
    endpoints: Vec<quinn::Endpoint>,
    /// Starts at 1; 0 and `DEVICE_P2P_TAG` are reserved for point-to-point.
    collective_tag: AtomicU64,
    requests: Arc<RequestTable>,
}

impl Communicator {
    /// Assemble a communicator from established connections and start a
    /// router for each peer. Must be called inside a tokio runtime.
    pub(crate) fn new(
        rank: Rank,
        world_size: u32,
        peers: HashMap<Rank, PeerConnection>,
        endpoints: Vec<quinn::Endpoint>,
        config: AlConfig,
    ) -> Self {
        let pool = BufferPool::new();
        let mut peer_arcs = HashMap::with_capacity(peers.len());
        let mut routers = HashMap::with_capacity(peers.len());
        let mut router_handles = Vec::with_capacity(peers.len());

        for (peer_rank, peer_conn) in peers {
            let (router, handle) =
                PeerRouter::spawn(peer_rank, peer_conn.conn.clone(), Arc::clone(&pool));
            peer_arcs.insert(peer_rank, Arc::new(peer_conn));
            routers.insert(peer_rank, router);
            router_handles.push(handle);
        }

        Self {
            rank,
            world_size,
            config,
            peers: peer_arcs,
            routers,
            router_handles,
            endpoints,
            collective_tag: AtomicU64::new(1),
            requests: RequestTable::new(tokio::runtime::Handle::current()),
        }
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn world_size(&self) -> u32 {
        self.world_size
    }

    pub fn config(&self) -> &AlConfig {
        &self.config
    }

    /// Table tracking this communicator's non-blocking requests.
    pub fn requests(&self) -> &Arc<RequestTable> {
        &self.requests
    }

    /// Reserve the tag for the next collective call.
    pub(crate) fn next_collective_tag(&self) -> u64 {
        self.collective_tag.fetch_add(1, Ordering::Relaxed)
    }

    /// Validate `peer` as a point-to-point partner: in range and not self.
    pub fn check_peer(&self, peer: Rank) -> Result<()> {
        if peer >= self.world_size || peer == self.rank {
            return Err(AlError::InvalidRank {
                rank: peer,
                world_size: self.world_size,
            });
        }
        Ok(())
    }

    pub(crate) fn peer(&self, rank: Rank) -> Result<&Arc<PeerConnection>> {
        self.check_peer(rank)?;
        self.peers
            .get(&rank)
            .ok_or(AlError::PeerDisconnected { rank })
    }

    pub(crate) fn router(&self, rank: Rank) -> Result<&PeerRouter> {
        self.check_peer(rank)?;
        self.routers
            .get(&rank)
            .ok_or(AlError::PeerDisconnected { rank })
    }

    /// Drop every peer's lane for a finished collective.
    pub(crate) async fn release_tag(&self, tag: u64) {
        for router in self.routers.values() {
            router.release(tag).await;
        }
    }
}

impl Drop for Communicator {
    fn drop(&mut self) {
        for handle in &self.router_handles {
            handle.abort();
        }
    }
}
