//! In-process device fabric: one unbounded FIFO per ordered pair of ranks
//! and lane.

use allreduces::{AlError, Rank};
use tokio::sync::{Mutex, mpsc};

type Packet = Vec<u8>;

/// Traffic class. Collectives and point-to-point messages between the same
/// pair never share a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lane {
    Collective = 0,
    P2p = 1,
}

const LANES: usize = 2;

/// One rank's attachment to the fabric.
pub(crate) struct Port {
    rank: Rank,
    /// `tx[dest][lane]`
    tx: Vec<[mpsc::UnboundedSender<Packet>; LANES]>,
    /// `rx[src][lane]`
    rx: Vec<[Mutex<mpsc::UnboundedReceiver<Packet>>; LANES]>,
}

/// Wire up `world_size` ports, returned in rank order.
pub(crate) fn connect(world_size: usize) -> Vec<Port> {
    let mut tx: Vec<Vec<[mpsc::UnboundedSender<Packet>; LANES]>> =
        (0..world_size).map(|_| Vec::with_capacity(world_size)).collect();
    let mut rx: Vec<Vec<[Mutex<mpsc::UnboundedReceiver<Packet>>; LANES]>> =
        (0..world_size).map(|_| Vec::with_capacity(world_size)).collect();

    // Push in src order on the receiving side and dest order on the sending
    // side, so both vectors index by peer rank.
    for src in 0..world_size {
        for dest in 0..world_size {
            let (c_tx, c_rx) = mpsc::unbounded_channel();
            let (p_tx, p_rx) = mpsc::unbounded_channel();
            tx[src].push([c_tx, p_tx]);
            rx[dest].push([Mutex::new(c_rx), Mutex::new(p_rx)]);
        }
    }

    tx.into_iter()
        .zip(rx)
        .enumerate()
        .map(|(rank, (tx, rx))| Port {
            rank: rank as Rank,
            tx,
            rx,
        })
        .collect()
}

impl Port {
    pub(crate) fn rank(&self) -> Rank {
        self.rank
    }

    pub(crate) fn world_size(&self) -> usize {
        self.tx.len()
    }

    pub(crate) fn send(&self, dest: Rank, lane: Lane, payload: &[u8]) -> allreduces::Result<()> {
        self.tx[dest as usize][lane as usize]
            .send(payload.to_vec())
            .map_err(|_| AlError::PeerDisconnected { rank: dest })
    }

    pub(crate) async fn recv(&self, src: Rank, lane: Lane) -> allreduces::Result<Packet> {
        self.rx[src as usize][lane as usize]
            .lock()
            .await
            .recv()
            .await
            .ok_or(AlError::PeerDisconnected { rank: src })
    }
}
